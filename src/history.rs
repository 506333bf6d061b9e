//! Bounded per-connection history of received lines.

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use serde::{Serialize, Serializer};
use std::collections::VecDeque;
use std::sync::Arc;

/// Records kept per path before the oldest is evicted.
pub const HISTORY_CAPACITY: usize = 1000;

/// One line received from a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub data: String,
}

impl Record {
    /// Stamp a received line with the current time, trimming trailing
    /// whitespace (including a `\r` left by CRLF devices).
    pub fn received(line: &str) -> Self {
        Self::at(Utc::now(), line)
    }

    pub fn at(timestamp: DateTime<Utc>, line: &str) -> Self {
        Self {
            timestamp,
            data: line.trim_end().to_string(),
        }
    }
}

fn serialize_timestamp<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Append-only ring of [`Record`]s, oldest first.
#[derive(Debug, Clone)]
pub struct History {
    records: VecDeque<Record>,
    capacity: usize,
}

/// History shared between a connection's reader thread and the registry.
pub type SharedHistory = Arc<Mutex<History>>;

impl Default for History {
    fn default() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }
}

impl History {
    /// A capacity of zero is treated as one.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: VecDeque::with_capacity(capacity.min(HISTORY_CAPACITY)),
            capacity,
        }
    }

    pub fn shared(capacity: usize) -> SharedHistory {
        Arc::new(Mutex::new(Self::with_capacity(capacity)))
    }

    /// Append a record, evicting the oldest once over capacity.
    pub fn push(&mut self, record: Record) {
        self.records.push_back(record);
        while self.records.len() > self.capacity {
            self.records.pop_front();
        }
    }

    /// The most recent `limit` records, oldest first.
    pub fn tail(&self, limit: usize) -> Vec<Record> {
        let skip = self.records.len().saturating_sub(limit);
        self.records.iter().skip(skip).cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

//! Reassembles a serial byte stream into lines.

use memchr::memchr;
use tracing::warn;

/// Default line delimiter.
pub const LINE_DELIMITER: u8 = b'\n';

/// Longest partial line held while waiting for a delimiter.
pub const MAX_PENDING_BYTES: usize = 64 * 1024;

/// Splits a byte stream on a delimiter, holding partial lines between feeds.
///
/// Lines are emitted without the delimiter and decoded lossily as UTF-8.
/// Bytes still pending when the framer is finished are dropped, never
/// emitted as a final partial line.
///
/// A partial line that grows past the pending limit is discarded together
/// with the rest of that line, up to and including its delimiter.
#[derive(Debug, Clone)]
pub struct LineFramer {
    pending: Vec<u8>,
    delimiter: u8,
    max_pending: usize,
    discarding: bool,
    discarded: usize,
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new()
    }
}

impl LineFramer {
    pub fn new() -> Self {
        Self::with_delimiter(LINE_DELIMITER)
    }

    pub fn with_delimiter(delimiter: u8) -> Self {
        Self {
            pending: Vec::new(),
            delimiter,
            max_pending: MAX_PENDING_BYTES,
            discarding: false,
            discarded: 0,
        }
    }

    pub fn with_max_pending(mut self, max_pending: usize) -> Self {
        self.max_pending = max_pending;
        self
    }

    /// Feed a chunk of received bytes, calling `emit` once per complete line
    /// in arrival order.
    pub fn feed<F>(&mut self, bytes: &[u8], mut emit: F)
    where
        F: FnMut(String),
    {
        let mut rest = bytes;
        if self.discarding {
            match memchr(self.delimiter, rest) {
                Some(pos) => {
                    self.discarded += pos + 1;
                    self.discarding = false;
                    rest = &rest[pos + 1..];
                }
                None => {
                    self.discarded += rest.len();
                    return;
                }
            }
        }

        while let Some(pos) = memchr(self.delimiter, rest) {
            let line = if self.pending.is_empty() {
                String::from_utf8_lossy(&rest[..pos]).into_owned()
            } else {
                self.pending.extend_from_slice(&rest[..pos]);
                let line = String::from_utf8_lossy(&self.pending).into_owned();
                self.pending.clear();
                line
            };
            emit(line);
            rest = &rest[pos + 1..];
        }

        if self.pending.len() + rest.len() > self.max_pending {
            let dropped = self.pending.len() + rest.len();
            warn!(
                dropped,
                limit = self.max_pending,
                "partial line exceeded limit, discarding until next delimiter"
            );
            self.pending.clear();
            self.discarded += dropped;
            self.discarding = true;
            return;
        }
        self.pending.extend_from_slice(rest);
    }

    /// Bytes received since the last delimiter.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Bytes thrown away because a line outgrew the pending limit.
    pub fn overflowed_bytes(&self) -> usize {
        self.discarded
    }

    /// End of stream. Returns how many trailing bytes were discarded.
    pub fn finish(self) -> usize {
        self.pending.len()
    }
}

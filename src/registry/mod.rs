//! Connection registry: the single owner of live serial connections.
//!
//! # Architecture
//!
//! ```text
//! ToolDispatcher ──> ConnectionRegistry ──> slots: path ─> Mutex<PathSlot>
//!                                                           ├─ Connection (writer + reader thread)
//!                                                           └─ SharedHistory <── reader thread appends
//! ```
//!
//! Every operation on a path runs under that path's slot lock, so connect,
//! disconnect, send and read-history on one path are serialized while other
//! paths proceed independently. The map lock is only held long enough to
//! look up or insert a slot, never while waiting on a slot.
//!
//! History has its own lock: reader threads append without touching the
//! slot lock, which lets a release (which joins the reader) run while
//! holding the slot.

mod connection;

use crate::config::Config;
use crate::error::{BridgeError, BridgeResult};
use crate::history::{History, Record, SharedHistory, HISTORY_CAPACITY};
use crate::port::{PortConfiguration, PortOpener, DEFAULT_READ_TIMEOUT};
use connection::Connection;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Appended to every `send`.
pub const LINE_TERMINATOR: &str = "\n";

/// Tunables for the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Read timeout handed to opened ports; bounds how long a release waits
    /// for the reader thread.
    pub read_timeout: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

impl From<&Config> for RegistryConfig {
    fn from(config: &Config) -> Self {
        Self {
            read_timeout: config.serial.read_timeout(),
        }
    }
}

/// Returned by a successful connect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    pub path: String,
    pub baud_rate: u32,
}

#[derive(Debug, Default)]
struct PathSlot {
    connection: Option<Connection>,
    history: Option<SharedHistory>,
}

impl PathSlot {
    fn is_vacant(&self) -> bool {
        self.connection.is_none() && self.history.is_none()
    }
}

type Slot = Arc<Mutex<PathSlot>>;

/// Tracks live connections keyed by device path.
pub struct ConnectionRegistry {
    opener: Arc<dyn PortOpener>,
    config: RegistryConfig,
    slots: Mutex<HashMap<String, Slot>>,
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("config", &self.config)
            .field("paths", &self.slots.lock().len())
            .finish()
    }
}

impl ConnectionRegistry {
    pub fn new(opener: Arc<dyn PortOpener>, config: RegistryConfig) -> Self {
        Self {
            opener,
            config,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Open `path` and start recording its lines.
    ///
    /// A live connection on the same path is released first; its history is
    /// kept and continues under the new connection. A history created by
    /// this call is discarded again if the connection fails to start.
    ///
    /// # Errors
    ///
    /// - `BridgeError::Open` if the device cannot be opened or its reader
    ///   cannot be started
    pub fn connect(&self, path: &str, baud_rate: u32) -> BridgeResult<ConnectionInfo> {
        self.with_slot(path, true, |slot| -> BridgeResult<ConnectionInfo> {
            if let Some(previous) = slot.connection.take() {
                info!(path, baud_rate = previous.baud_rate(), "superseding live connection");
                drop(previous);
            }

            let port_config = PortConfiguration::new(baud_rate, self.config.read_timeout);
            let port = self
                .opener
                .open(path, &port_config)
                .map_err(|source| BridgeError::Open {
                    path: path.to_string(),
                    source,
                })?;

            let created = slot.history.is_none();
            let history = Arc::clone(
                slot.history
                    .get_or_insert_with(|| History::shared(HISTORY_CAPACITY)),
            );

            let connection = match Connection::start(path, baud_rate, port, history) {
                Ok(connection) => connection,
                Err(source) => {
                    if created {
                        slot.history = None;
                    }
                    return Err(BridgeError::Open {
                        path: path.to_string(),
                        source,
                    });
                }
            };
            slot.connection = Some(connection);

            info!(path, baud_rate, "connected");
            Ok(ConnectionInfo {
                path: path.to_string(),
                baud_rate,
            })
        })
        .unwrap_or_else(|| Err(BridgeError::NotConnected(path.to_string())))
    }

    /// Release the connection on `path` and discard its history.
    ///
    /// # Errors
    ///
    /// - `BridgeError::NotConnected` if no connection is live on `path`
    pub fn disconnect(&self, path: &str) -> BridgeResult<()> {
        self.with_slot(path, false, |slot| -> BridgeResult<()> {
            let connection = slot
                .connection
                .take()
                .ok_or_else(|| BridgeError::NotConnected(path.to_string()))?;
            drop(connection);
            slot.history = None;
            info!(path, "disconnected");
            Ok(())
        })
        .unwrap_or_else(|| Err(BridgeError::NotConnected(path.to_string())))
    }

    /// Write `data` plus [`LINE_TERMINATOR`] to `path`.
    ///
    /// Success means the bytes were accepted locally, not that the device
    /// received them. Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// - `BridgeError::NotConnected` if no connection is live on `path`
    /// - `BridgeError::Write` if the port refused the data
    pub fn send(&self, path: &str, data: &str) -> BridgeResult<usize> {
        self.with_slot(path, false, |slot| -> BridgeResult<usize> {
            let connection = slot
                .connection
                .as_mut()
                .ok_or_else(|| BridgeError::NotConnected(path.to_string()))?;
            let written = connection
                .send_line(data, LINE_TERMINATOR)
                .map_err(|source| BridgeError::Write {
                    path: path.to_string(),
                    source,
                })?;
            debug!(path, written, "sent");
            Ok(written)
        })
        .unwrap_or_else(|| Err(BridgeError::NotConnected(path.to_string())))
    }

    /// The most recent `limit` records for `path`, oldest first.
    ///
    /// `None` means there is no history buffer at all for `path` (never
    /// connected, or disconnected since), as opposed to `Some(vec![])` for a
    /// connection that has not received anything yet.
    pub fn read_history(&self, path: &str, limit: usize) -> Option<Vec<Record>> {
        let history = self.with_slot(path, false, |slot| slot.history.clone())??;
        let snapshot = history.lock().tail(limit);
        Some(snapshot)
    }

    pub fn is_connected(&self, path: &str) -> bool {
        self.with_slot(path, false, |slot| slot.connection.is_some())
            .unwrap_or(false)
    }

    /// Paths with a live connection, sorted.
    pub fn connected_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .snapshot_paths()
            .into_iter()
            .filter(|path| self.is_connected(path))
            .collect();
        paths.sort();
        paths
    }

    /// Release every live connection. Returns how many were closed.
    pub fn disconnect_all(&self) -> usize {
        let mut closed = 0;
        for path in self.snapshot_paths() {
            match self.disconnect(&path) {
                Ok(()) => closed += 1,
                Err(BridgeError::NotConnected(_)) => {}
                Err(e) => warn!(path = %path, error = %e, "failed to release connection"),
            }
        }
        closed
    }

    fn snapshot_paths(&self) -> Vec<String> {
        self.slots.lock().keys().cloned().collect()
    }

    /// Run `f` under the slot lock for `path`.
    ///
    /// Returns `None` when `path` has no slot and `create` is false. A slot
    /// left with neither connection nor history is removed from the map
    /// before the lock is released; callers that raced with the removal
    /// retry against the current slot.
    fn with_slot<R>(
        &self,
        path: &str,
        create: bool,
        f: impl FnOnce(&mut PathSlot) -> R,
    ) -> Option<R> {
        loop {
            let slot = {
                let mut slots = self.slots.lock();
                match slots.get(path) {
                    Some(slot) => Arc::clone(slot),
                    None if create => Arc::clone(slots.entry(path.to_string()).or_default()),
                    None => return None,
                }
            };

            let mut guard = slot.lock();
            let mut slots = self.slots.lock();
            let current = slots.get(path).is_some_and(|s| Arc::ptr_eq(s, &slot));
            if !current {
                continue;
            }
            drop(slots);

            let result = f(&mut *guard);

            if guard.is_vacant() {
                slots = self.slots.lock();
                slots.remove(path);
            }
            return Some(result);
        }
    }
}

impl Drop for ConnectionRegistry {
    fn drop(&mut self) {
        let closed = self.disconnect_all();
        if closed > 0 {
            debug!(closed, "released connections on registry drop");
        }
    }
}

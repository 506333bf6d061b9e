//! A live serial session and the reader thread that feeds its history.

use crate::error::BridgeError;
use crate::framer::LineFramer;
use crate::history::{Record, SharedHistory};
use crate::port::{PortError, SerialPortAdapter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, trace, warn};

const READ_CHUNK: usize = 1024;

/// One open serial session.
///
/// Owns the write handle; a cloned handle lives on the reader thread.
/// Dropping the connection stops and joins the reader, so both handles are
/// released before the drop returns.
#[derive(Debug)]
pub(crate) struct Connection {
    path: String,
    baud_rate: u32,
    reader: ReaderTask,
    writer: Box<dyn SerialPortAdapter>,
}

#[derive(Debug)]
struct ReaderTask {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Connection {
    /// Attach a reader thread to `port` that appends every complete line to
    /// `history`.
    pub(crate) fn start(
        path: &str,
        baud_rate: u32,
        port: Box<dyn SerialPortAdapter>,
        history: SharedHistory,
    ) -> Result<Self, PortError> {
        let reader_port = port.try_clone_adapter()?;
        let stop = Arc::new(AtomicBool::new(false));

        let handle = {
            let stop = Arc::clone(&stop);
            let path = path.to_string();
            thread::Builder::new()
                .name(format!("serial-reader {path}"))
                .spawn(move || read_loop(path, reader_port, history, stop))?
        };

        Ok(Self {
            path: path.to_string(),
            baud_rate,
            reader: ReaderTask {
                stop,
                handle: Some(handle),
            },
            writer: port,
        })
    }

    pub(crate) fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    /// Write `data` followed by `terminator`. Returns bytes accepted.
    pub(crate) fn send_line(&mut self, data: &str, terminator: &str) -> Result<usize, PortError> {
        let mut frame = String::with_capacity(data.len() + terminator.len());
        frame.push_str(data);
        frame.push_str(terminator);
        self.writer.write_bytes(frame.as_bytes())
    }

    /// Whether the reader thread has exited (stream closed or faulted).
    #[cfg(test)]
    pub(crate) fn reader_finished(&self) -> bool {
        self.reader
            .handle
            .as_ref()
            .map_or(true, |handle| handle.is_finished())
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.reader.stop.store(true, Ordering::Release);
        if let Some(handle) = self.reader.handle.take() {
            if handle.join().is_err() {
                warn!(path = %self.path, "serial reader thread panicked during release");
            }
        }
        debug!(path = %self.path, "connection released");
    }
}

fn read_loop(
    path: String,
    mut port: Box<dyn SerialPortAdapter>,
    history: SharedHistory,
    stop: Arc<AtomicBool>,
) {
    let mut framer = LineFramer::new();
    let mut buffer = [0u8; READ_CHUNK];

    while !stop.load(Ordering::Acquire) {
        match port.read_bytes(&mut buffer) {
            Ok(0) => {
                debug!(path = %path, "serial stream closed by device");
                break;
            }
            Ok(n) => framer.feed(&buffer[..n], |line| {
                trace!(path = %path, line = %line, "line received");
                history.lock().push(Record::received(&line));
            }),
            Err(e) if e.is_transient() => continue,
            Err(source) => {
                let fault = BridgeError::StreamFault {
                    path: path.clone(),
                    source,
                };
                error!(kind = fault.kind(), "{fault}");
                break;
            }
        }
    }

    let discarded = framer.finish();
    if discarded > 0 {
        debug!(path = %path, discarded, "dropped unterminated trailing bytes");
    }
}

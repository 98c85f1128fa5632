//! JSON-lines input surface adapter.
//!
//! The on-screen task UI lives outside this crate. Whatever hosts it (a web
//! page, a terminal front end, a replay file) forwards its notifications as
//! one JSON `StudyInput` per line; this collector reads them on a background
//! thread and hands them to the main loop over a channel.

use crate::collector::types::StudyInput;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::io::BufRead;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// Capacity of the input channel.
const CHANNEL_CAPACITY: usize = 10_000;

/// Errors that can occur during input collection.
#[derive(Debug)]
pub enum CollectorError {
    AlreadyRunning,
    SpawnFailed(String),
}

impl std::fmt::Display for CollectorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectorError::AlreadyRunning => write!(f, "Collector is already running"),
            CollectorError::SpawnFailed(e) => write!(f, "Could not start reader thread: {e}"),
        }
    }
}

impl std::error::Error for CollectorError {}

/// Reads `StudyInput`s from a line-oriented source.
pub struct JsonLinesCollector {
    sender: Sender<StudyInput>,
    receiver: Receiver<StudyInput>,
    running: Arc<AtomicBool>,
    rejected_lines: Arc<AtomicU64>,
    reader: Option<JoinHandle<()>>,
}

impl JsonLinesCollector {
    /// Create a new collector with an empty channel.
    pub fn new() -> Self {
        let (sender, receiver) = bounded(CHANNEL_CAPACITY);
        Self {
            sender,
            receiver,
            running: Arc::new(AtomicBool::new(false)),
            rejected_lines: Arc::new(AtomicU64::new(0)),
            reader: None,
        }
    }

    /// Start reading lines from `source` on a background thread.
    ///
    /// Blank lines are skipped; lines that do not parse are counted and
    /// dropped. The thread ends at end of input or after `stop`.
    pub fn start<R>(&mut self, source: R) -> Result<(), CollectorError>
    where
        R: BufRead + Send + 'static,
    {
        if self.running.load(Ordering::SeqCst) {
            return Err(CollectorError::AlreadyRunning);
        }
        self.running.store(true, Ordering::SeqCst);

        let sender = self.sender.clone();
        let running = self.running.clone();
        let rejected = self.rejected_lines.clone();

        let handle = thread::Builder::new()
            .name("study-input".to_string())
            .spawn(move || {
                for (index, line) in source.lines().enumerate() {
                    if !running.load(Ordering::SeqCst) {
                        break;
                    }
                    let line = match line {
                        Ok(line) => line,
                        Err(e) => {
                            warn!("Input read failed: {e}");
                            break;
                        }
                    };
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<StudyInput>(trimmed) {
                        Ok(input) => {
                            if sender.send(input).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            rejected.fetch_add(1, Ordering::Relaxed);
                            warn!(line = index + 1, "Rejected input line: {e}");
                        }
                    }
                }
                running.store(false, Ordering::SeqCst);
                debug!("Input reader finished");
            })
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                CollectorError::SpawnFailed(e.to_string())
            })?;

        self.reader = Some(handle);
        Ok(())
    }

    /// Ask the reader to stop after the current line.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Whether the reader is still consuming input.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Get the receiver for study inputs.
    pub fn receiver(&self) -> &Receiver<StudyInput> {
        &self.receiver
    }

    /// A sender feeding the same channel, used by the session countdown.
    pub fn sender(&self) -> Sender<StudyInput> {
        self.sender.clone()
    }

    /// Number of lines that could not be parsed.
    pub fn rejected_lines(&self) -> u64 {
        self.rejected_lines.load(Ordering::Relaxed)
    }

    /// Try to receive an input without blocking.
    pub fn try_recv(&self) -> Option<StudyInput> {
        self.receiver.try_recv().ok()
    }
}

impl Default for JsonLinesCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for JsonLinesCollector {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::types::RawKeyInput;
    use std::io::Cursor;
    use std::time::Duration;

    #[test]
    fn test_reads_inputs_in_order() {
        let source = Cursor::new(
            "{\"action\":\"advance\"}\n\
             \n\
             {\"action\":\"key\",\"type\":\"keydown\",\"key\":\"a\",\"code\":\"KeyA\",\"timestamp\":5}\n\
             not json\n\
             {\"action\":\"focus\"}\n",
        );

        let mut collector = JsonLinesCollector::new();
        collector.start(source).unwrap();

        let rx = collector.receiver().clone();
        let first = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        let second = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        let third = rx.recv_timeout(Duration::from_secs(1)).unwrap();

        assert_eq!(first, StudyInput::Advance);
        assert_eq!(second, StudyInput::Key(RawKeyInput::down("a", "KeyA").at(5.0)));
        assert_eq!(third, StudyInput::Focus);

        if let Some(handle) = collector.reader.take() {
            handle.join().unwrap();
        }
        assert_eq!(collector.rejected_lines(), 1);
        assert!(!collector.is_running());
    }

    #[test]
    fn test_double_start_rejected() {
        let mut collector = JsonLinesCollector::new();
        collector.running.store(true, Ordering::SeqCst);
        let result = collector.start(Cursor::new(""));
        assert!(matches!(result, Err(CollectorError::AlreadyRunning)));
    }
}

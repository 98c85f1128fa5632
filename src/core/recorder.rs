//! Event recorder for a single session context.
//!
//! The recorder only appends. It never computes statistics.

use crate::collector::types::{is_tracked_key, KeyEvent, RawKeyInput};
use crate::core::session::{check_timestamp, Condition, LogError, SessionLog};
use std::time::Instant;
use tracing::debug;

/// Errors raised when an input cannot be recorded.
#[derive(Debug, Clone, PartialEq)]
pub enum RecorderError {
    /// The session has not begun, or has already ended
    NotRecording(Condition),
    /// The input's timestamp violates log ordering
    Rejected(LogError),
}

impl std::fmt::Display for RecorderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecorderError::NotRecording(condition) => {
                write!(f, "The {condition} session is not recording")
            }
            RecorderError::Rejected(e) => write!(f, "Input rejected: {e}"),
        }
    }
}

impl std::error::Error for RecorderError {}

impl From<LogError> for RecorderError {
    fn from(e: LogError) -> Self {
        RecorderError::Rejected(e)
    }
}

/// Appends tracked key transitions to one condition's log.
#[derive(Debug)]
pub struct EventRecorder {
    condition: Condition,
    events: Vec<KeyEvent>,
    /// Start-of-session time reference, set while recording
    started_at: Option<Instant>,
    /// How many times the current session was (re)started
    restarts: u32,
}

impl EventRecorder {
    pub fn new(condition: Condition) -> Self {
        Self {
            condition,
            events: Vec::new(),
            started_at: None,
            restarts: 0,
        }
    }

    pub fn condition(&self) -> Condition {
        self.condition
    }

    /// Begin (or restart) the session.
    ///
    /// Discards any events captured so far and arms a fresh time reference.
    pub fn begin_session(&mut self) {
        if self.started_at.is_some() {
            self.restarts += 1;
            debug!(
                condition = %self.condition,
                discarded = self.events.len(),
                "Session restarted on refocus"
            );
        }
        self.events.clear();
        self.started_at = Some(Instant::now());
    }

    pub fn is_recording(&self) -> bool {
        self.started_at.is_some()
    }

    /// Number of refocus restarts since the recorder was created.
    pub fn restarts(&self) -> u32 {
        self.restarts
    }

    /// Number of events captured in the current session.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Milliseconds elapsed since the session's time reference.
    pub fn elapsed_ms(&self) -> Option<f64> {
        self.started_at
            .map(|start| start.elapsed().as_secs_f64() * 1000.0)
    }

    /// Record a key notification.
    ///
    /// Returns `Ok(false)` when the key is not tracked and nothing was
    /// appended.
    pub fn record(&mut self, input: &RawKeyInput) -> Result<bool, RecorderError> {
        let Some(elapsed) = self.elapsed_ms() else {
            return Err(RecorderError::NotRecording(self.condition));
        };
        if !is_tracked_key(&input.key) {
            return Ok(false);
        }

        let timestamp = input.timestamp.unwrap_or(elapsed);
        let previous = self.events.last().map(|e| e.timestamp);
        check_timestamp(self.events.len(), previous, timestamp)?;

        self.events.push(KeyEvent {
            kind: input.kind,
            key: input.key.clone(),
            code: input.code.clone(),
            timestamp,
        });
        Ok(true)
    }

    /// Freeze the session and hand over its log.
    ///
    /// The recorder goes idle; nothing is captured until the next
    /// `begin_session`.
    pub fn end_session(&mut self) -> Result<SessionLog, RecorderError> {
        if self.started_at.take().is_none() {
            return Err(RecorderError::NotRecording(self.condition));
        }
        let events = std::mem::take(&mut self.events);
        debug!(condition = %self.condition, events = events.len(), "Session ended");
        Ok(SessionLog::from_recorded(self.condition, events))
    }
}

//! Per-condition session logs.
//!
//! A study runs two sessions, one per condition. Each owns an ordered log of
//! key events; insertion order is temporal order.

use crate::collector::types::KeyEvent;
use serde::{Deserialize, Serialize};

/// The typing condition a session belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    Relaxed,
    Stressed,
}

impl Condition {
    /// Both conditions in study (and export) order.
    pub const ALL: [Condition; 2] = [Condition::Relaxed, Condition::Stressed];

    pub fn as_str(&self) -> &'static str {
        match self {
            Condition::Relaxed => "relaxed",
            Condition::Stressed => "stressed",
        }
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reasons a sequence of events is not a valid session log.
#[derive(Debug, Clone, PartialEq)]
pub enum LogError {
    /// A timestamp is negative, NaN or infinite
    InvalidTimestamp { index: usize, timestamp: f64 },
    /// A timestamp is earlier than the one before it
    OutOfOrder {
        index: usize,
        previous: f64,
        timestamp: f64,
    },
}

impl std::fmt::Display for LogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogError::InvalidTimestamp { index, timestamp } => {
                write!(f, "Event {index} has invalid timestamp {timestamp}")
            }
            LogError::OutOfOrder {
                index,
                previous,
                timestamp,
            } => write!(
                f,
                "Event {index} at {timestamp}ms is earlier than the previous event at {previous}ms"
            ),
        }
    }
}

impl std::error::Error for LogError {}

/// Check that a timestamp may appear in a log after `previous`.
pub(crate) fn check_timestamp(
    index: usize,
    previous: Option<f64>,
    timestamp: f64,
) -> Result<(), LogError> {
    if !timestamp.is_finite() || timestamp < 0.0 {
        return Err(LogError::InvalidTimestamp { index, timestamp });
    }
    match previous {
        Some(previous) if timestamp < previous => Err(LogError::OutOfOrder {
            index,
            previous,
            timestamp,
        }),
        _ => Ok(()),
    }
}

/// A completed, ordered event log for one condition.
///
/// Logs are only built through validation, so every log handed to the
/// extractor has finite, non-negative, non-decreasing timestamps.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionLog {
    condition: Condition,
    events: Vec<KeyEvent>,
}

impl SessionLog {
    /// Validate a recorded event sequence.
    pub fn from_events(condition: Condition, events: Vec<KeyEvent>) -> Result<Self, LogError> {
        let mut previous = None;
        for (index, event) in events.iter().enumerate() {
            check_timestamp(index, previous, event.timestamp)?;
            previous = Some(event.timestamp);
        }
        Ok(Self { condition, events })
    }

    /// Build a log from events the recorder has already checked.
    pub(crate) fn from_recorded(condition: Condition, events: Vec<KeyEvent>) -> Self {
        Self { condition, events }
    }

    pub fn condition(&self) -> Condition {
        self.condition
    }

    pub fn events(&self) -> &[KeyEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Time between the first and last event in milliseconds.
    pub fn duration_ms(&self) -> f64 {
        match (self.events.first(), self.events.last()) {
            (Some(first), Some(last)) => last.timestamp - first.timestamp,
            _ => 0.0,
        }
    }
}

/// A study recorded elsewhere: raw event lists keyed by condition.
///
/// A condition that is absent never reached extraction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordedStudy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relaxed: Option<Vec<KeyEvent>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stressed: Option<Vec<KeyEvent>>,
}

impl RecordedStudy {
    /// Validate every present condition into a session log.
    pub fn into_logs(self) -> Result<Vec<SessionLog>, (Condition, LogError)> {
        let mut logs = Vec::new();
        for (condition, events) in [
            (Condition::Relaxed, self.relaxed),
            (Condition::Stressed, self.stressed),
        ] {
            if let Some(events) = events {
                let log = SessionLog::from_events(condition, events).map_err(|e| (condition, e))?;
                logs.push(log);
            }
        }
        Ok(logs)
    }
}

//! Key event types for the keystroke study.
//!
//! Unlike a background sensor, a study session records the logical key value
//! and physical code of every tracked key, because pairing and error counting
//! depend on them. Only printable characters, space and Backspace are tracked.

use crate::core::session::Condition;
use serde::{Deserialize, Serialize};

/// Logical key value recorded for the erase key.
pub const BACKSPACE: &str = "Backspace";

/// Whether a key transition is a press or a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyEventKind {
    KeyDown,
    KeyUp,
}

/// A single recorded key transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyEvent {
    /// Press or release
    #[serde(rename = "type")]
    pub kind: KeyEventKind,
    /// Logical key value (a single character, " " or "Backspace")
    pub key: String,
    /// Physical key identifier, stable across repeats
    pub code: String,
    /// Monotonic time in milliseconds
    pub timestamp: f64,
}

impl KeyEvent {
    pub fn new(
        kind: KeyEventKind,
        key: impl Into<String>,
        code: impl Into<String>,
        timestamp: f64,
    ) -> Self {
        Self {
            kind,
            key: key.into(),
            code: code.into(),
            timestamp,
        }
    }

    pub fn is_key_down(&self) -> bool {
        self.kind == KeyEventKind::KeyDown
    }

    pub fn is_backspace(&self) -> bool {
        self.key == BACKSPACE
    }
}

/// A raw key notification from the input surface.
///
/// The timestamp is optional: when the surface does not supply one, the
/// recorder stamps the event against its own session time reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawKeyInput {
    #[serde(rename = "type")]
    pub kind: KeyEventKind,
    pub key: String,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
}

impl RawKeyInput {
    /// A press notification without a timestamp.
    pub fn down(key: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            kind: KeyEventKind::KeyDown,
            key: key.into(),
            code: code.into(),
            timestamp: None,
        }
    }

    /// A release notification without a timestamp.
    pub fn up(key: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            kind: KeyEventKind::KeyUp,
            key: key.into(),
            code: code.into(),
            timestamp: None,
        }
    }

    pub fn at(mut self, timestamp: f64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Everything the study controller reacts to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum StudyInput {
    /// Move to the next phase (start, "done", "finish")
    Advance,
    /// The active input surface regained focus
    Focus,
    /// A key press or release
    Key(RawKeyInput),
    /// The countdown for a session ran out
    Expired { condition: Condition },
}

/// Check whether a logical key value is recorded at all.
///
/// Modifiers, arrows, function keys and other named keys are ignored.
pub fn is_tracked_key(key: &str) -> bool {
    if key == BACKSPACE {
        return true;
    }
    let mut chars = key.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => !c.is_control(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracked_keys() {
        assert!(is_tracked_key("a"));
        assert!(is_tracked_key("Z"));
        assert!(is_tracked_key(" "));
        assert!(is_tracked_key(","));
        assert!(is_tracked_key("é"));
        assert!(is_tracked_key("Backspace"));
    }

    #[test]
    fn test_untracked_keys() {
        assert!(!is_tracked_key("Shift"));
        assert!(!is_tracked_key("ArrowLeft"));
        assert!(!is_tracked_key("F5"));
        assert!(!is_tracked_key("Enter"));
        assert!(!is_tracked_key("\t"));
        assert!(!is_tracked_key(""));
    }

    #[test]
    fn test_key_event_wire_format() {
        let json = r#"{"type":"keydown","key":"a","code":"KeyA","timestamp":12.5}"#;
        let event: KeyEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.kind, KeyEventKind::KeyDown);
        assert_eq!(event.code, "KeyA");
        assert_eq!(event.timestamp, 12.5);

        let unknown = r#"{"type":"keypress","key":"a","code":"KeyA","timestamp":1.0}"#;
        assert!(serde_json::from_str::<KeyEvent>(unknown).is_err());
    }

    #[test]
    fn test_study_input_parsing() {
        let advance: StudyInput = serde_json::from_str(r#"{"action":"advance"}"#).unwrap();
        assert_eq!(advance, StudyInput::Advance);

        let key: StudyInput =
            serde_json::from_str(r#"{"action":"key","type":"keyup","key":" ","code":"Space"}"#)
                .unwrap();
        assert_eq!(key, StudyInput::Key(RawKeyInput::up(" ", "Space")));
    }
}

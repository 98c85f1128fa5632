//! Input collection for the keystroke study.
//!
//! This module defines the key event types and the adapter that turns an
//! external input surface's notifications into study inputs.

pub mod jsonl;
pub mod types;

// Re-export commonly used types
pub use jsonl::{CollectorError, JsonLinesCollector};
pub use types::{is_tracked_key, KeyEvent, KeyEventKind, RawKeyInput, StudyInput, BACKSPACE};

//! Keystroke Study Agent - keystroke dynamics capture for typing studies.
//!
//! A study runs two timed typing sessions, "relaxed" then "stressed". During
//! each, key presses and releases are recorded with high-resolution
//! timestamps; when a session ends its log is turned into one feature
//! record (hold times, release-to-release latencies, error rate, accuracy,
//! typing speed) for export.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Keystroke Study Agent                     │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐         │
//! │  │  Collector  │──▶│  Recorder   │──▶│  Features   │         │
//! │  │ (JSON lines)│   │(per session)│   │  (extract)  │         │
//! │  └─────────────┘   └─────────────┘   └─────────────┘         │
//! │         │                 ▲                  │               │
//! │         ▼                 │                  ▼               │
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐         │
//! │  │Transparency │   │ Controller  │   │   Export    │         │
//! │  │    Log      │   │ + Countdown │   │ (CSV/JSON)  │         │
//! │  └─────────────┘   └─────────────┘   └─────────────┘         │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use keystroke_study_agent::collector::RawKeyInput;
//! use keystroke_study_agent::core::{extract_features, Condition, EventRecorder};
//!
//! let mut recorder = EventRecorder::new(Condition::Relaxed);
//! recorder.begin_session();
//! recorder.record(&RawKeyInput::down("h", "KeyH").at(0.0)).unwrap();
//! recorder.record(&RawKeyInput::up("h", "KeyH").at(90.0)).unwrap();
//! recorder.record(&RawKeyInput::down("i", "KeyI").at(150.0)).unwrap();
//! recorder.record(&RawKeyInput::up("i", "KeyI").at(230.0)).unwrap();
//!
//! let log = recorder.end_session().unwrap();
//! let features = extract_features(&log);
//! assert_eq!(features.features().unwrap().hold_time_mean, 85.0);
//! ```

pub mod collector;
pub mod config;
pub mod core;
pub mod study;
pub mod transparency;

// Re-export key types at crate root for convenience
pub use collector::{JsonLinesCollector, KeyEvent, KeyEventKind, RawKeyInput, StudyInput};
pub use config::{Config, ConfigError};
pub use crate::core::{
    extract_features, Condition, EventRecorder, ExportBuilder, Extraction, FeatureRecord,
    SessionLog,
};
pub use study::{Phase, StudyController};
pub use transparency::{SharedTransparencyLog, TransparencyLog, TransparencyStats};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Notice shown to participants before recording starts.
pub const PARTICIPANT_NOTICE: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║              KEYSTROKE STUDY - PARTICIPANT NOTICE                ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  You will type two short passages: one at your own pace, one     ║
║  under a countdown.                                              ║
║                                                                  ║
║  ✓ WHAT WE RECORD WHILE A TASK IS ACTIVE:                        ║
║    • Letters, digits, punctuation, space and Backspace           ║
║    • When each key goes down and comes back up                   ║
║                                                                  ║
║  ✗ WHAT WE NEVER RECORD:                                         ║
║    • Modifier, arrow, function or other named keys               ║
║    • Anything typed outside the two tasks                        ║
║                                                                  ║
║  Only summary timing features are exported unless raw event      ║
║  archiving is explicitly enabled.                                ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;

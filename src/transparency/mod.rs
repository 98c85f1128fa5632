//! Transparency module for the keystroke study.
//!
//! This module tracks what the agent recorded and exported, so a
//! participant can audit a run.

pub mod log;

// Re-export commonly used types
pub use log::{
    create_shared_log, create_shared_log_with_persistence, read_persisted, PersistedStats,
    SharedTransparencyLog, TransparencyLog, TransparencyStats,
};

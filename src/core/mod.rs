//! Core pipeline of the keystroke study.
//!
//! This module contains:
//! - Session logs and the recorder that fills them
//! - Feature extraction from completed logs
//! - Export of feature records

pub mod export;
pub mod features;
pub mod recorder;
pub mod session;

// Re-export commonly used types
pub use export::{
    to_csv_string, write_csv, ExportBuilder, ExportError, ExportRow, StudyExport, FEATURE_COLUMNS,
    PRODUCER_NAME,
};
pub use features::{
    extract_features, sample_stats, Extraction, FeatureRecord, SampleStats, MIN_EVENTS,
};
pub use recorder::{EventRecorder, RecorderError};
pub use session::{Condition, LogError, RecordedStudy, SessionLog};

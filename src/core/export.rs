//! Export of extracted session features.
//!
//! Two formats are produced:
//! - a delimited feature table whose header and column order are fixed,
//!   so existing consumers of the study data can read it unchanged
//! - a JSON study document carrying producer metadata and, optionally,
//!   the raw event logs

use crate::collector::types::KeyEvent;
use crate::core::features::{Extraction, FeatureRecord};
use crate::core::session::{Condition, SessionLog};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::io::Write;
use uuid::Uuid;

/// The current JSON export format version.
pub const EXPORT_VERSION: &str = "1.0";

/// The name of this producer.
pub const PRODUCER_NAME: &str = "keystroke-study-agent";

/// Feature table header, in column order.
pub const FEATURE_COLUMNS: [&str; 13] = [
    "condition",
    "total_keys_pressed",
    "total_backspaces",
    "error_rate",
    "typing_accuracy",
    "hold_time_mean",
    "hold_time_std",
    "hold_time_median",
    "latency_mean",
    "latency_std",
    "latency_median",
    "typing_speed_wpm",
    "session_duration_ms",
];

/// Text written for an undefined ratio.
pub const UNDEFINED: &str = "NaN";

/// Export errors.
#[derive(Debug)]
pub enum ExportError {
    Csv(csv::Error),
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl std::fmt::Display for ExportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportError::Csv(e) => write!(f, "CSV error: {e}"),
            ExportError::Io(e) => write!(f, "IO error: {e}"),
            ExportError::Json(e) => write!(f, "JSON error: {e}"),
        }
    }
}

impl std::error::Error for ExportError {}

impl From<csv::Error> for ExportError {
    fn from(e: csv::Error) -> Self {
        ExportError::Csv(e)
    }
}

impl From<std::io::Error> for ExportError {
    fn from(e: std::io::Error) -> Self {
        ExportError::Io(e)
    }
}

impl From<serde_json::Error> for ExportError {
    fn from(e: serde_json::Error) -> Self {
        ExportError::Json(e)
    }
}

/// One extracted session, ready for export.
#[derive(Debug, Clone, Copy)]
pub struct ExportRow<'a> {
    pub condition: Condition,
    pub extraction: &'a Extraction,
}

impl<'a> ExportRow<'a> {
    pub fn new(condition: Condition, extraction: &'a Extraction) -> Self {
        Self {
            condition,
            extraction,
        }
    }

    /// Field values in `FEATURE_COLUMNS` order.
    ///
    /// A session without enough data keeps its condition name and leaves
    /// every value empty.
    pub fn fields(&self) -> Vec<String> {
        let mut fields = Vec::with_capacity(FEATURE_COLUMNS.len());
        fields.push(self.condition.as_str().to_string());
        match self.extraction {
            Extraction::Complete(record) => fields.extend(record_fields(record)),
            Extraction::InsufficientData { .. } => {
                fields.resize(FEATURE_COLUMNS.len(), String::new());
            }
        }
        fields
    }
}

fn record_fields(record: &FeatureRecord) -> [String; 12] {
    [
        record.total_keys_pressed.to_string(),
        record.total_backspaces.to_string(),
        format_optional(record.error_rate),
        format_optional(record.typing_accuracy),
        format_decimal(record.hold_time_mean),
        format_decimal(record.hold_time_std),
        format_decimal(record.hold_time_median),
        format_decimal(record.latency_mean),
        format_decimal(record.latency_std),
        format_decimal(record.latency_median),
        format_optional(record.typing_speed_wpm),
        format_decimal(record.session_duration_ms),
    ]
}

/// Shortest decimal text that round-trips, without a trailing `.0`.
pub fn format_decimal(value: f64) -> String {
    if value.is_nan() {
        return UNDEFINED.to_string();
    }
    if value == 0.0 {
        // Also folds negative zero
        return "0".to_string();
    }
    format!("{value}")
}

fn format_optional(value: Option<f64>) -> String {
    value.map_or_else(|| UNDEFINED.to_string(), format_decimal)
}

/// Write the feature table: a header and one row per extracted condition.
///
/// Rows are emitted in study order (relaxed, then stressed) regardless of
/// the order given. Conditions that never reached extraction have no row.
pub fn write_csv<W: Write>(
    writer: W,
    rows: &[ExportRow<'_>],
    delimiter: u8,
) -> Result<(), ExportError> {
    let mut ordered: Vec<&ExportRow<'_>> = rows.iter().collect();
    ordered.sort_by_key(|row| row.condition);

    let mut csv_writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer);

    csv_writer.write_record(FEATURE_COLUMNS)?;
    for row in ordered {
        csv_writer.write_record(row.fields())?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Render the feature table to a string.
pub fn to_csv_string(rows: &[ExportRow<'_>], delimiter: u8) -> Result<String, ExportError> {
    let mut buffer = Vec::new();
    write_csv(&mut buffer, rows, delimiter)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Producer metadata for a JSON export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// One condition in a JSON export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionExport {
    pub condition: Condition,
    #[serde(flatten)]
    pub extraction: Extraction,
    /// Raw events, when archiving was requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub events: Option<Vec<KeyEvent>>,
}

/// A complete JSON study export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyExport {
    pub export_version: String,
    pub export_id: String,
    /// When this export was produced (RFC3339)
    pub exported_at: String,
    pub producer: ExportProducer,
    pub columns: Vec<String>,
    pub sessions: Vec<SessionExport>,
}

/// Builder for JSON study exports.
pub struct ExportBuilder {
    instance_id: Uuid,
}

impl ExportBuilder {
    /// Create a builder with a unique instance ID.
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4(),
        }
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    /// Build an export from extracted rows.
    ///
    /// `logs` are attached as raw events to the row with the same condition.
    pub fn build(&self, rows: &[ExportRow<'_>], logs: &[&SessionLog]) -> StudyExport {
        let mut ordered: Vec<&ExportRow<'_>> = rows.iter().collect();
        ordered.sort_by_key(|row| row.condition);

        let sessions = ordered
            .into_iter()
            .map(|row| SessionExport {
                condition: row.condition,
                extraction: row.extraction.clone(),
                events: logs
                    .iter()
                    .find(|log| log.condition() == row.condition)
                    .map(|log| log.events().to_vec()),
            })
            .collect();

        StudyExport {
            export_version: EXPORT_VERSION.to_string(),
            export_id: Uuid::new_v4().to_string(),
            exported_at: Utc::now().to_rfc3339(),
            producer: ExportProducer {
                name: PRODUCER_NAME.to_string(),
                version: crate::VERSION.to_string(),
                instance_id: self.instance_id.to_string(),
            },
            columns: FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect(),
            sessions,
        }
    }

    /// Build an export and serialize it as pretty JSON.
    pub fn to_json(
        &self,
        rows: &[ExportRow<'_>],
        logs: &[&SessionLog],
    ) -> Result<String, ExportError> {
        Ok(serde_json::to_string_pretty(&self.build(rows, logs))?)
    }
}

impl Default for ExportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::types::KeyEventKind;

    fn record() -> FeatureRecord {
        FeatureRecord {
            total_keys_pressed: 10,
            total_backspaces: 2,
            error_rate: Some(0.2),
            typing_accuracy: Some(0.6),
            hold_time_mean: 95.5,
            hold_time_std: 12.25,
            hold_time_median: 96.0,
            latency_mean: 180.0,
            latency_std: 40.5,
            latency_median: 175.0,
            typing_speed_wpm: Some(10.0),
            session_duration_ms: 60000.0,
        }
    }

    #[test]
    fn test_decimal_formatting() {
        assert_eq!(format_decimal(0.2), "0.2");
        assert_eq!(format_decimal(10.0), "10");
        assert_eq!(format_decimal(-0.0), "0");
        assert_eq!(format_decimal(-0.25), "-0.25");
        assert_eq!(format_decimal(f64::NAN), "NaN");
        assert_eq!(format_optional(None), "NaN");
    }

    #[test]
    fn test_csv_layout() {
        let relaxed = Extraction::Complete(record());
        let stressed = Extraction::Complete(FeatureRecord {
            typing_speed_wpm: None,
            ..record()
        });

        // Deliberately out of order
        let rows = [
            ExportRow::new(Condition::Stressed, &stressed),
            ExportRow::new(Condition::Relaxed, &relaxed),
        ];
        let csv = to_csv_string(&rows, b',').unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "condition,total_keys_pressed,total_backspaces,error_rate,typing_accuracy,\
             hold_time_mean,hold_time_std,hold_time_median,latency_mean,latency_std,\
             latency_median,typing_speed_wpm,session_duration_ms"
        );
        assert_eq!(lines[1], "relaxed,10,2,0.2,0.6,95.5,12.25,96,180,40.5,175,10,60000");
        assert_eq!(lines[2], "stressed,10,2,0.2,0.6,95.5,12.25,96,180,40.5,175,NaN,60000");
        assert!(csv.ends_with('\n'));
        assert!(!csv.contains('\r'));
    }

    #[test]
    fn test_missing_condition_has_no_row() {
        let relaxed = Extraction::Complete(record());
        let csv = to_csv_string(&[ExportRow::new(Condition::Relaxed, &relaxed)], b',').unwrap();
        assert_eq!(csv.lines().count(), 2);
        assert!(!csv.contains("stressed"));
    }

    #[test]
    fn test_insufficient_row_placeholder() {
        let short = Extraction::InsufficientData { event_count: 2 };
        let csv = to_csv_string(&[ExportRow::new(Condition::Stressed, &short)], b',').unwrap();
        assert_eq!(csv.lines().nth(1), Some("stressed,,,,,,,,,,,,"));
    }

    #[test]
    fn test_custom_delimiter() {
        let relaxed = Extraction::Complete(record());
        let tsv = to_csv_string(&[ExportRow::new(Condition::Relaxed, &relaxed)], b'\t').unwrap();
        let header = tsv.lines().next().unwrap();
        assert_eq!(header.split('\t').count(), FEATURE_COLUMNS.len());
    }

    #[test]
    fn test_json_export() {
        let relaxed = Extraction::Complete(record());
        let stressed = Extraction::InsufficientData { event_count: 1 };
        let log = SessionLog::from_events(
            Condition::Stressed,
            vec![KeyEvent::new(KeyEventKind::KeyDown, "a", "KeyA", 3.0)],
        )
        .unwrap();

        let builder = ExportBuilder::new();
        let rows = [
            ExportRow::new(Condition::Relaxed, &relaxed),
            ExportRow::new(Condition::Stressed, &stressed),
        ];
        let export = builder.build(&rows, &[&log]);

        assert_eq!(export.export_version, EXPORT_VERSION);
        assert_eq!(export.producer.name, PRODUCER_NAME);
        assert_eq!(export.producer.instance_id, builder.instance_id().to_string());
        assert_eq!(export.sessions.len(), 2);
        assert!(export.sessions[0].events.is_none());
        assert_eq!(export.sessions[1].events.as_ref().map(Vec::len), Some(1));

        let json: serde_json::Value = serde_json::to_value(&export).unwrap();
        assert_eq!(json["sessions"][0]["condition"], "relaxed");
        assert_eq!(json["sessions"][0]["status"], "complete");
        assert_eq!(json["sessions"][0]["error_rate"], 0.2);
        assert_eq!(json["sessions"][1]["status"], "insufficient_data");
        assert_eq!(json["sessions"][1]["events"][0]["type"], "keydown");
    }
}

//! Feature extraction from completed session logs.
//!
//! One feature record is computed per session, once, after the session ends.
//! Degenerate inputs never fail: empty samples yield zeros and undefined
//! ratios are reported as `None`.

use crate::collector::types::KeyEvent;
use crate::core::session::SessionLog;
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, OrderStatistics};
use std::collections::HashMap;
use tracing::debug;

/// Minimum number of events needed to compute features.
pub const MIN_EVENTS: usize = 4;

/// Characters per word for typing speed.
const CHARS_PER_WORD: f64 = 5.0;

const MS_PER_MINUTE: f64 = 60_000.0;

/// Summary statistics of a timing sample, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleStats {
    pub mean: f64,
    pub std: f64,
    pub median: f64,
}

/// Features computed for one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub total_keys_pressed: u64,
    pub total_backspaces: u64,
    /// Backspaces per key press; `None` when nothing was pressed
    pub error_rate: Option<f64>,
    /// `(pressed - 2 * backspaces) / pressed`, not clamped
    pub typing_accuracy: Option<f64>,
    pub hold_time_mean: f64,
    pub hold_time_std: f64,
    pub hold_time_median: f64,
    pub latency_mean: f64,
    pub latency_std: f64,
    pub latency_median: f64,
    /// Words per minute; `None` when the session has zero duration
    pub typing_speed_wpm: Option<f64>,
    pub session_duration_ms: f64,
}

impl FeatureRecord {
    pub fn hold_time(&self) -> SampleStats {
        SampleStats {
            mean: self.hold_time_mean,
            std: self.hold_time_std,
            median: self.hold_time_median,
        }
    }

    pub fn latency(&self) -> SampleStats {
        SampleStats {
            mean: self.latency_mean,
            std: self.latency_std,
            median: self.latency_median,
        }
    }
}

/// Result of extracting one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Extraction {
    Complete(FeatureRecord),
    /// The log was too short to say anything
    InsufficientData { event_count: usize },
}

impl Extraction {
    pub fn features(&self) -> Option<&FeatureRecord> {
        match self {
            Extraction::Complete(record) => Some(record),
            Extraction::InsufficientData { .. } => None,
        }
    }

    pub fn is_insufficient(&self) -> bool {
        matches!(self, Extraction::InsufficientData { .. })
    }
}

/// Compute the feature record for a completed session.
pub fn extract_features(log: &SessionLog) -> Extraction {
    let events = log.events();
    if events.len() < MIN_EVENTS {
        debug!(condition = %log.condition(), events = events.len(), "Not enough events");
        return Extraction::InsufficientData {
            event_count: events.len(),
        };
    }

    let pairing = pair_key_events(events);
    let latencies = release_latencies(events);

    let hold = sample_stats(&pairing.hold_times);
    let latency = sample_stats(&latencies);

    let pressed = pairing.pressed;
    let backspaces = pairing.backspaces;
    let (error_rate, typing_accuracy) = if pressed == 0 {
        (None, None)
    } else {
        let pressed_f = pressed as f64;
        let backspaces_f = backspaces as f64;
        (
            Some(backspaces_f / pressed_f),
            Some((pressed_f - 2.0 * backspaces_f) / pressed_f),
        )
    };

    let session_duration_ms = log.duration_ms();
    let total_chars = pressed as f64 - backspaces as f64;
    let typing_speed_wpm = words_per_minute(total_chars, session_duration_ms);

    Extraction::Complete(FeatureRecord {
        total_keys_pressed: pressed,
        total_backspaces: backspaces,
        error_rate,
        typing_accuracy,
        hold_time_mean: hold.mean,
        hold_time_std: hold.std,
        hold_time_median: hold.median,
        latency_mean: latency.mean,
        latency_std: latency.std,
        latency_median: latency.median,
        typing_speed_wpm,
        session_duration_ms,
    })
}

/// Counters and hold times from pairing presses with releases.
#[derive(Debug, Default)]
struct Pairing {
    pressed: u64,
    backspaces: u64,
    hold_times: Vec<f64>,
}

/// Pair each release with the latest unmatched press of the same code.
///
/// A repeated press overwrites the pending one. A release always consumes
/// the pending press, even when the hold time is not positive and is left
/// out of the sample. Releases with nothing pending are ignored.
fn pair_key_events(events: &[KeyEvent]) -> Pairing {
    let mut pending: HashMap<&str, f64> = HashMap::new();
    let mut pairing = Pairing::default();

    for event in events {
        if event.is_key_down() {
            pending.insert(event.code.as_str(), event.timestamp);
            pairing.pressed += 1;
            if event.is_backspace() {
                pairing.backspaces += 1;
            }
        } else if let Some(down) = pending.remove(event.code.as_str()) {
            let hold_ms = event.timestamp - down;
            if hold_ms > 0.0 {
                pairing.hold_times.push(hold_ms);
            }
        }
    }

    pairing
}

/// Gaps between consecutive non-Backspace releases, positive ones only.
fn release_latencies(events: &[KeyEvent]) -> Vec<f64> {
    let releases: Vec<f64> = events
        .iter()
        .filter(|e| !e.is_key_down() && !e.is_backspace())
        .map(|e| e.timestamp)
        .collect();

    releases
        .windows(2)
        .map(|pair| pair[1] - pair[0])
        .filter(|&latency| latency > 0.0)
        .collect()
}

/// Mean, population standard deviation and median of a sample.
///
/// The median is the element at index `n / 2` of the sorted sample, so an
/// even-sized sample reports its upper middle element rather than an average.
pub fn sample_stats(sample: &[f64]) -> SampleStats {
    if sample.is_empty() {
        return SampleStats::default();
    }

    let n = sample.len() as f64;
    let mean = sample.iter().sum::<f64>() / n;
    let variance = sample.iter().map(|&v| (v - mean).powi(2)).sum::<f64>() / n;

    // Order statistics are 1-based.
    let mut data = Data::new(sample.to_vec());
    let median = data.order_statistic(sample.len() / 2 + 1);

    SampleStats {
        mean,
        std: variance.sqrt(),
        median,
    }
}

/// Words per minute at five characters per word.
fn words_per_minute(total_chars: f64, duration_ms: f64) -> Option<f64> {
    if duration_ms == 0.0 {
        return None;
    }
    Some((total_chars / CHARS_PER_WORD) / (duration_ms / MS_PER_MINUTE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::types::KeyEventKind;
    use crate::core::session::Condition;

    fn down(key: &str, code: &str, timestamp: f64) -> KeyEvent {
        KeyEvent::new(KeyEventKind::KeyDown, key, code, timestamp)
    }

    fn up(key: &str, code: &str, timestamp: f64) -> KeyEvent {
        KeyEvent::new(KeyEventKind::KeyUp, key, code, timestamp)
    }

    fn log(events: Vec<KeyEvent>) -> SessionLog {
        SessionLog::from_events(Condition::Relaxed, events).unwrap()
    }

    fn complete(extraction: Extraction) -> FeatureRecord {
        match extraction {
            Extraction::Complete(record) => record,
            other => panic!("expected features, got {other:?}"),
        }
    }

    #[test]
    fn test_insufficient_data() {
        let extraction = extract_features(&log(vec![
            down("a", "KeyA", 0.0),
            up("a", "KeyA", 50.0),
            down("b", "KeyB", 100.0),
        ]));
        assert_eq!(extraction, Extraction::InsufficientData { event_count: 3 });
        assert!(extraction.features().is_none());

        let empty = extract_features(&log(Vec::new()));
        assert!(empty.is_insufficient());
    }

    #[test]
    fn test_hold_time_statistics() {
        // Holds of 100, 200 and 300 ms
        let record = complete(extract_features(&log(vec![
            down("a", "KeyA", 0.0),
            up("a", "KeyA", 100.0),
            down("b", "KeyB", 200.0),
            up("b", "KeyB", 400.0),
            down("c", "KeyC", 500.0),
            up("c", "KeyC", 800.0),
        ])));

        assert_eq!(record.hold_time_mean, 200.0);
        assert_eq!(record.hold_time_median, 200.0);
        let expected_std = (20_000.0f64 / 3.0).sqrt();
        assert!((record.hold_time_std - expected_std).abs() < 1e-9);
        assert_eq!(record.total_keys_pressed, 3);
        assert_eq!(record.session_duration_ms, 800.0);
    }

    #[test]
    fn test_overlapping_keys_pair_by_code() {
        // b is pressed before a is released
        let record = complete(extract_features(&log(vec![
            down("a", "KeyA", 0.0),
            down("b", "KeyB", 30.0),
            up("a", "KeyA", 80.0),
            up("b", "KeyB", 130.0),
        ])));

        assert_eq!(record.hold_time().mean, 90.0);
        assert_eq!(record.hold_time().median, 100.0);
    }

    #[test]
    fn test_unmatched_release_ignored() {
        let record = complete(extract_features(&log(vec![
            up("x", "KeyX", 0.0),
            down("a", "KeyA", 10.0),
            up("a", "KeyA", 60.0),
            up("a", "KeyA", 70.0),
        ])));

        assert_eq!(record.hold_time_mean, 50.0);
        assert_eq!(record.hold_time_std, 0.0);
        assert_eq!(record.total_keys_pressed, 1);
    }

    #[test]
    fn test_zero_hold_consumes_pairing() {
        // The same-millisecond tap must not pair with the later release
        let record = complete(extract_features(&log(vec![
            down("a", "KeyA", 10.0),
            up("a", "KeyA", 10.0),
            down("b", "KeyB", 20.0),
            up("b", "KeyB", 60.0),
            up("a", "KeyA", 500.0),
        ])));

        assert_eq!(record.hold_time_mean, 40.0);
        assert_eq!(record.hold_time_median, 40.0);
    }

    #[test]
    fn test_repeated_press_overwrites_pending() {
        // Auto-repeat: two presses, one release
        let record = complete(extract_features(&log(vec![
            down("a", "KeyA", 0.0),
            down("a", "KeyA", 40.0),
            up("a", "KeyA", 100.0),
            down("b", "KeyB", 150.0),
        ])));

        assert_eq!(record.total_keys_pressed, 3);
        assert_eq!(record.hold_time_mean, 60.0);
    }

    #[test]
    fn test_latency_skips_backspace_and_non_positive_gaps() {
        let record = complete(extract_features(&log(vec![
            down("a", "KeyA", 0.0),
            up("a", "KeyA", 100.0),
            down("Backspace", "Backspace", 120.0),
            up("Backspace", "Backspace", 150.0),
            down("b", "KeyB", 160.0),
            down("c", "KeyC", 170.0),
            up("b", "KeyB", 250.0),
            up("c", "KeyC", 250.0),
            down("d", "KeyD", 300.0),
            up("d", "KeyD", 400.0),
        ])));

        // Non-backspace releases at 100, 250, 250, 400 -> gaps 150, 0, 150
        assert_eq!(record.latency_mean, 150.0);
        assert_eq!(record.latency_std, 0.0);
        assert_eq!(record.latency_median, 150.0);
    }

    #[test]
    fn test_error_rate_and_accuracy() {
        let mut events = Vec::new();
        let mut t = 0.0;
        for i in 0..10 {
            let (key, code) = if i < 2 {
                ("Backspace", "Backspace")
            } else {
                ("a", "KeyA")
            };
            events.push(down(key, code, t));
            events.push(up(key, code, t + 50.0));
            t += 100.0;
        }

        let record = complete(extract_features(&log(events)));
        assert_eq!(record.total_keys_pressed, 10);
        assert_eq!(record.total_backspaces, 2);
        assert_eq!(record.error_rate, Some(0.2));
        assert_eq!(record.typing_accuracy, Some(0.6));
    }

    #[test]
    fn test_accuracy_may_go_negative() {
        let record = complete(extract_features(&log(vec![
            down("a", "KeyA", 0.0),
            up("a", "KeyA", 10.0),
            down("Backspace", "Backspace", 20.0),
            up("Backspace", "Backspace", 30.0),
            down("Backspace", "Backspace", 40.0),
            up("Backspace", "Backspace", 50.0),
        ])));

        let accuracy = record.typing_accuracy.unwrap();
        assert!((accuracy - (3.0 - 4.0) / 3.0).abs() < 1e-12);
        assert!(accuracy < 0.0);
    }

    #[test]
    fn test_only_releases_has_undefined_ratios() {
        let record = complete(extract_features(&log(vec![
            up("a", "KeyA", 0.0),
            up("b", "KeyB", 10.0),
            up("c", "KeyC", 20.0),
            up("d", "KeyD", 30.0),
        ])));

        assert_eq!(record.total_keys_pressed, 0);
        assert_eq!(record.error_rate, None);
        assert_eq!(record.typing_accuracy, None);
        assert_eq!(record.hold_time(), SampleStats::default());
        assert_eq!(record.latency_mean, 10.0);
    }

    #[test]
    fn test_zero_duration_has_undefined_speed() {
        let record = complete(extract_features(&log(vec![
            down("a", "KeyA", 5.0),
            down("b", "KeyB", 5.0),
            up("a", "KeyA", 5.0),
            up("b", "KeyB", 5.0),
        ])));

        assert_eq!(record.session_duration_ms, 0.0);
        assert_eq!(record.typing_speed_wpm, None);
    }

    #[test]
    fn test_words_per_minute() {
        assert_eq!(words_per_minute(50.0, 60_000.0), Some(10.0));
        assert_eq!(words_per_minute(25.0, 30_000.0), Some(10.0));
        assert_eq!(words_per_minute(10.0, 0.0), None);
    }

    #[test]
    fn test_median_upper_middle() {
        assert_eq!(sample_stats(&[4.0, 1.0, 3.0, 2.0]).median, 3.0);
        assert_eq!(sample_stats(&[5.0, 1.0, 3.0]).median, 3.0);
        assert_eq!(sample_stats(&[7.0]).median, 7.0);
    }

    #[test]
    fn test_population_std() {
        let stats = sample_stats(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_eq!(stats.mean, 5.0);
        assert_eq!(stats.std, 2.0);
    }

    #[test]
    fn test_empty_sample() {
        assert_eq!(sample_stats(&[]), SampleStats::default());
    }
}

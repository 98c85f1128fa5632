//! Transparency log of study data collection.
//!
//! Participants can see exactly how much was captured: counts of recorded
//! and ignored keys, sessions started and extracted, and rows exported.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Collection counters for the current run.
#[derive(Debug)]
pub struct TransparencyLog {
    /// Key transitions appended to a session log
    key_events: AtomicU64,
    /// Key notifications dropped because the key is not tracked
    ignored_keys: AtomicU64,
    /// Session starts, including refocus restarts
    sessions_started: AtomicU64,
    /// Sessions whose features were extracted
    sessions_extracted: AtomicU64,
    /// Feature rows written to an export
    rows_exported: AtomicU64,
    run_start: DateTime<Utc>,
    persist_path: Option<PathBuf>,
}

impl TransparencyLog {
    pub fn new() -> Self {
        Self {
            key_events: AtomicU64::new(0),
            ignored_keys: AtomicU64::new(0),
            sessions_started: AtomicU64::new(0),
            sessions_extracted: AtomicU64::new(0),
            rows_exported: AtomicU64::new(0),
            run_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create a transparency log that accumulates into a file.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);

        if let Err(e) = log.load() {
            warn!("Could not load previous transparency stats: {e}");
        }

        log
    }

    pub fn record_key_event(&self) {
        self.key_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ignored_key(&self) {
        self.ignored_keys.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_started(&self) {
        self.sessions_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_extracted(&self) {
        self.sessions_extracted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rows_exported(&self, count: u64) {
        self.rows_exported.fetch_add(count, Ordering::Relaxed);
    }

    /// Get the current statistics.
    pub fn stats(&self) -> TransparencyStats {
        TransparencyStats {
            key_events: self.key_events.load(Ordering::Relaxed),
            ignored_keys: self.ignored_keys.load(Ordering::Relaxed),
            sessions_started: self.sessions_started.load(Ordering::Relaxed),
            sessions_extracted: self.sessions_extracted.load(Ordering::Relaxed),
            rows_exported: self.rows_exported.load(Ordering::Relaxed),
            run_start: self.run_start,
            run_duration_secs: (Utc::now() - self.run_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Collection Statistics:\n\
             - Key events recorded: {}\n\
             - Untracked keys ignored: {}\n\
             - Sessions started: {}\n\
             - Sessions extracted: {}\n\
             - Feature rows exported: {}\n\
             - Run duration: {} seconds\n\
             \n\
             What is recorded:\n\
             - Printable characters, space and Backspace with their timing\n\
             - No modifier, navigation or function keys",
            stats.key_events,
            stats.ignored_keys,
            stats.sessions_started,
            stats.sessions_extracted,
            stats.rows_exported,
            stats.run_duration_secs
        )
    }

    /// Save stats to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedStats {
                key_events: stats.key_events,
                ignored_keys: stats.ignored_keys,
                sessions_started: stats.sessions_started,
                sessions_extracted: stats.sessions_extracted,
                rows_exported: stats.rows_exported,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let persisted = read_persisted(path)?;
                self.key_events
                    .store(persisted.key_events, Ordering::Relaxed);
                self.ignored_keys
                    .store(persisted.ignored_keys, Ordering::Relaxed);
                self.sessions_started
                    .store(persisted.sessions_started, Ordering::Relaxed);
                self.sessions_extracted
                    .store(persisted.sessions_extracted, Ordering::Relaxed);
                self.rows_exported
                    .store(persisted.rows_exported, Ordering::Relaxed);
            }
        }
        Ok(())
    }
}

impl Default for TransparencyLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of transparency statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransparencyStats {
    pub key_events: u64,
    pub ignored_keys: u64,
    pub sessions_started: u64,
    pub sessions_extracted: u64,
    pub rows_exported: u64,
    pub run_start: DateTime<Utc>,
    pub run_duration_secs: u64,
}

/// Stats format for persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedStats {
    pub key_events: u64,
    pub ignored_keys: u64,
    pub sessions_started: u64,
    pub sessions_extracted: u64,
    pub rows_exported: u64,
    pub last_updated: DateTime<Utc>,
}

/// Read cumulative stats written by a previous run.
pub fn read_persisted(path: &std::path::Path) -> Result<PersistedStats, std::io::Error> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(std::io::Error::other)
}

/// Thread-safe shared transparency log.
pub type SharedTransparencyLog = Arc<TransparencyLog>;

/// Create a new shared transparency log.
pub fn create_shared_log() -> SharedTransparencyLog {
    Arc::new(TransparencyLog::new())
}

/// Create a new shared transparency log with persistence.
pub fn create_shared_log_with_persistence(path: PathBuf) -> SharedTransparencyLog {
    Arc::new(TransparencyLog::with_persistence(path))
}

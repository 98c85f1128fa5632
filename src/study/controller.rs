//! Task flow controller for a two-condition study.
//!
//! The controller owns one session context per condition and decides which
//! one receives key input. Phases run strictly in order:
//!
//! ```text
//! Intro ──advance──▶ Relaxed ──advance──▶ Stressed ──advance/expiry──▶ Complete
//! ```
//!
//! Leaving a session ends its recorder and extracts its features exactly
//! once. The stressed session is additionally bounded by a countdown.

use crate::collector::types::{RawKeyInput, StudyInput};
use crate::core::export::ExportRow;
use crate::core::features::{extract_features, Extraction};
use crate::core::recorder::{EventRecorder, RecorderError};
use crate::core::session::{Condition, SessionLog};
use crate::study::countdown::Countdown;
use crate::transparency::SharedTransparencyLog;
use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

/// Where the study currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Intro,
    Relaxed,
    Stressed,
    Complete,
}

impl Phase {
    /// The condition being recorded in this phase, if any.
    pub fn active_condition(&self) -> Option<Condition> {
        match self {
            Phase::Relaxed => Some(Condition::Relaxed),
            Phase::Stressed => Some(Condition::Stressed),
            Phase::Intro | Phase::Complete => None,
        }
    }
}

/// Controller errors.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerError {
    /// The operation makes no sense in the current phase
    InvalidPhase(Phase),
    Recorder(RecorderError),
}

impl std::fmt::Display for ControllerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControllerError::InvalidPhase(phase) => {
                write!(f, "Operation not allowed in phase {phase:?}")
            }
            ControllerError::Recorder(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ControllerError {}

impl From<RecorderError> for ControllerError {
    fn from(e: RecorderError) -> Self {
        ControllerError::Recorder(e)
    }
}

/// Everything owned by one condition's session.
#[derive(Debug)]
struct SessionContext {
    recorder: EventRecorder,
    log: Option<SessionLog>,
    extraction: Option<Extraction>,
}

impl SessionContext {
    fn new(condition: Condition) -> Self {
        Self {
            recorder: EventRecorder::new(condition),
            log: None,
            extraction: None,
        }
    }

    /// End recording and extract features. Only the first call extracts.
    fn finish(&mut self) -> Result<&Extraction, ControllerError> {
        if self.extraction.is_none() {
            let log = self.recorder.end_session()?;
            let extraction = extract_features(&log);
            self.log = Some(log);
            self.extraction = Some(extraction);
        }
        self.extraction
            .as_ref()
            .ok_or(ControllerError::InvalidPhase(Phase::Complete))
    }
}

/// Drives the relaxed and stressed sessions of one study run.
pub struct StudyController {
    phase: Phase,
    relaxed: SessionContext,
    stressed: SessionContext,
    time_limit: Duration,
    countdown: Option<Countdown>,
    signals: Sender<StudyInput>,
    runtime: Handle,
    transparency: Option<SharedTransparencyLog>,
}

impl StudyController {
    /// Create a controller.
    ///
    /// `signals` is where the stressed countdown reports expiry; it should
    /// feed the same loop that calls `handle`.
    pub fn new(time_limit: Duration, signals: Sender<StudyInput>, runtime: Handle) -> Self {
        Self {
            phase: Phase::Intro,
            relaxed: SessionContext::new(Condition::Relaxed),
            stressed: SessionContext::new(Condition::Stressed),
            time_limit,
            countdown: None,
            signals,
            runtime,
            transparency: None,
        }
    }

    /// Count captured events and extractions in a transparency log.
    pub fn with_transparency(mut self, log: SharedTransparencyLog) -> Self {
        self.transparency = Some(log);
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_complete(&self) -> bool {
        self.phase == Phase::Complete
    }

    /// Time left on the stressed countdown, if it is running.
    pub fn remaining(&self) -> Option<Duration> {
        self.countdown.as_ref().map(Countdown::remaining)
    }

    /// Dispatch one input.
    pub fn handle(&mut self, input: StudyInput) -> Result<(), ControllerError> {
        match input {
            StudyInput::Advance => self.advance().map(|_| ()),
            StudyInput::Focus => self.focus(),
            StudyInput::Key(key) => self.key(&key).map(|_| ()),
            StudyInput::Expired { condition } => {
                self.expire(condition);
                Ok(())
            }
        }
    }

    /// Move to the next phase, ending and extracting the current session.
    pub fn advance(&mut self) -> Result<Phase, ControllerError> {
        match self.phase {
            Phase::Intro => {
                self.begin(Condition::Relaxed);
                self.phase = Phase::Relaxed;
            }
            Phase::Relaxed => {
                self.finish(Condition::Relaxed)?;
                self.begin(Condition::Stressed);
                self.countdown = Some(Countdown::start(
                    &self.runtime,
                    Condition::Stressed,
                    self.time_limit,
                    self.signals.clone(),
                ));
                self.phase = Phase::Stressed;
            }
            Phase::Stressed => {
                if let Some(countdown) = self.countdown.take() {
                    countdown.cancel();
                }
                self.finish(Condition::Stressed)?;
                self.phase = Phase::Complete;
            }
            Phase::Complete => return Err(ControllerError::InvalidPhase(self.phase)),
        }
        info!(phase = ?self.phase, "Study advanced");
        Ok(self.phase)
    }

    /// The active input surface regained focus: restart its session.
    pub fn focus(&mut self) -> Result<(), ControllerError> {
        let condition = self
            .phase
            .active_condition()
            .ok_or(ControllerError::InvalidPhase(self.phase))?;
        self.begin(condition);
        Ok(())
    }

    /// Route a key notification to the active session.
    ///
    /// Returns whether an event was captured. Keys outside an active session
    /// are dropped.
    pub fn key(&mut self, input: &RawKeyInput) -> Result<bool, ControllerError> {
        let Some(condition) = self.phase.active_condition() else {
            debug!(phase = ?self.phase, "Key outside an active session dropped");
            return Ok(false);
        };

        let captured = self.context_mut(condition).recorder.record(input)?;
        if let Some(ref log) = self.transparency {
            if captured {
                log.record_key_event();
            } else {
                log.record_ignored_key();
            }
        }
        Ok(captured)
    }

    /// Handle countdown expiry for `condition`.
    ///
    /// Only ends the session if it is still the one recording; a timer that
    /// fires after a manual finish is ignored.
    pub fn expire(&mut self, condition: Condition) {
        if self.phase.active_condition() != Some(condition) || condition != Condition::Stressed {
            warn!(%condition, phase = ?self.phase, "Ignoring late countdown expiry");
            return;
        }
        self.countdown = None;
        match self.finish(condition) {
            Ok(()) => {
                self.phase = Phase::Complete;
                info!(%condition, "Session ended by countdown");
            }
            Err(e) => warn!(%condition, "Could not end session on expiry: {e}"),
        }
    }

    /// The extraction for a condition, once it has ended.
    pub fn extraction(&self, condition: Condition) -> Option<&Extraction> {
        self.context(condition).extraction.as_ref()
    }

    /// The frozen log for a condition, once it has ended.
    pub fn log(&self, condition: Condition) -> Option<&SessionLog> {
        self.context(condition).log.as_ref()
    }

    /// Export rows for every condition that reached extraction.
    pub fn export_rows(&self) -> Vec<ExportRow<'_>> {
        Condition::ALL
            .into_iter()
            .filter_map(|condition| {
                self.extraction(condition)
                    .map(|extraction| ExportRow::new(condition, extraction))
            })
            .collect()
    }

    /// Frozen logs for every condition that ended.
    pub fn logs(&self) -> Vec<&SessionLog> {
        Condition::ALL
            .into_iter()
            .filter_map(|condition| self.log(condition))
            .collect()
    }

    /// Stop any running countdown without ending a session.
    pub fn shutdown(&mut self) {
        if let Some(countdown) = self.countdown.take() {
            countdown.cancel();
        }
    }

    fn begin(&mut self, condition: Condition) {
        self.context_mut(condition).recorder.begin_session();
        if let Some(ref log) = self.transparency {
            log.record_session_started();
        }
        info!(%condition, "Session recording");
    }

    fn finish(&mut self, condition: Condition) -> Result<(), ControllerError> {
        let extraction = self.context_mut(condition).finish()?;
        match extraction {
            Extraction::Complete(record) => info!(
                %condition,
                keys = record.total_keys_pressed,
                backspaces = record.total_backspaces,
                "Features extracted"
            ),
            Extraction::InsufficientData { event_count } => {
                warn!(%condition, event_count, "Not enough data for features")
            }
        }
        if let Some(ref log) = self.transparency {
            log.record_session_extracted();
        }
        Ok(())
    }

    fn context(&self, condition: Condition) -> &SessionContext {
        match condition {
            Condition::Relaxed => &self.relaxed,
            Condition::Stressed => &self.stressed,
        }
    }

    fn context_mut(&mut self, condition: Condition) -> &mut SessionContext {
        match condition {
            Condition::Relaxed => &mut self.relaxed,
            Condition::Stressed => &mut self.stressed,
        }
    }
}

impl Drop for StudyController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

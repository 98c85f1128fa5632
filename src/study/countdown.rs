//! Cancellable session countdown.
//!
//! The countdown runs as a tokio task. On expiry it sends
//! `StudyInput::Expired` into the same channel the input surface feeds, so
//! a forced end goes through the same transition as a manual one.

use crate::collector::types::StudyInput;
use crate::core::session::Condition;
use crossbeam_channel::Sender;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// A running countdown for one session.
pub struct Countdown {
    condition: Condition,
    limit: Duration,
    started_at: Instant,
    task: JoinHandle<()>,
}

impl Countdown {
    /// Start a countdown on the given runtime.
    pub fn start(
        runtime: &Handle,
        condition: Condition,
        limit: Duration,
        signals: Sender<StudyInput>,
    ) -> Self {
        let task = runtime.spawn(async move {
            tokio::time::sleep(limit).await;
            info!(%condition, "Time is up");
            // The receiver may already be gone at shutdown.
            let _ = signals.send(StudyInput::Expired { condition });
        });
        debug!(%condition, limit_secs = limit.as_secs(), "Countdown started");

        Self {
            condition,
            limit,
            started_at: Instant::now(),
            task,
        }
    }

    pub fn condition(&self) -> Condition {
        self.condition
    }

    /// Time left before expiry, saturating at zero.
    pub fn remaining(&self) -> Duration {
        self.limit.saturating_sub(self.started_at.elapsed())
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the countdown so it can never fire.
    pub fn cancel(self) {
        self.task.abort();
        debug!(condition = %self.condition, "Countdown cancelled");
    }
}

/// Format a remaining duration as `MM:SS`.
pub fn format_remaining(remaining: Duration) -> String {
    let secs = remaining.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    #[tokio::test]
    async fn test_countdown_fires() {
        let (tx, rx) = unbounded();
        let countdown = Countdown::start(
            &Handle::current(),
            Condition::Stressed,
            Duration::from_millis(10),
            tx,
        );

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(
            rx.try_recv().ok(),
            Some(StudyInput::Expired {
                condition: Condition::Stressed
            })
        );
        assert!(countdown.is_finished());
        assert_eq!(countdown.remaining(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_cancelled_countdown_never_fires() {
        let (tx, rx) = unbounded();
        let countdown = Countdown::start(
            &Handle::current(),
            Condition::Stressed,
            Duration::from_millis(20),
            tx,
        );
        countdown.cancel();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_format_remaining() {
        assert_eq!(format_remaining(Duration::from_secs(120)), "02:00");
        assert_eq!(format_remaining(Duration::from_secs(29)), "00:29");
        assert_eq!(format_remaining(Duration::from_millis(61_900)), "01:01");
    }
}

//! Study task flow: the two timed typing sessions.
//!
//! This module provides the controller that switches which session is
//! recording, the stressed-session countdown, and the task prompts.

pub mod controller;
pub mod countdown;

// Re-export commonly used types
pub use controller::{ControllerError, Phase, StudyController};
pub use countdown::{format_remaining, Countdown};

use crate::core::session::Condition;

/// Default time limit of the stressed session, in seconds.
pub const DEFAULT_TIME_LIMIT_SECS: u64 = 120;

/// Text participants copy during the relaxed session.
pub const RELAXED_PROMPT: &str = "The graceful swans glided across the serene surface of the lake, \
their movements creating gentle ripples. The surrounding forest was a tapestry of lush green, \
with sunlight filtering through the leaves. It was a scene of perfect tranquility and natural beauty.";

/// Text participants copy during the stressed session.
pub const STRESSED_PROMPT: &str = "The ambitious quarterback scrambled frantically across the field, \
dodging relentless defenders under the glaring stadium lights. A critical fourth down with mere \
seconds remaining, the roaring crowd's anticipation reached a fever pitch, creating an atmosphere \
of intense, electrifying pressure.";

/// The prompt shown for a condition.
pub fn prompt(condition: Condition) -> &'static str {
    match condition {
        Condition::Relaxed => RELAXED_PROMPT,
        Condition::Stressed => STRESSED_PROMPT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompts_are_distinct_sentences() {
        assert!(prompt(Condition::Relaxed).starts_with("The graceful swans"));
        assert!(prompt(Condition::Stressed).ends_with("electrifying pressure."));
        assert!(!RELAXED_PROMPT.contains("  "));
        assert!(!STRESSED_PROMPT.contains("  "));
    }
}

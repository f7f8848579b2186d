//! Pipeline state machine.

use crate::error::{GateError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The stages a validation run moves through.
///
/// Transitions are strictly forward:
///
/// ```text
/// Init → CompletenessChecked → Deduplicated → StatsCollected → BoundsChecked → Completed
///                                                                           └→ Aborted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Init,
    CompletenessChecked,
    Deduplicated,
    StatsCollected,
    BoundsChecked,
    Completed,
    Aborted,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Init => "init",
            PipelineState::CompletenessChecked => "completeness_checked",
            PipelineState::Deduplicated => "deduplicated",
            PipelineState::StatsCollected => "stats_collected",
            PipelineState::BoundsChecked => "bounds_checked",
            PipelineState::Completed => "completed",
            PipelineState::Aborted => "aborted",
        }
    }

    /// Returns true for `Completed` and `Aborted`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Completed | PipelineState::Aborted)
    }

    /// Returns true if `next` directly follows `self`.
    pub fn can_transition_to(&self, next: PipelineState) -> bool {
        use PipelineState as S;
        matches!(
            (self, next),
            (S::Init, S::CompletenessChecked)
                | (S::CompletenessChecked, S::Deduplicated)
                | (S::Deduplicated, S::StatsCollected)
                | (S::StatsCollected, S::BoundsChecked)
                | (S::BoundsChecked, S::Completed)
                | (S::BoundsChecked, S::Aborted)
        )
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tracks the current state of one run and rejects illegal transitions.
#[derive(Debug)]
pub(crate) struct StateMachine {
    state: PipelineState,
}

impl StateMachine {
    pub(crate) fn new() -> Self {
        Self {
            state: PipelineState::Init,
        }
    }

    pub(crate) fn state(&self) -> PipelineState {
        self.state
    }

    pub(crate) fn advance(&mut self, next: PipelineState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(GateError::Internal(format!(
                "illegal pipeline transition {} -> {next}",
                self.state
            )));
        }
        tracing::debug!(from = %self.state, to = %next, "Pipeline state transition");
        self.state = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_path() {
        let mut machine = StateMachine::new();
        for next in [
            PipelineState::CompletenessChecked,
            PipelineState::Deduplicated,
            PipelineState::StatsCollected,
            PipelineState::BoundsChecked,
            PipelineState::Completed,
        ] {
            machine.advance(next).unwrap();
        }
        assert!(machine.state().is_terminal());
    }

    #[test]
    fn test_no_reentry_or_skips() {
        let mut machine = StateMachine::new();
        assert!(machine.advance(PipelineState::Deduplicated).is_err());
        machine.advance(PipelineState::CompletenessChecked).unwrap();
        assert!(machine.advance(PipelineState::CompletenessChecked).is_err());
        assert!(machine.advance(PipelineState::Init).is_err());
    }

    #[test]
    fn test_abort_only_after_bounds() {
        assert!(!PipelineState::StatsCollected.can_transition_to(PipelineState::Aborted));
        assert!(!PipelineState::Init.can_transition_to(PipelineState::Aborted));
        assert!(PipelineState::BoundsChecked.can_transition_to(PipelineState::Aborted));
        assert!(!PipelineState::Aborted.can_transition_to(PipelineState::Completed));
    }
}

//! Timed collective write
//!
//! ```text
//! Idle -> BarrierWait -> Timing -> Writing -> Reduced -> Done
//!   \________\______________\________\__________\-----> Failed
//! ```

use crate::error::BenchError;
use forestmark_comm::{Communicator, ReduceOp};
use forestmark_forest::Forest;
use forestmark_writer::{write_forest, ElementWiseVariable, WriteOptions, WriteSummary};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;
use tracing::debug;

/// Phase of one timed write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimingState {
    /// Not started
    Idle,
    /// Inside the start barrier
    BarrierWait,
    /// Clock running, write not yet entered
    Timing,
    /// Inside the collective write
    Writing,
    /// Elapsed time reduced across ranks
    Reduced,
    /// Result available
    Done,
    /// Aborted
    Failed,
}

impl TimingState {
    /// States reachable from `self`
    #[must_use]
    pub fn allowed_transitions(self) -> &'static [TimingState] {
        use TimingState::{BarrierWait, Done, Failed, Idle, Reduced, Timing, Writing};
        match self {
            Idle => &[BarrierWait, Failed],
            BarrierWait => &[Timing, Failed],
            Timing => &[Writing, Failed],
            Writing => &[Reduced, Failed],
            Reduced => &[Done, Failed],
            Done | Failed => &[],
        }
    }

    /// Check if no further transition is possible
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        self.allowed_transitions().is_empty()
    }
}

/// Validates a timing state transition
pub fn validate_transition(from: TimingState, to: TimingState) -> Result<(), BenchError> {
    if from.allowed_transitions().contains(&to) {
        Ok(())
    } else {
        Err(BenchError::IllegalTransition { from, to })
    }
}

/// Seconds taken by the slowest rank
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimingResult {
    /// Maximum elapsed wall-clock seconds over all ranks
    pub seconds: f64,
}

/// Drives one timed write through its states
#[derive(Debug)]
pub struct TimingHarness {
    state: TimingState,
}

impl Default for TimingHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl TimingHarness {
    /// Harness in [`TimingState::Idle`]
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: TimingState::Idle,
        }
    }

    /// Current state
    #[inline]
    #[must_use]
    pub fn state(&self) -> TimingState {
        self.state
    }

    /// Move to `to`, rejecting illegal transitions
    pub fn transition(&mut self, to: TimingState) -> Result<(), BenchError> {
        validate_transition(self.state, to)?;
        debug!(from = ?self.state, ?to, "timing transition");
        self.state = to;
        Ok(())
    }

    /// Barrier, timed write to `stem`, max-reduction of the elapsed time
    /// (collective)
    ///
    /// Any failure leaves the harness in [`TimingState::Failed`].
    pub fn time_write(
        &mut self,
        stem: &Path,
        forest: &Forest,
        variables: &[ElementWiseVariable],
        options: &WriteOptions,
        comm: &dyn Communicator,
    ) -> Result<(TimingResult, WriteSummary), BenchError> {
        let outcome = self.run(stem, forest, variables, options, comm);
        if outcome.is_err() && !self.state.is_terminal() {
            self.state = TimingState::Failed;
        }
        outcome
    }

    fn run(
        &mut self,
        stem: &Path,
        forest: &Forest,
        variables: &[ElementWiseVariable],
        options: &WriteOptions,
        comm: &dyn Communicator,
    ) -> Result<(TimingResult, WriteSummary), BenchError> {
        self.transition(TimingState::BarrierWait)?;
        comm.barrier()?;

        self.transition(TimingState::Timing)?;
        let start = Instant::now();

        self.transition(TimingState::Writing)?;
        let summary = write_forest(stem, forest, variables, options, comm)?;
        let elapsed = start.elapsed().as_secs_f64();

        self.transition(TimingState::Reduced)?;
        let seconds = comm
            .all_reduce_f64(elapsed, ReduceOp::Max)
            .map_err(BenchError::TimingReduction)?;
        debug!(local = elapsed, seconds, "elapsed time reduced");

        self.transition(TimingState::Done)?;
        Ok((TimingResult { seconds }, summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_is_legal() {
        let mut harness = TimingHarness::new();
        for to in [
            TimingState::BarrierWait,
            TimingState::Timing,
            TimingState::Writing,
            TimingState::Reduced,
            TimingState::Done,
        ] {
            harness.transition(to).unwrap();
        }
        assert!(harness.state().is_terminal());
    }

    #[test]
    fn skipping_the_barrier_is_rejected() {
        let mut harness = TimingHarness::new();
        let err = harness.transition(TimingState::Timing).unwrap_err();
        assert!(matches!(
            err,
            BenchError::IllegalTransition {
                from: TimingState::Idle,
                to: TimingState::Timing
            }
        ));
        assert_eq!(harness.state(), TimingState::Idle);
    }

    #[test]
    fn every_live_state_can_fail() {
        for state in [
            TimingState::Idle,
            TimingState::BarrierWait,
            TimingState::Timing,
            TimingState::Writing,
            TimingState::Reduced,
        ] {
            assert!(validate_transition(state, TimingState::Failed).is_ok());
        }
        assert!(validate_transition(TimingState::Done, TimingState::Failed).is_err());
        assert!(validate_transition(TimingState::Failed, TimingState::Idle).is_err());
    }
}

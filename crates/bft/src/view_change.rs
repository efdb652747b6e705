//! View change component for liveness.
//!
//! Counts consecutive quorum failures and, once the limit is reached, moves
//! the cluster to the next view. Resumption of PROPOSE after a view change is
//! deferred through a timer.
//!
//! # Generations
//!
//! Every scheduled resumption is tagged with a generation. Starting a round or
//! reconfiguring bumps the generation and cancels the pending timer, so a
//! resumption that still fires afterwards (a runner that lost the cancel, or a
//! race in wall-clock time) no longer matches and is ignored.

use quorumsim_core::TimerId;
use std::time::Duration;
use tracing::{debug, info};

/// What a quorum failure leads to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Try again in the same view with the same leader.
    Retry { failure_count: u32 },
    /// The failure limit was reached; the view advanced.
    ViewChange {
        new_view: u64,
        /// Failures that triggered the change.
        failure_count: u32,
        /// Timer to schedule for the resumption.
        timer: TimerId,
        delay: Duration,
    },
}

/// View change state for the round coordinator.
#[derive(Debug, Clone)]
pub struct ViewChangeState {
    /// Current view number. Only a view change increments it.
    view: u64,

    /// Consecutive quorum failures since the last success or view change.
    failure_count: u32,

    /// Failures that trigger a view change.
    max_failures: u32,

    /// Delay before PROPOSE resumes.
    delay: Duration,

    /// Generation of the most recently scheduled resumption.
    generation: u64,

    /// Generation of the resumption still waiting to fire, if any.
    pending: Option<u64>,
}

impl ViewChangeState {
    pub fn new(max_failures: u32, delay: Duration) -> Self {
        Self {
            view: 0,
            failure_count: 0,
            max_failures,
            delay,
            generation: 0,
            pending: None,
        }
    }

    /// Apply new limits after reconfiguration. View and counters are kept.
    pub fn set_limits(&mut self, max_failures: u32, delay: Duration) {
        self.max_failures = max_failures;
        self.delay = delay;
    }

    pub fn view(&self) -> u64 {
        self.view
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether a resumption is waiting to fire.
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Record a failed quorum attempt.
    pub fn record_failure(&mut self) -> FailureOutcome {
        self.failure_count += 1;

        if self.failure_count < self.max_failures {
            debug!(
                view = self.view,
                failure_count = self.failure_count,
                max_failures = self.max_failures,
                "Quorum failed, retrying in same view"
            );
            return FailureOutcome::Retry {
                failure_count: self.failure_count,
            };
        }

        let failure_count = self.failure_count;
        self.view += 1;
        self.failure_count = 0;
        self.generation += 1;
        self.pending = Some(self.generation);

        info!(
            new_view = self.view,
            failure_count,
            generation = self.generation,
            delay = ?self.delay,
            "Failure limit reached, triggering view change"
        );

        FailureOutcome::ViewChange {
            new_view: self.view,
            failure_count,
            timer: TimerId::ViewChangeResume {
                generation: self.generation,
            },
            delay: self.delay,
        }
    }

    /// Reset the failure counter after progress (block committed).
    pub fn record_success(&mut self) {
        if self.failure_count > 0 {
            debug!(
                view = self.view,
                failure_count = self.failure_count,
                "Progress made, reset failure count"
            );
        }
        self.failure_count = 0;
    }

    /// Clear the failure counter without progress (reconfiguration).
    pub fn reset_failures(&mut self) {
        self.failure_count = 0;
    }

    /// Supersede any pending resumption.
    ///
    /// Returns the timer the runner should cancel, if one was pending.
    pub fn cancel_pending(&mut self) -> Option<TimerId> {
        self.generation += 1;
        self.pending.take().map(|generation| {
            debug!(generation, "Cancelled pending view change resumption");
            TimerId::ViewChangeResume { generation }
        })
    }

    /// Handle a fired resumption timer.
    ///
    /// Returns true only for the currently pending generation.
    pub fn on_resume_timer(&mut self, generation: u64) -> bool {
        if self.pending == Some(generation) {
            self.pending = None;
            true
        } else {
            debug!(
                generation,
                pending = ?self.pending,
                "Ignoring stale view change resumption"
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> ViewChangeState {
        ViewChangeState::new(3, Duration::from_secs(2))
    }

    #[test]
    fn test_retries_before_limit() {
        let mut vc = state();
        assert_eq!(
            vc.record_failure(),
            FailureOutcome::Retry { failure_count: 1 }
        );
        assert_eq!(
            vc.record_failure(),
            FailureOutcome::Retry { failure_count: 2 }
        );
        assert_eq!(vc.view(), 0);
        assert!(!vc.has_pending());
    }

    #[test]
    fn test_third_failure_changes_view() {
        let mut vc = state();
        vc.record_failure();
        vc.record_failure();
        match vc.record_failure() {
            FailureOutcome::ViewChange {
                new_view,
                failure_count,
                timer,
                delay,
            } => {
                assert_eq!(new_view, 1);
                assert_eq!(failure_count, 3);
                assert_eq!(delay, Duration::from_secs(2));
                assert_eq!(
                    timer,
                    TimerId::ViewChangeResume {
                        generation: vc.generation()
                    }
                );
            }
            other => panic!("expected view change, got {other:?}"),
        }
        assert_eq!(vc.view(), 1);
        assert_eq!(vc.failure_count(), 0);
        assert!(vc.has_pending());
    }

    #[test]
    fn test_success_resets_failures() {
        let mut vc = state();
        vc.record_failure();
        vc.record_failure();
        vc.record_success();
        assert_eq!(vc.failure_count(), 0);
        assert_eq!(
            vc.record_failure(),
            FailureOutcome::Retry { failure_count: 1 }
        );
    }

    #[test]
    fn test_stale_resumption_ignored() {
        let mut vc = state();
        for _ in 0..3 {
            vc.record_failure();
        }
        let stale = vc.generation();

        let cancelled = vc.cancel_pending();
        assert_eq!(
            cancelled,
            Some(TimerId::ViewChangeResume { generation: stale })
        );
        assert!(!vc.on_resume_timer(stale));
        assert!(vc.cancel_pending().is_none());
    }

    #[test]
    fn test_matching_resumption_fires_once() {
        let mut vc = state();
        for _ in 0..3 {
            vc.record_failure();
        }
        let generation = vc.generation();
        assert!(vc.on_resume_timer(generation));
        assert!(!vc.on_resume_timer(generation));
    }
}

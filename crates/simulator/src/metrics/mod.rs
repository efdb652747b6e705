//! Metrics collection and reporting for simulations.
//!
//! Tracks decision outcomes per round, attempts-per-round histograms, and
//! view-change counts, and renders them as a report.

use hdrhistogram::Histogram;
use serde::Serialize;
use std::time::Duration;

/// Collects metrics during a simulation run.
pub struct MetricsCollector {
    /// Rounds driven.
    rounds: u64,

    /// Rounds that ended with a committed block.
    decided: u64,

    /// Decided rounds whose value differs from the submitted one.
    subverted: u64,

    /// Values submitted across all rounds.
    attempts: u64,

    /// View changes across all rounds.
    view_changes: u64,

    /// Attempts needed by each decided round.
    attempts_histogram: Histogram<u64>,

    /// Rounds where Byzantine nodes exceeded the tolerated count.
    intolerant_rounds: u64,

    /// Start time (simulated).
    start_time: Duration,
}

impl MetricsCollector {
    /// Create a new metrics collector.
    pub fn new(start_time: Duration) -> Self {
        Self {
            rounds: 0,
            decided: 0,
            subverted: 0,
            attempts: 0,
            view_changes: 0,
            attempts_histogram: Histogram::new_with_bounds(1, u32::MAX as u64, 2)
                .expect("histogram creation should succeed"),
            intolerant_rounds: 0,
            start_time,
        }
    }

    /// Record the outcome of one round.
    pub fn record_round(&mut self, round: &RoundRecord) {
        self.rounds += 1;
        self.attempts += round.attempts as u64;
        self.view_changes += round.view_changes;
        if !round.fault_tolerant {
            self.intolerant_rounds += 1;
        }
        if let Some(subverted) = round.subverted {
            self.decided += 1;
            if subverted {
                self.subverted += 1;
            }
            let _ = self.attempts_histogram.record(round.attempts.max(1) as u64);
        }
    }

    /// Current raw stats: (rounds, decided, subverted).
    pub fn current_stats(&self) -> (u64, u64, u64) {
        (self.rounds, self.decided, self.subverted)
    }

    /// Finalize and generate a report.
    pub fn finalize(self, end_time: Duration, totals: RunTotals) -> SimulationReport {
        let histogram = &self.attempts_histogram;
        let (attempts_p50, attempts_p90, attempts_max) = if histogram.len() == 0 {
            (0, 0, 0)
        } else {
            (
                histogram.value_at_quantile(0.50),
                histogram.value_at_quantile(0.90),
                histogram.max(),
            )
        };

        SimulationReport {
            rounds: self.rounds,
            decided: self.decided,
            undecided: self.rounds - self.decided,
            subverted: self.subverted,
            total_attempts: self.attempts,
            view_changes: self.view_changes,
            intolerant_rounds: self.intolerant_rounds,
            attempts_p50,
            attempts_p90,
            attempts_max,
            quorum_failures: totals.quorum_failures,
            messages: totals.messages,
            final_view: totals.final_view,
            simulated_time: end_time.saturating_sub(self.start_time),
        }
    }
}

/// Outcome of one round, as recorded by the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundRecord {
    /// Values submitted.
    pub attempts: u32,
    /// View changes triggered.
    pub view_changes: u64,
    /// `Some(is_subverted)` if a block was committed.
    pub subverted: Option<bool>,
    /// Whether the Byzantine count was within tolerance for this round.
    pub fault_tolerant: bool,
}

/// Whole-run counters read from the coordinator at the end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunTotals {
    pub quorum_failures: u64,
    pub messages: u64,
    pub final_view: u64,
}

/// Final simulation report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationReport {
    /// Rounds driven.
    pub rounds: u64,
    /// Rounds that committed a block.
    pub decided: u64,
    /// Rounds that gave up without a block.
    pub undecided: u64,
    /// Committed blocks whose value differs from the submitted one.
    pub subverted: u64,
    /// Values submitted across all rounds.
    pub total_attempts: u64,
    /// View changes triggered.
    pub view_changes: u64,
    /// Rounds started with more Byzantine nodes than tolerated.
    pub intolerant_rounds: u64,
    /// Median attempts per decided round.
    pub attempts_p50: u64,
    /// 90th percentile attempts per decided round.
    pub attempts_p90: u64,
    /// Most attempts any decided round needed.
    pub attempts_max: u64,
    /// Attempts that ended without quorum.
    pub quorum_failures: u64,
    /// Messages in the log at the end of the run.
    pub messages: u64,
    /// View at the end of the run.
    pub final_view: u64,
    /// Simulated time spent, which is the sum of elapsed view-change delays.
    #[serde(with = "duration_millis")]
    pub simulated_time: Duration,
}

impl SimulationReport {
    /// Decided rounds over all rounds.
    pub fn decision_rate(&self) -> f64 {
        if self.rounds > 0 {
            self.decided as f64 / self.rounds as f64
        } else {
            0.0
        }
    }

    /// Subverted decisions over decided rounds.
    pub fn subversion_rate(&self) -> f64 {
        if self.decided > 0 {
            self.subverted as f64 / self.decided as f64
        } else {
            0.0
        }
    }

    /// Print a summary of the report.
    pub fn print_summary(&self) {
        println!("\n═══════════════════════════════════════════");
        println!("           SIMULATION REPORT                ");
        println!("═══════════════════════════════════════════");
        println!();
        println!("Rounds:");
        println!("  Driven:     {}", self.rounds);
        println!(
            "  Decided:    {} ({:.2}%)",
            self.decided,
            self.decision_rate() * 100.0
        );
        println!("  Undecided:  {}", self.undecided);
        println!(
            "  Subverted:  {} ({:.2}% of decided)",
            self.subverted,
            self.subversion_rate() * 100.0
        );
        println!("  Beyond f:   {}", self.intolerant_rounds);
        println!();
        println!("Attempts per decided round:");
        println!("  P50:  {}", self.attempts_p50);
        println!("  P90:  {}", self.attempts_p90);
        println!("  Max:  {}", self.attempts_max);
        println!();
        println!("Protocol:");
        println!("  Attempts:        {}", self.total_attempts);
        println!("  Quorum failures: {}", self.quorum_failures);
        println!("  View changes:    {}", self.view_changes);
        println!("  Final view:      {}", self.final_view);
        println!("  Messages:        {}", self.messages);
        println!();
        println!("Simulated time: {:?}", self.simulated_time);
        println!("═══════════════════════════════════════════\n");
    }
}

mod duration_millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decided(attempts: u32, subverted: bool) -> RoundRecord {
        RoundRecord {
            attempts,
            view_changes: 0,
            subverted: Some(subverted),
            fault_tolerant: true,
        }
    }

    #[test]
    fn test_metrics_collection() {
        let mut collector = MetricsCollector::new(Duration::ZERO);

        for i in 0..100 {
            collector.record_round(&decided(1 + i % 3, i % 10 == 0));
        }
        collector.record_round(&RoundRecord {
            attempts: 6,
            view_changes: 2,
            subverted: None,
            fault_tolerant: false,
        });

        let report = collector.finalize(
            Duration::from_secs(4),
            RunTotals {
                quorum_failures: 6,
                messages: 1000,
                final_view: 2,
            },
        );

        assert_eq!(report.rounds, 101);
        assert_eq!(report.decided, 100);
        assert_eq!(report.undecided, 1);
        assert_eq!(report.subverted, 10);
        assert_eq!(report.view_changes, 2);
        assert_eq!(report.intolerant_rounds, 1);
        assert_eq!(report.attempts_max, 3);
        assert_eq!(report.attempts_p50, 2);
        assert!((report.subversion_rate() - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_report() {
        let report =
            MetricsCollector::new(Duration::ZERO).finalize(Duration::ZERO, RunTotals::default());
        assert_eq!(report.rounds, 0);
        assert_eq!(report.attempts_max, 0);
        assert_eq!(report.decision_rate(), 0.0);
    }

    #[test]
    fn test_report_serializes_time_in_millis() {
        let report = MetricsCollector::new(Duration::from_secs(1))
            .finalize(Duration::from_millis(3500), RunTotals::default());
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"simulated_time\":2500"));
    }
}

//! Quorum evaluation over committed values.
//!
//! Like a vote set, but over opaque values rather than signed votes: count
//! each distinct value, pick the majority, and certify it only if it reaches
//! the `2f + 1` threshold for the node set.

use quorumsim_types::{fault_tolerance, quorum_threshold, Value};

/// Frequency count of values, preserving first-seen order.
///
/// Ties for the majority go to the value encountered first, which makes the
/// outcome reproducible for a given iteration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    counts: Vec<(Value, usize)>,
}

impl Tally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one occurrence of `value`.
    pub fn add(&mut self, value: &Value) {
        match self.counts.iter_mut().find(|(v, _)| v == value) {
            Some((_, count)) => *count += 1,
            None => self.counts.push((value.clone(), 1)),
        }
    }

    /// Occurrences of `value`.
    pub fn count(&self, value: &Value) -> usize {
        self.counts
            .iter()
            .find(|(v, _)| v == value)
            .map(|(_, c)| *c)
            .unwrap_or(0)
    }

    /// Total values counted.
    pub fn total(&self) -> usize {
        self.counts.iter().map(|(_, c)| c).sum()
    }

    /// Number of distinct values.
    pub fn distinct(&self) -> usize {
        self.counts.len()
    }

    /// Most frequent value and its count. First-seen wins ties.
    pub fn majority(&self) -> Option<(&Value, usize)> {
        let mut best: Option<(&Value, usize)> = None;
        for (value, count) in &self.counts {
            match best {
                Some((_, best_count)) if *count <= best_count => {}
                _ => best = Some((value, *count)),
            }
        }
        best
    }
}

impl<'a> FromIterator<&'a Value> for Tally {
    fn from_iter<I: IntoIterator<Item = &'a Value>>(iter: I) -> Self {
        let mut tally = Tally::new();
        for value in iter {
            tally.add(value);
        }
        tally
    }
}

/// Result of a quorum check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuorumOutcome {
    /// `value` reached the threshold with `votes` matching reports.
    Reached { value: Value, votes: usize },
    /// No value reached the threshold. `leading` is the best candidate, if any
    /// value was reported at all.
    NoQuorum { leading: Option<(Value, usize)> },
}

impl QuorumOutcome {
    /// The agreed value, if quorum was reached.
    pub fn value(&self) -> Option<&Value> {
        match self {
            QuorumOutcome::Reached { value, .. } => Some(value),
            QuorumOutcome::NoQuorum { .. } => None,
        }
    }

    pub fn is_reached(&self) -> bool {
        matches!(self, QuorumOutcome::Reached { .. })
    }
}

/// Quorum evaluator for a fixed node set size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuorumEvaluator {
    node_count: usize,
}

impl QuorumEvaluator {
    pub fn new(node_count: usize) -> Self {
        Self { node_count }
    }

    /// Byzantine nodes tolerated: `floor((n - 1) / 3)`.
    pub fn fault_tolerance(&self) -> usize {
        fault_tolerance(self.node_count)
    }

    /// Matching values needed: `2f + 1`.
    pub fn threshold(&self) -> usize {
        quorum_threshold(self.node_count)
    }

    /// Evaluate the current values of the node set. Unset values are skipped.
    pub fn evaluate<'a, I>(&self, values: I) -> QuorumOutcome
    where
        I: IntoIterator<Item = Option<&'a Value>>,
    {
        let tally: Tally = values.into_iter().flatten().collect();
        match tally.majority() {
            Some((value, votes)) if votes >= self.threshold() => QuorumOutcome::Reached {
                value: value.clone(),
                votes,
            },
            leading => QuorumOutcome::NoQuorum {
                leading: leading.map(|(v, c)| (v.clone(), c)),
            },
        }
    }
}

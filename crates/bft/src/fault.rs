//! Byzantine fault model.
//!
//! Decides which replicas are Byzantine and how a Byzantine replica turns an
//! honest value into the one it reports.

use crate::config::{ByzantineAssignment, PbftConfig};
use quorumsim_types::Value;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::fmt;
use tracing::debug;

/// A deterministic adversarial transform of an honest value.
pub trait Adversary: fmt::Debug + Send + Sync {
    /// The value a Byzantine replica reports instead of `honest`.
    fn corrupt(&self, honest: &Value) -> Value;
}

/// Inversion over a two-valued domain: `a` becomes `b`, anything else `a`.
///
/// Applying it twice is the identity only for values inside the domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inversion {
    a: Value,
    b: Value,
}

impl Inversion {
    pub fn new(a: impl Into<Value>, b: impl Into<Value>) -> Self {
        Self {
            a: a.into(),
            b: b.into(),
        }
    }
}

impl Default for Inversion {
    fn default() -> Self {
        Self::new("A", "B")
    }
}

impl Adversary for Inversion {
    fn corrupt(&self, honest: &Value) -> Value {
        if *honest == self.a {
            self.b.clone()
        } else {
            self.a.clone()
        }
    }
}

/// Seeded source of Byzantine flags.
pub struct FaultModel {
    rng: ChaCha8Rng,
    seed: u64,
}

impl fmt::Debug for FaultModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FaultModel")
            .field("seed", &self.seed)
            .finish()
    }
}

impl FaultModel {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
        }
    }

    /// Seed this model was created with.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Bernoulli trial: true with the given probability.
    pub fn decide_byzantine(&mut self, probability: f64) -> bool {
        self.rng.gen::<f64>() < probability
    }

    /// Draw Byzantine flags for every node of `config`, in id order.
    pub fn assign(&mut self, config: &PbftConfig) -> Vec<bool> {
        let n = config.node_count;
        let flags = match config.assignment() {
            ByzantineAssignment::AllHonest => vec![false; n],
            ByzantineAssignment::Fixed(nodes) => {
                let mut flags = vec![false; n];
                for id in nodes {
                    if let Some(flag) = flags.get_mut(id.index()) {
                        *flag = true;
                    }
                }
                flags
            }
            ByzantineAssignment::Random { probability } => (0..n)
                .map(|_| self.decide_byzantine(probability))
                .collect(),
        };
        debug!(
            nodes = n,
            byzantine = flags.iter().filter(|b| **b).count(),
            "Assigned Byzantine flags"
        );
        flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quorumsim_types::NodeId;

    #[test]
    fn test_inversion_binary_domain() {
        let inv = Inversion::default();
        assert_eq!(inv.corrupt(&Value::from("A")), Value::from("B"));
        assert_eq!(inv.corrupt(&Value::from("B")), Value::from("A"));
        assert_eq!(
            inv.corrupt(&inv.corrupt(&Value::from("A"))),
            Value::from("A")
        );
    }

    #[test]
    fn test_inversion_outside_domain_is_not_involutive() {
        let inv = Inversion::default();
        let c = Value::from("C");
        assert_eq!(inv.corrupt(&c), Value::from("A"));
        assert_ne!(inv.corrupt(&inv.corrupt(&c)), c);
    }

    #[test]
    fn test_probability_extremes() {
        let mut model = FaultModel::new(1);
        assert!((0..100).all(|_| !model.decide_byzantine(0.0)));
        assert!((0..100).all(|_| model.decide_byzantine(1.0)));
    }

    #[test]
    fn test_same_seed_same_flags() {
        let config = PbftConfig::default().with_byzantine_probability(0.5);
        let a = FaultModel::new(99).assign(&config);
        let b = FaultModel::new(99).assign(&config);
        assert_eq!(a, b);
        assert_eq!(a.len(), config.node_count);
    }

    #[test]
    fn test_fixed_and_all_honest() {
        let config = PbftConfig::default()
            .with_node_count(4)
            .with_fixed_byzantine([NodeId(1), NodeId(3)]);
        let mut model = FaultModel::new(0);
        assert_eq!(model.assign(&config), vec![false, true, false, true]);

        let config = config.with_all_honest(true);
        assert_eq!(model.assign(&config), vec![false; 4]);
    }
}

//! Byzantine fault tolerance arithmetic.
//!
//! With `n = 3f + 1` participants the protocol tolerates `f` Byzantine nodes
//! and requires `2f + 1` matching votes for a quorum certificate.

/// Maximum number of Byzantine nodes tolerated by `n` participants.
///
/// `floor((n - 1) / 3)`, and 0 for an empty or single-node set.
pub fn fault_tolerance(n: usize) -> usize {
    n.saturating_sub(1) / 3
}

/// Matching votes needed for a quorum: `2f + 1`.
pub fn quorum_threshold(n: usize) -> usize {
    2 * fault_tolerance(n) + 1
}

/// Whether `byzantine_count` faulty nodes stay within the tolerance of `n`.
pub fn is_byzantine_fault_tolerant(byzantine_count: usize, n: usize) -> bool {
    byzantine_count <= fault_tolerance(n)
}

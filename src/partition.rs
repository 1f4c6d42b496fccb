//! Combining reduced quantities across partitions of a domain-decomposed run.
//!
//! Each partition evaluates the samples it owns. The reduced residual and Jacobian are then summed
//! across partitions, which is the only point of synchronization.

/// A blocking collective sum over all partitions.
pub trait PartitionReducer<T> {
    /// Replaces `values` by the elementwise sum of `values` over all partitions.
    fn sum_reduce(&self, values: &mut [T]);
}

/// The reducer of a run with a single partition, which leaves values untouched.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct SinglePartition;

impl<T> PartitionReducer<T> for SinglePartition {
    fn sum_reduce(&self, _values: &mut [T]) {}
}

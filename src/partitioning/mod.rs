//! Entry-point for the element-to-work-unit graph partitioners.
//!
//! Partitioning is collective: the host gathers the elements every PE read
//! (and their centroids for geometric algorithms) and calls the partitioner
//! once for the whole mesh. It returns, for every element, a work-unit id in
//! `[0, nparts)`; each PE then receives the ids of the elements it read.

pub mod bisection;
pub mod block;
pub mod error;
pub mod greedy;
pub mod hsfc;
pub mod metis;
pub mod rcb;
pub mod rib;

use crate::mesh::{Centroids, NODES_PER_TET};
use error::PartitionError;

pub use self::block::Block;
pub use self::greedy::Greedy;
pub use self::hsfc::Hsfc;
pub use self::metis::Metis;
pub use self::rcb::Rcb;
pub use self::rib::Rib;

/// The elements to partition, in global element order.
#[derive(Debug, Clone, Copy)]
pub struct PartitionInput<'a> {
    /// Flattened connectivity, four old node ids per element.
    pub connectivity: &'a [u64],
    /// Element centroids; present for geometric algorithms.
    pub centroids: Option<&'a Centroids>,
    /// Global ids of the elements.
    pub gelemid: &'a [u64],
    /// Number of elements in the whole mesh.
    pub nelem_global: u64,
}

impl<'a> PartitionInput<'a> {
    /// Number of elements in the input.
    pub fn nelem(&self) -> usize {
        self.gelemid.len()
    }

    /// Check that connectivity, element ids and centroids describe the same
    /// elements.
    pub fn validate(&self) -> Result<(), PartitionError> {
        let n = self.nelem();
        if self.connectivity.len() != n * NODES_PER_TET {
            return Err(PartitionError::InvalidInput(format!(
                "{} connectivity entries for {n} elements",
                self.connectivity.len()
            )));
        }
        if let Some(c) = self.centroids {
            if c.len() != n {
                return Err(PartitionError::InvalidInput(format!(
                    "{} centroids for {n} elements",
                    c.len()
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn require_centroids(&self, algo: &'static str) -> Result<&'a Centroids, PartitionError> {
        self.centroids.ok_or(PartitionError::MissingCentroids(algo))
    }
}

/// Maps every element to a work unit.
pub trait GraphPartitioner {
    /// Short algorithm name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Whether the algorithm needs element centroids.
    fn is_geometric(&self) -> bool {
        false
    }

    /// Returns one work-unit id in `[0, nparts)` per input element.
    fn partition(&self, input: &PartitionInput<'_>, nparts: usize)
    -> Result<Vec<usize>, PartitionError>;
}

impl<P: GraphPartitioner + ?Sized> GraphPartitioner for Box<P> {
    fn name(&self) -> &'static str {
        (**self).name()
    }
    fn is_geometric(&self) -> bool {
        (**self).is_geometric()
    }
    fn partition(
        &self,
        input: &PartitionInput<'_>,
        nparts: usize,
    ) -> Result<Vec<usize>, PartitionError> {
        (**self).partition(input, nparts)
    }
}

/// Number of elements the `k`-th of `nparts` contiguous runs over `n`
/// elements starts at.
#[inline]
pub(crate) fn run_start(k: usize, n: usize, nparts: usize) -> usize {
    ((k as u128 * n as u128) / nparts as u128) as usize
}

#[cfg(test)]
mod tests;

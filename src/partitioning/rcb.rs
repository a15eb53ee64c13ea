//! Recursive coordinate bisection.

use super::bisection::{bisect, widest_axis};
use super::error::PartitionError;
use super::{GraphPartitioner, PartitionInput};

/// Recursive coordinate bisection of element centroids: every cut is normal
/// to the widest coordinate axis of the remaining points.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rcb;

impl GraphPartitioner for Rcb {
    fn name(&self) -> &'static str {
        "rcb"
    }

    fn is_geometric(&self) -> bool {
        true
    }

    fn partition(
        &self,
        input: &PartitionInput<'_>,
        nparts: usize,
    ) -> Result<Vec<usize>, PartitionError> {
        if nparts == 0 {
            return Err(PartitionError::NoParts);
        }
        input.validate()?;
        let pts = input.require_centroids(self.name())?;
        let mut idx: Vec<usize> = (0..input.nelem()).collect();
        let mut out = vec![0; input.nelem()];
        bisect(pts, &mut idx, 0, nparts, &widest_axis, &mut out);
        Ok(out)
    }
}

//! Block partitioning in global element order.

use super::error::PartitionError;
use super::{GraphPartitioner, PartitionInput};

/// Cuts the global element sequence into `nparts` contiguous runs. Needs no
/// geometry and gives the same answer no matter how the mesh was chunked.
#[derive(Debug, Clone, Copy, Default)]
pub struct Block;

impl GraphPartitioner for Block {
    fn name(&self) -> &'static str {
        "block"
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
        let n = input.nelem_global as u128;
        input
            .gelemid
            .iter()
            .map(|&g| {
                if u128::from(g) >= n {
                    return Err(PartitionError::InvalidInput(format!(
                        "element {g} beyond mesh of {n} elements"
                    )));
                }
                Ok((u128::from(g) * nparts as u128 / n) as usize)
            })
            .collect()
    }
}

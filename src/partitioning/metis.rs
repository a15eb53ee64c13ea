//! k-way METIS partitioning of the element dual graph (`metis-support` feature).

use super::error::PartitionError;
use super::{GraphPartitioner, PartitionInput};

#[derive(Debug, Clone, Copy, Default)]
pub struct Metis;

impl GraphPartitioner for Metis {
    fn name(&self) -> &'static str {
        "metis"
    }

    #[cfg(feature = "metis-support")]
    fn partition(
        &self,
        input: &PartitionInput<'_>,
        nparts: usize,
    ) -> Result<Vec<usize>, PartitionError> {
        use crate::algs::dual_graph::build_dual;
        use metis::Idx;

        if nparts == 0 {
            return Err(PartitionError::NoParts);
        }
        input.validate()?;
        let n = input.nelem();
        // METIS rejects trivial requests
        if nparts == 1 || n <= 1 {
            return Ok(vec![0; n]);
        }
        let graph =
            build_dual(input.connectivity).map_err(|e| PartitionError::InvalidInput(e.to_string()))?;
        let xadj: Vec<Idx> = graph.xadj.iter().map(|&u| u as Idx).collect();
        let adjncy: Vec<Idx> = graph.adjncy.iter().map(|&v| v as Idx).collect();
        let vwgt: Vec<Idx> = graph.vwgt.iter().map(|&w| w as Idx).collect();
        let mut part: Vec<Idx> = vec![0; n];

        metis::Graph::new(1, nparts as Idx, &xadj, &adjncy)
            .map_err(|e| PartitionError::Other(format!("{e:?}")))?
            .set_vwgt(&vwgt)
            .part_kway(&mut part)
            .map_err(|e| PartitionError::Other(format!("{e:?}")))?;

        Ok(part.into_iter().map(|p| p as usize).collect())
    }

    #[cfg(not(feature = "metis-support"))]
    fn partition(
        &self,
        _input: &PartitionInput<'_>,
        _nparts: usize,
    ) -> Result<Vec<usize>, PartitionError> {
        Err(PartitionError::Unsupported("metis", "metis-support"))
    }
}

//! Greedy graph growing over the element dual graph.

use super::error::PartitionError;
use super::{GraphPartitioner, PartitionInput, run_start};
use crate::algs::dual_graph::{DualGraph, build_dual};
use std::collections::VecDeque;

/// Grows parts one at a time by breadth-first search from the lowest
/// unassigned element until each reaches its share of the elements.
/// Disconnected remainders are reseeded.
#[derive(Debug, Clone, Copy, Default)]
pub struct Greedy;

pub(crate) fn grow(graph: &DualGraph, nparts: usize) -> Vec<usize> {
    const UNASSIGNED: usize = usize::MAX;
    let n = graph.len();
    let mut part = vec![UNASSIGNED; n];
    let mut next_seed = 0;
    let mut queue = VecDeque::new();

    for p in 0..nparts {
        let target = run_start(p + 1, n, nparts) - run_start(p, n, nparts);
        let mut size = 0;
        queue.clear();
        while size < target {
            let v = match queue.pop_front() {
                Some(v) => v,
                None => {
                    while part[next_seed] != UNASSIGNED {
                        next_seed += 1;
                    }
                    next_seed
                }
            };
            if part[v] != UNASSIGNED {
                continue;
            }
            part[v] = p;
            size += 1;
            queue.extend(graph.neighbors(v).iter().filter(|&&u| part[u] == UNASSIGNED));
        }
    }
    part
}

impl GraphPartitioner for Greedy {
    fn name(&self) -> &'static str {
        "greedy"
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
        let graph =
            build_dual(input.connectivity).map_err(|e| PartitionError::InvalidInput(e.to_string()))?;
        Ok(grow(&graph, nparts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_splits_into_contiguous_runs() {
        // five tetrahedra in a chain, each sharing a face with the next
        let tets: Vec<u64> = (0..5u64).flat_map(|e| [e, e + 1, e + 2, e + 3]).collect();
        let g = build_dual(&tets).unwrap();
        assert_eq!(grow(&g, 2), vec![0, 0, 1, 1, 1]);
        assert_eq!(grow(&g, 1), vec![0; 5]);
    }

    #[test]
    fn disconnected_pieces_are_reseeded() {
        let g = build_dual(&[0, 1, 2, 3, 10, 11, 12, 13, 20, 21, 22, 23]).unwrap();
        assert_eq!(grow(&g, 3), vec![0, 1, 2]);
        assert_eq!(grow(&g, 2), vec![0, 1, 1]);
    }
}

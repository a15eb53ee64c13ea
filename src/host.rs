//! The host: global barriers, sum reductions, the collective graph
//! partitioning and the node merge.
//!
//! [`Conductor`] collects one contribution of each kind from every PE and
//! turns completed barriers into commands for the PEs. It runs on a single
//! rank ([`HOST`] in [`crate::driver`]) or inside [`crate::sim`].

use crate::algs::distribution::linear_load_distributor;
use crate::algs::node_merge::merge_nodes;
use crate::config::PartitionerConfig;
use crate::mesh::{Centroids, NODES_PER_TET};
use crate::partitioner::{Command, Contribution, ElementSlice};
use crate::partitioning::{GraphPartitioner, PartitionInput};
use crate::pipeline_error::PipelineError;
use serde::{Deserialize, Serialize};

/// Rank that hosts the [`Conductor`].
pub const HOST: usize = 0;

/// Summary of a finished run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub npes: usize,
    /// Elements in the mesh.
    pub nelem: u64,
    /// Work units created.
    pub nchare: usize,
    /// Distinct mesh nodes, i.e. the size of the new numbering.
    pub nodes: u64,
    /// Mean communication cost over PEs.
    pub avg_cost: f64,
    /// Standard deviation of the communication cost.
    pub std_cost: f64,
}

/// What the host asks the scheduler to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    Broadcast(Command),
    To { pe: usize, cmd: Command },
    Finished(Report),
}

/// One slot per PE; complete once every PE filled its slot.
#[derive(Debug, Clone)]
struct Tally<T> {
    slots: Vec<Option<T>>,
    filled: usize,
}

impl<T> Tally<T> {
    fn new(npes: usize) -> Self {
        Self {
            slots: (0..npes).map(|_| None).collect(),
            filled: 0,
        }
    }

    /// Record `value` for `pe`; returns whether the tally is now complete.
    fn insert(&mut self, pe: usize, value: T, what: &str) -> Result<bool, PipelineError> {
        match self.slots.get_mut(pe) {
            None => Err(PipelineError::internal(pe, format!("{what} from unknown PE"))),
            Some(Some(_)) => Err(PipelineError::internal(pe, format!("{what} contributed twice"))),
            Some(slot) => {
                *slot = Some(value);
                self.filled += 1;
                Ok(self.is_complete())
            }
        }
    }

    fn is_complete(&self) -> bool {
        self.filled == self.slots.len()
    }

    fn values(&self) -> impl Iterator<Item = &T> {
        self.slots.iter().flatten()
    }

    fn take(&mut self) -> Vec<T> {
        self.slots.iter_mut().filter_map(Option::take).collect()
    }
}

pub struct Conductor {
    npes: usize,
    cfg: PartitionerConfig,
    partitioner: Box<dyn GraphPartitioner + Send>,
    load: Tally<u64>,
    setup: Tally<()>,
    elements: Tally<ElementSlice>,
    distributed: Tally<()>,
    flattened: Tally<()>,
    nodes: Tally<Vec<u64>>,
    avgcost: Tally<f64>,
    stdcost: Tally<f64>,
    nelem: u64,
    nchare: usize,
    total_nodes: u64,
    avg: f64,
    reorder_sent: bool,
}

impl Conductor {
    pub fn new(npes: usize, cfg: PartitionerConfig) -> Result<Self, PipelineError> {
        cfg.validate()?;
        if npes == 0 {
            return Err(PipelineError::InvalidConfig("number of PEs must be positive".into()));
        }
        Ok(Self {
            npes,
            partitioner: cfg.algorithm.partitioner(),
            cfg,
            load: Tally::new(npes),
            setup: Tally::new(npes),
            elements: Tally::new(npes),
            distributed: Tally::new(npes),
            flattened: Tally::new(npes),
            nodes: Tally::new(npes),
            avgcost: Tally::new(npes),
            stdcost: Tally::new(npes),
            nelem: 0,
            nchare: 0,
            total_nodes: 0,
            avg: 0.0,
            reorder_sent: false,
        })
    }

    /// Partition with `partitioner` instead of the configured algorithm. PEs
    /// must be prepared for it, see
    /// [`Partitioner::prepare_for`](crate::partitioner::Partitioner::prepare_for).
    pub fn with_partitioner(mut self, partitioner: Box<dyn GraphPartitioner + Send>) -> Self {
        self.partitioner = partitioner;
        self
    }

    /// Number of work units for a mesh of `nelem` elements.
    pub fn decide_nchare(&self, nelem: u64) -> Result<usize, PipelineError> {
        let nchare = match self.cfg.nchare {
            Some(n) => n,
            None => linear_load_distributor(self.cfg.virtualization, nelem, self.npes)?.1 as usize,
        };
        if nchare < self.npes {
            return Err(PipelineError::TooFewWorkUnits {
                nchare,
                npes: self.npes,
            });
        }
        Ok(nchare)
    }

    /// Record a contribution of PE `pe`.
    pub fn contribute(&mut self, pe: usize, c: Contribution) -> Result<Vec<Directive>, PipelineError> {
        let what = c.kind();
        let mut out = Vec::new();
        match c {
            Contribution::Load(n) => {
                self.load.insert(pe, n, what)?;
                self.maybe_partition(&mut out)?;
            }
            Contribution::SetupComplete => {
                self.setup.insert(pe, (), what)?;
                self.maybe_partition(&mut out)?;
            }
            Contribution::Elements(slice) => {
                self.elements.insert(pe, slice, what)?;
                self.maybe_partition(&mut out)?;
            }
            Contribution::DistributionComplete => {
                if self.distributed.insert(pe, (), what)? {
                    log::debug!("all PEs distributed their work units");
                    out.push(Directive::Broadcast(Command::Flatten));
                }
            }
            Contribution::FlattenComplete => {
                self.flattened.insert(pe, (), what)?;
                self.maybe_reorder(&mut out);
            }
            Contribution::Nodes(ids) => {
                self.nodes.insert(pe, ids, what)?;
                self.maybe_reorder(&mut out);
            }
            Contribution::AvgCost(x) => {
                if self.avgcost.insert(pe, x, what)? {
                    self.avg = self.avgcost.values().sum::<f64>() / self.npes as f64;
                    log::info!("average communication cost: {:.4}", self.avg);
                    out.push(Directive::Broadcast(Command::StdCost { avg: self.avg }));
                }
            }
            Contribution::StdCost(x) => {
                if self.stdcost.insert(pe, x, what)? {
                    let std = (self.stdcost.values().sum::<f64>() / self.npes as f64).sqrt();
                    let report = Report {
                        npes: self.npes,
                        nelem: self.nelem,
                        nchare: self.nchare,
                        nodes: self.total_nodes,
                        avg_cost: self.avg,
                        std_cost: std,
                    };
                    log::info!(
                        "partitioned {} elements into {} work units on {} PE(s): {} nodes, cost {:.4} ± {:.4}",
                        report.nelem,
                        report.nchare,
                        report.npes,
                        report.nodes,
                        report.avg_cost,
                        report.std_cost
                    );
                    out.push(Directive::Finished(report));
                }
            }
        }
        Ok(out)
    }

    fn maybe_partition(&mut self, out: &mut Vec<Directive>) -> Result<(), PipelineError> {
        if !(self.load.is_complete() && self.setup.is_complete() && self.elements.is_complete()) {
            return Ok(());
        }
        self.nelem = self.load.values().sum();
        self.nchare = self.decide_nchare(self.nelem)?;
        log::info!(
            "mesh of {} elements, {} work units on {} PE(s)",
            self.nelem,
            self.nchare,
            self.npes
        );
        let slices = self.elements.take();
        let che = self.partition_mesh(&slices)?;

        // hand every PE the assignment of the elements it read
        let mut rest = che.as_slice();
        for (pe, slice) in slices.iter().enumerate() {
            let (mine, tail) = rest.split_at(slice.nelem());
            rest = tail;
            out.push(Directive::To {
                pe,
                cmd: Command::Partition {
                    nchare: self.nchare,
                    che: mine.to_vec(),
                },
            });
        }
        Ok(())
    }

    /// Concatenate the PEs' elements in rank order and partition them all in
    /// one call. Returns one work-unit id per element of the mesh.
    fn partition_mesh(&self, slices: &[ElementSlice]) -> Result<Vec<usize>, PipelineError> {
        let nelem = self.nelem as usize;
        let mut connectivity = Vec::with_capacity(nelem * NODES_PER_TET);
        let mut gelemid = Vec::with_capacity(nelem);
        let mut points: [Vec<f64>; 3] = Default::default();
        let geometric = slices.iter().all(|s| s.centroids.is_some());

        for (pe, s) in slices.iter().enumerate() {
            let n = s.nelem();
            if s.connectivity.len() != n * NODES_PER_TET {
                return Err(PipelineError::internal(
                    pe,
                    format!("{} connectivity entries do not form tetrahedra", s.connectivity.len()),
                ));
            }
            if s.first != gelemid.len() as u64 {
                return Err(PipelineError::internal(
                    pe,
                    format!("elements start at {}, expected {}", s.first, gelemid.len()),
                ));
            }
            gelemid.extend(s.first..s.first + n as u64);
            connectivity.extend_from_slice(&s.connectivity);
            if let Some(c) = s.centroids.as_ref().filter(|_| geometric) {
                if c.len() != n {
                    return Err(PipelineError::internal(
                        pe,
                        format!("{} centroids for {n} elements", c.len()),
                    ));
                }
                for (all, axis) in points.iter_mut().zip(&c.coords) {
                    all.extend_from_slice(axis);
                }
            }
        }
        if gelemid.len() != nelem {
            return Err(PipelineError::internal(
                HOST,
                format!("gathered {} elements, PEs reported {nelem}", gelemid.len()),
            ));
        }

        let centroids = Centroids { coords: points };
        let input = PartitionInput {
            connectivity: &connectivity,
            centroids: geometric.then_some(&centroids),
            gelemid: &gelemid,
            nelem_global: self.nelem,
        };
        let che = self.partitioner.partition(&input, self.nchare)?;
        if che.len() != nelem {
            return Err(PipelineError::internal(
                HOST,
                format!(
                    "{} partitioner returned {} work-unit ids for {nelem} elements",
                    self.partitioner.name(),
                    che.len()
                ),
            ));
        }
        log::debug!("{} partitioner assigned {nelem} elements", self.partitioner.name());
        Ok(che)
    }

    fn maybe_reorder(&mut self, out: &mut Vec<Directive>) {
        if self.reorder_sent || !(self.flattened.is_complete() && self.nodes.is_complete()) {
            return;
        }
        self.reorder_sent = true;
        let merge = merge_nodes(&self.nodes.take());
        self.total_nodes = merge.total;
        log::info!("{} distinct mesh nodes", merge.total);
        for (pe, (comm, start)) in merge.comm.into_iter().zip(merge.start).enumerate() {
            out.push(Directive::To {
                pe,
                cmd: Command::Reorder { start, comm },
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conductor(npes: usize, nchare: Option<usize>) -> Conductor {
        let cfg = PartitionerConfig {
            nchare,
            ..Default::default()
        };
        Conductor::new(npes, cfg).unwrap()
    }

    /// `n` elements starting at `first`, centroids along the x axis.
    fn slice(first: u64, n: u64) -> ElementSlice {
        let points: Vec<[f64; 3]> = (first..first + n).map(|e| [e as f64, 0.0, 0.0]).collect();
        ElementSlice {
            first,
            connectivity: (first..first + n).flat_map(|e| [e, e + 1, e + 2, e + 3]).collect(),
            centroids: Some(Centroids::from_points(&points)),
        }
    }

    fn setup(h: &mut Conductor, slices: &[ElementSlice]) -> Result<Vec<Directive>, PipelineError> {
        let mut out = Vec::new();
        for (pe, s) in slices.iter().enumerate() {
            out.extend(h.contribute(pe, Contribution::Load(s.nelem() as u64))?);
            out.extend(h.contribute(pe, Contribution::SetupComplete)?);
            out.extend(h.contribute(pe, Contribution::Elements(s.clone()))?);
        }
        Ok(out)
    }

    #[test]
    fn partition_after_load_setup_and_elements() {
        let mut h = conductor(2, Some(4));
        assert!(h.contribute(0, Contribution::Load(3)).unwrap().is_empty());
        assert!(h.contribute(1, Contribution::SetupComplete).unwrap().is_empty());
        assert!(h.contribute(1, Contribution::Load(5)).unwrap().is_empty());
        assert!(h.contribute(0, Contribution::Elements(slice(0, 3))).unwrap().is_empty());
        assert!(h.contribute(1, Contribution::Elements(slice(3, 5))).unwrap().is_empty());
        let d = h.contribute(0, Contribution::SetupComplete).unwrap();
        // the whole line is cut into four runs of two, across the PE boundary
        assert_eq!(
            d,
            vec![
                Directive::To {
                    pe: 0,
                    cmd: Command::Partition { nchare: 4, che: vec![0, 0, 1] }
                },
                Directive::To {
                    pe: 1,
                    cmd: Command::Partition { nchare: 4, che: vec![1, 2, 2, 3, 3] }
                },
            ]
        );
    }

    #[test]
    fn custom_partitioner_runs_on_the_host() {
        struct Reversed;
        impl GraphPartitioner for Reversed {
            fn name(&self) -> &'static str {
                "reversed"
            }
            fn partition(
                &self,
                input: &PartitionInput<'_>,
                nparts: usize,
            ) -> Result<Vec<usize>, crate::partitioning::error::PartitionError> {
                Ok(input.gelemid.iter().map(|&g| nparts - 1 - g as usize % nparts).collect())
            }
        }
        let mut h = conductor(2, Some(2)).with_partitioner(Box::new(Reversed));
        let d = setup(&mut h, &[slice(0, 1), slice(1, 1)]).unwrap();
        assert_eq!(
            d,
            vec![
                Directive::To {
                    pe: 0,
                    cmd: Command::Partition { nchare: 2, che: vec![1] }
                },
                Directive::To {
                    pe: 1,
                    cmd: Command::Partition { nchare: 2, che: vec![0] }
                },
            ]
        );
    }

    #[test]
    fn broken_partitioner_is_internal() {
        struct Empty;
        impl GraphPartitioner for Empty {
            fn name(&self) -> &'static str {
                "empty"
            }
            fn partition(
                &self,
                _: &PartitionInput<'_>,
                _: usize,
            ) -> Result<Vec<usize>, crate::partitioning::error::PartitionError> {
                Ok(Vec::new())
            }
        }
        let mut h = conductor(1, Some(2)).with_partitioner(Box::new(Empty));
        let err = setup(&mut h, &[slice(0, 4)]).unwrap_err();
        assert!(matches!(err, PipelineError::Internal { pe: HOST, .. }));
        assert!(!err.is_user_error());
    }

    #[test]
    fn gathered_elements_must_tile_the_mesh() {
        let mut h = conductor(2, Some(2));
        let err = setup(&mut h, &[slice(0, 2), slice(3, 2)]).unwrap_err();
        assert!(matches!(err, PipelineError::Internal { pe: 1, .. }));

        // geometric partitioning without centroids
        let mut h = conductor(1, Some(2));
        let bare = ElementSlice {
            centroids: None,
            ..slice(0, 2)
        };
        assert!(matches!(setup(&mut h, &[bare]), Err(PipelineError::Partition(_))));
    }

    #[test]
    fn duplicate_and_unknown_contributions() {
        let mut h = conductor(2, None);
        h.contribute(0, Contribution::SetupComplete).unwrap();
        let e = h.contribute(0, Contribution::SetupComplete).unwrap_err();
        assert!(matches!(e, PipelineError::Internal { pe: 0, .. }));
        assert!(h.contribute(5, Contribution::Load(1)).is_err());
    }

    #[test]
    fn too_few_work_units() {
        let h = conductor(4, Some(3));
        assert!(matches!(
            h.decide_nchare(100),
            Err(PipelineError::TooFewWorkUnits { nchare: 3, npes: 4 })
        ));
        assert_eq!(conductor(4, None).decide_nchare(100).unwrap(), 4);
    }

    #[test]
    fn reorder_after_flatten_and_nodes() {
        let mut h = conductor(2, Some(2));
        h.contribute(1, Contribution::Nodes(vec![12, 13, 14, 15])).unwrap();
        h.contribute(0, Contribution::FlattenComplete).unwrap();
        h.contribute(0, Contribution::Nodes(vec![10, 11, 12, 13])).unwrap();
        let d = h.contribute(1, Contribution::FlattenComplete).unwrap();
        assert_eq!(
            d,
            vec![
                Directive::To {
                    pe: 0,
                    cmd: Command::Reorder {
                        start: 0,
                        comm: Default::default()
                    }
                },
                Directive::To {
                    pe: 1,
                    cmd: Command::Reorder {
                        start: 4,
                        comm: [(0, vec![12, 13])].into()
                    }
                },
            ]
        );
    }

    #[test]
    fn cost_statistics() {
        let mut h = conductor(2, Some(2));
        h.contribute(0, Contribution::AvgCost(0.25)).unwrap();
        let d = h.contribute(1, Contribution::AvgCost(0.75)).unwrap();
        assert_eq!(d, vec![Directive::Broadcast(Command::StdCost { avg: 0.5 })]);
        h.contribute(0, Contribution::StdCost(0.0625)).unwrap();
        let d = h.contribute(1, Contribution::StdCost(0.0625)).unwrap();
        match &d[..] {
            [Directive::Finished(r)] => {
                assert_eq!(r.avg_cost, 0.5);
                assert_eq!(r.std_cost, 0.25);
            }
            other => panic!("unexpected directives {other:?}"),
        }
    }
}

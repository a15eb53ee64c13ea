//! The per-PE partitioning state machine.
//!
//! A [`Partitioner`] owns everything one PE knows: its element chunk, the
//! work units it owns, the node renumbering state and its bounds. It never
//! talks to the network. The scheduler feeds it [`Event`]s and carries out
//! the [`Action`]s it returns, which keeps every handler run-to-completion
//! and lets the same code run over threads, MPI or a randomized simulation.
//!
//! Phase transitions (see [`Phase`]):
//!
//! 1) `start` reads the chunk and contributes the load; geometric algorithms
//!    compute centroids before the setup barrier. The chunk (and centroids)
//!    go to the host, which partitions the whole mesh in one call.
//! 2) `Partition` carries the work unit of every local element; the PE ships
//!    each work unit to the PE owning it. Distribution is complete once this
//!    PE has partitioned and every export was acknowledged.
//! 3) `Flatten` checks that every owned work unit got elements and
//!    contributes the unique node set.
//! 4) `Reorder` numbers own nodes and requests the rest from their owners.
//! 5) Bounds travel along the chain PE k → PE k+1.
//! 6) Work units are handed out and the communication cost is reduced.

pub mod message;
pub mod phase;
pub mod reorder;

pub use message::{Action, Command, Contribution, ElementSlice, Event, PeerMessage};
pub use phase::Phase;
pub use reorder::Renumbering;

use crate::algs::distribution::{element_range, owned_chares, owner_of_chare};
use crate::config::PartitionerConfig;
use crate::mesh::{Centroids, MeshChunk, MeshReader, NODES_PER_TET};
use crate::partitioning::GraphPartitioner;
use crate::pipeline_error::PipelineError;
use crate::workunit::WorkUnit;
use hashbrown::HashMap;
use itertools::Itertools;
use std::collections::{BTreeMap, VecDeque};
use std::mem;

/// Chare id → source PE → old node ids of that PE's elements in the chare.
type ChareNodes = BTreeMap<usize, BTreeMap<usize, Vec<u64>>>;

pub struct Partitioner<R> {
    rank: usize,
    npes: usize,
    reader: R,
    /// Compute centroids for the partitioner.
    geometric: bool,
    phase: Phase,
    started: bool,
    /// Pending `LocalPhaseDone` events.
    local: VecDeque<Phase>,

    nelem_global: u64,
    chunk: MeshChunk,
    centroids: Option<Centroids>,

    nchare: Option<usize>,
    chares: ChareNodes,
    /// `Add` messages received before the work-unit count was known.
    parked: Vec<(usize, BTreeMap<usize, Vec<u64>>)>,
    outstanding_acks: usize,
    partitioned: bool,
    distributed: bool,

    renumbering: Option<Renumbering>,

    units: Vec<WorkUnit>,
    max_new: u64,
    early_lower: Option<u64>,
    lower: Option<u64>,
    upper: Option<u64>,
    cost: Option<f64>,
}

impl<R: MeshReader> Partitioner<R> {
    /// State machine for PE `rank` of `npes`, reading through `reader`.
    pub fn new(
        rank: usize,
        npes: usize,
        reader: R,
        cfg: &PartitionerConfig,
    ) -> Result<Self, PipelineError> {
        cfg.validate()?;
        if rank >= npes {
            return Err(PipelineError::InvalidConfig(format!(
                "rank {rank} out of range for {npes} PEs"
            )));
        }
        Ok(Self {
            rank,
            npes,
            reader,
            geometric: cfg.algorithm.is_geometric(),
            phase: Phase::Reading,
            started: false,
            local: VecDeque::new(),
            nelem_global: 0,
            chunk: MeshChunk::default(),
            centroids: None,
            nchare: None,
            chares: BTreeMap::new(),
            parked: Vec::new(),
            outstanding_acks: 0,
            partitioned: false,
            distributed: false,
            renumbering: None,
            units: Vec::new(),
            max_new: 0,
            early_lower: None,
            lower: None,
            upper: None,
            cost: None,
        })
    }

    /// Prepare the input `partitioner` needs instead of the one of the
    /// configured algorithm. The host must run the same partitioner.
    pub fn prepare_for(mut self, partitioner: &dyn GraphPartitioner) -> Self {
        self.geometric = partitioner.is_geometric();
        self
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_done(&self) -> bool {
        self.phase == Phase::Done
    }

    /// Number of work units, once the host decided it.
    pub fn nchare(&self) -> Option<usize> {
        self.nchare
    }

    /// `[lower, upper)` once bounds are known.
    pub fn bounds(&self) -> Option<(u64, u64)> {
        self.lower.zip(self.upper)
    }

    /// Communication cost once bounds are known.
    pub fn cost(&self) -> Option<f64> {
        self.cost
    }

    /// Old → new id assignments known to this PE.
    pub fn assignments(&self) -> Option<&HashMap<u64, u64>> {
        self.renumbering.as_ref().map(Renumbering::assignments)
    }

    fn internal(&self, reason: impl Into<String>) -> PipelineError {
        PipelineError::internal(self.rank, reason)
    }

    fn expect_phase(&self, expected: Phase, what: &str) -> Result<(), PipelineError> {
        if self.phase != expected {
            return Err(self.internal(format!(
                "{what} received in phase {}, expected {expected}",
                self.phase
            )));
        }
        Ok(())
    }

    /// Read this PE's chunk of the mesh and start the pipeline.
    pub fn start(&mut self) -> Result<Vec<Action>, PipelineError> {
        if self.started {
            return Err(self.internal("started twice"));
        }
        self.started = true;
        let mut out = Vec::new();
        self.read_graph(&mut out)?;
        self.run_local(&mut out)?;
        Ok(out)
    }

    /// Process one event and every local completion it triggers.
    pub fn handle(&mut self, event: Event) -> Result<Vec<Action>, PipelineError> {
        let mut out = Vec::new();
        self.dispatch(event, &mut out)?;
        self.run_local(&mut out)?;
        Ok(out)
    }

    fn run_local(&mut self, out: &mut Vec<Action>) -> Result<(), PipelineError> {
        while let Some(phase) = self.local.pop_front() {
            self.dispatch(Event::LocalPhaseDone(phase), out)?;
        }
        Ok(())
    }

    fn dispatch(&mut self, event: Event, out: &mut Vec<Action>) -> Result<(), PipelineError> {
        match event {
            Event::ReductionComplete(cmd) => match cmd {
                Command::Partition { nchare, che } => self.partition(nchare, che, out),
                Command::Flatten => self.flatten(out),
                Command::Reorder { start, comm } => self.reorder(start, comm, out),
                Command::StdCost { avg } => self.stdcost(avg, out),
            },
            Event::PeerMessageArrived { from, msg } => {
                if from >= self.npes || from == self.rank {
                    return Err(self.internal(format!("message from invalid peer {from}")));
                }
                match msg {
                    PeerMessage::Add { chares } => self.add(from, chares, out),
                    PeerMessage::Ack => self.ack(out),
                    PeerMessage::Request { ids } => self.request(from, ids, out),
                    PeerMessage::NewOrder { pairs } => self.neworder(from, pairs),
                    PeerMessage::Lower(v) => self.receive_lower(from, v, out),
                }
            }
            Event::LocalPhaseDone(phase) => self.local_done(phase, out),
        }
    }

    fn local_done(&mut self, phase: Phase, out: &mut Vec<Action>) -> Result<(), PipelineError> {
        match phase {
            Phase::Reading if self.geometric => {
                self.phase = Phase::Centroids;
                self.centroids = Some(self.chunk.compute_centroids(&self.reader)?);
                self.local.push_back(Phase::Centroids);
            }
            Phase::Reading | Phase::Centroids => {
                self.phase = Phase::Ready;
                out.push(Action::Contribute(Contribution::SetupComplete));
                out.push(Action::Contribute(Contribution::Elements(ElementSlice {
                    first: element_range(self.nelem_global, self.npes, self.rank).start,
                    connectivity: self.chunk.tetinpoel.clone(),
                    centroids: self.centroids.take(),
                })));
                log::debug!("[pe {}] setup complete", self.rank);
            }
            Phase::Reordering => self.enter_bounding(out)?,
            Phase::Bounding => self.create(out),
            other => return Err(self.internal(format!("unexpected local completion of {other}"))),
        }
        Ok(())
    }

    // --- Reading ---

    fn read_graph(&mut self, out: &mut Vec<Action>) -> Result<(), PipelineError> {
        self.nelem_global = self.reader.nelem()?;
        self.chunk = MeshChunk::read(&self.reader, self.rank, self.npes)?;
        log::debug!(
            "[pe {}] read {} of {} elements",
            self.rank,
            self.chunk.nelem(),
            self.nelem_global
        );
        out.push(Action::Contribute(Contribution::Load(self.chunk.nelem() as u64)));
        self.local.push_back(Phase::Reading);
        Ok(())
    }

    // --- Partitioning ---

    fn partition(
        &mut self,
        nchare: usize,
        che: Vec<usize>,
        out: &mut Vec<Action>,
    ) -> Result<(), PipelineError> {
        self.expect_phase(Phase::Ready, "partition")?;
        if nchare < self.npes {
            return Err(PipelineError::TooFewWorkUnits {
                nchare,
                npes: self.npes,
            });
        }
        self.nchare = Some(nchare);
        self.phase = Phase::Partitioning;

        if che.len() != self.chunk.nelem() {
            return Err(self.internal(format!(
                "partition assigns {} work-unit ids to {} local elements",
                che.len(),
                self.chunk.nelem()
            )));
        }

        // 1) bucket element connectivity by work unit
        let mut map: BTreeMap<usize, Vec<u64>> = BTreeMap::new();
        for (tet, &c) in self.chunk.tetinpoel.chunks_exact(NODES_PER_TET).zip(&che) {
            if c >= nchare {
                return Err(self.internal(format!("work unit {c} out of range [0, {nchare})")));
            }
            map.entry(c).or_default().extend_from_slice(tet);
        }

        // 2) keep own work units, export the rest
        self.distribute(nchare, map, out);
        self.partitioned = true;

        // 3) merge work units that arrived early
        for (from, chares) in mem::take(&mut self.parked) {
            self.merge(from, chares)?;
            out.push(Action::Send {
                to: from,
                msg: PeerMessage::Ack,
            });
        }
        self.check_distributed(out);
        Ok(())
    }

    fn distribute(&mut self, nchare: usize, map: BTreeMap<usize, Vec<u64>>, out: &mut Vec<Action>) {
        let mut exports: BTreeMap<usize, BTreeMap<usize, Vec<u64>>> = BTreeMap::new();
        for (chare, nodes) in map {
            let pe = owner_of_chare(chare, nchare, self.npes);
            if pe == self.rank {
                self.chares.entry(chare).or_default().insert(self.rank, nodes);
            } else {
                exports.entry(pe).or_default().insert(chare, nodes);
            }
        }
        self.outstanding_acks = exports.len();
        log::debug!(
            "[pe {}] partitioned into {} local work units, exporting to {} PE(s)",
            self.rank,
            self.chares.len(),
            exports.len()
        );
        out.extend(exports.into_iter().map(|(to, chares)| Action::Send {
            to,
            msg: PeerMessage::Add { chares },
        }));
    }

    fn merge(&mut self, from: usize, chares: BTreeMap<usize, Vec<u64>>) -> Result<(), PipelineError> {
        let nchare = self.nchare.ok_or_else(|| self.internal("merge before partition"))?;
        for (chare, nodes) in chares {
            let owner = owner_of_chare(chare, nchare, self.npes);
            if chare >= nchare || owner != self.rank {
                return Err(self.internal(format!(
                    "received work unit {chare} from PE {from}, but it belongs to PE {owner}"
                )));
            }
            if self.chares.entry(chare).or_default().insert(from, nodes).is_some() {
                return Err(self.internal(format!("work unit {chare} received twice from PE {from}")));
            }
        }
        Ok(())
    }

    fn add(
        &mut self,
        from: usize,
        chares: BTreeMap<usize, Vec<u64>>,
        out: &mut Vec<Action>,
    ) -> Result<(), PipelineError> {
        if self.phase > Phase::Partitioning {
            return Err(self.internal(format!("work units from PE {from} after distribution")));
        }
        if self.nchare.is_none() {
            log::debug!("[pe {}] parking work units from PE {from}", self.rank);
            self.parked.push((from, chares));
            return Ok(());
        }
        self.merge(from, chares)?;
        out.push(Action::Send {
            to: from,
            msg: PeerMessage::Ack,
        });
        self.check_distributed(out);
        Ok(())
    }

    fn ack(&mut self, out: &mut Vec<Action>) -> Result<(), PipelineError> {
        if self.outstanding_acks == 0 {
            return Err(self.internal("unexpected acknowledgment"));
        }
        self.outstanding_acks -= 1;
        self.check_distributed(out);
        Ok(())
    }

    fn check_distributed(&mut self, out: &mut Vec<Action>) {
        if self.partitioned && self.outstanding_acks == 0 && !self.distributed {
            self.distributed = true;
            out.push(Action::Contribute(Contribution::DistributionComplete));
            log::debug!("[pe {}] distribution complete", self.rank);
        }
    }

    // --- Flattening ---

    fn flatten(&mut self, out: &mut Vec<Action>) -> Result<(), PipelineError> {
        self.expect_phase(Phase::Partitioning, "flatten")?;
        if !self.distributed {
            return Err(self.internal("flatten before distribution completed"));
        }
        let nchare = self.nchare.ok_or_else(|| self.internal("flatten before partition"))?;
        self.phase = Phase::Flattening;

        for chare in owned_chares(nchare, self.npes, self.rank) {
            let empty = self
                .chares
                .get(&chare)
                .is_none_or(|m| m.values().all(Vec::is_empty));
            if empty {
                return Err(PipelineError::Overdecomposition {
                    pe: self.rank,
                    chare,
                    nchare,
                    npes: self.npes,
                });
            }
        }

        let ids: Vec<u64> = self
            .chares
            .values()
            .flat_map(|m| m.values().flatten().copied())
            .sorted_unstable()
            .dedup()
            .collect();
        log::debug!(
            "[pe {}] {} work units touch {} unique nodes",
            self.rank,
            self.chares.len(),
            ids.len()
        );
        self.renumbering = Some(Renumbering::new(ids.clone()));
        out.push(Action::Contribute(Contribution::FlattenComplete));
        out.push(Action::Contribute(Contribution::Nodes(ids)));
        Ok(())
    }

    // --- Reordering ---

    fn renumbering_mut(&mut self) -> Result<&mut Renumbering, PipelineError> {
        let rank = self.rank;
        self.renumbering
            .as_mut()
            .ok_or_else(|| PipelineError::internal(rank, "renumbering before flatten"))
    }

    fn reorder(
        &mut self,
        start: u64,
        comm: BTreeMap<usize, Vec<u64>>,
        out: &mut Vec<Action>,
    ) -> Result<(), PipelineError> {
        self.expect_phase(Phase::Flattening, "reorder")?;
        if comm.keys().any(|&p| p >= self.npes) {
            return Err(self.internal("comm map names a PE out of range"));
        }
        self.phase = Phase::Reordering;
        let rank = self.rank;
        let r = self.renumbering_mut()?;
        let requests = r
            .begin(rank, start, comm)
            .map_err(|e| PipelineError::internal(rank, e))?;
        log::debug!(
            "[pe {rank}] numbered {} nodes from {start}, requesting from {} PE(s)",
            r.block_end() - start,
            requests.len()
        );
        out.extend(requests.into_iter().map(|(to, ids)| Action::Send {
            to,
            msg: PeerMessage::Request { ids },
        }));
        self.flush(out)?;
        self.check_reordered();
        Ok(())
    }

    fn request(&mut self, from: usize, ids: Vec<u64>, out: &mut Vec<Action>) -> Result<(), PipelineError> {
        self.renumbering_mut()?.push_request(from, ids);
        self.flush(out)
    }

    fn flush(&mut self, out: &mut Vec<Action>) -> Result<(), PipelineError> {
        let rank = self.rank;
        let replies = self
            .renumbering_mut()?
            .flush()
            .map_err(|e| PipelineError::internal(rank, e))?;
        out.extend(replies.into_iter().map(|(to, pairs)| Action::Send {
            to,
            msg: PeerMessage::NewOrder { pairs },
        }));
        Ok(())
    }

    fn neworder(&mut self, from: usize, pairs: Vec<(u64, u64)>) -> Result<(), PipelineError> {
        self.expect_phase(Phase::Reordering, "new node ids")?;
        let rank = self.rank;
        self.renumbering_mut()?
            .resolve(from, pairs)
            .map_err(|e| PipelineError::internal(rank, e))?;
        self.check_reordered();
        Ok(())
    }

    fn check_reordered(&mut self) {
        let complete = self.renumbering.as_ref().is_some_and(Renumbering::is_complete);
        if self.phase == Phase::Reordering && complete && !self.local.contains(&Phase::Reordering) {
            log::debug!("[pe {}] reordering complete", self.rank);
            self.local.push_back(Phase::Reordering);
        }
    }

    // --- Bounding ---

    fn enter_bounding(&mut self, out: &mut Vec<Action>) -> Result<(), PipelineError> {
        self.phase = Phase::Bounding;
        let nchare = self.nchare.ok_or_else(|| self.internal("bounds before partition"))?;
        let r = self
            .renumbering
            .as_ref()
            .ok_or_else(|| self.internal("bounds before reorder"))?;

        // translate every owned work unit to new ids
        let mut units = Vec::with_capacity(self.chares.len());
        let mut max_new = 0;
        for chare in owned_chares(nchare, self.npes, self.rank) {
            let mut inpoel = Vec::new();
            let mut new_to_old = HashMap::new();
            for &old in self.chares.get(&chare).into_iter().flat_map(|m| m.values().flatten()) {
                let new = r
                    .new_id(old)
                    .ok_or_else(|| PipelineError::internal(self.rank, format!("node {old} has no new id")))?;
                max_new = max_new.max(new);
                inpoel.push(new);
                new_to_old.insert(new, old);
            }
            units.push(WorkUnit {
                chare,
                pe: self.rank,
                inpoel,
                new_to_old,
            });
        }
        self.units = units;
        self.max_new = max_new;

        if self.rank == 0 {
            self.lower = Some(0);
        } else if let Some(l) = self.early_lower.take() {
            self.lower = Some(l);
        }
        self.try_bounds(out);
        Ok(())
    }

    fn receive_lower(&mut self, from: usize, v: u64, out: &mut Vec<Action>) -> Result<(), PipelineError> {
        if from + 1 != self.rank {
            return Err(self.internal(format!("lower bound from PE {from}")));
        }
        if self.lower.is_some() || self.early_lower.is_some() {
            return Err(self.internal("lower bound received twice"));
        }
        match self.phase {
            p if p < Phase::Bounding => {
                log::debug!("[pe {}] holding lower bound {v}", self.rank);
                self.early_lower = Some(v);
            }
            Phase::Bounding => {
                self.lower = Some(v);
                self.try_bounds(out);
            }
            p => return Err(self.internal(format!("lower bound received in phase {p}"))),
        }
        Ok(())
    }

    fn try_bounds(&mut self, out: &mut Vec<Action>) {
        let Some(lower) = self.lower else { return };
        if self.phase != Phase::Bounding || self.upper.is_some() {
            return;
        }
        let Some(r) = self.renumbering.as_ref() else { return };

        let last = self.rank + 1 == self.npes;
        let upper = if last {
            (self.max_new + 1).max(r.block_end()).max(lower)
        } else {
            self.max_new.max(lower)
        };
        if !last {
            out.push(Action::Send {
                to: self.rank + 1,
                msg: PeerMessage::Lower(upper),
            });
        }

        // share of this PE's nodes whose rows live on another PE
        let ids = r.ids();
        let outside = ids
            .iter()
            .filter_map(|&old| r.new_id(old))
            .filter(|n| !(lower..upper).contains(n))
            .count();
        let cost = if ids.is_empty() {
            0.0
        } else {
            outside as f64 / ids.len() as f64
        };

        log::debug!("[pe {}] bounds [{lower}, {upper}), cost {cost:.4}", self.rank);
        self.upper = Some(upper);
        self.cost = Some(cost);
        self.local.push_back(Phase::Bounding);
    }

    // --- Creating ---

    fn create(&mut self, out: &mut Vec<Action>) {
        self.phase = Phase::Creating;
        out.extend(mem::take(&mut self.units).into_iter().map(Action::Instantiate));
        if let Some((lower, upper)) = self.bounds() {
            out.push(Action::Bounds {
                pe: self.rank,
                lower,
                upper,
            });
        }
        out.push(Action::Contribute(Contribution::AvgCost(self.cost.unwrap_or(0.0))));
    }

    fn stdcost(&mut self, avg: f64, out: &mut Vec<Action>) -> Result<(), PipelineError> {
        self.expect_phase(Phase::Creating, "cost statistics")?;
        let d = self.cost.unwrap_or(0.0) - avg;
        out.push(Action::Contribute(Contribution::StdCost(d * d)));
        self.phase = Phase::Done;
        log::debug!("[pe {}] done", self.rank);
        Ok(())
    }
}

#[cfg(test)]
mod tests;

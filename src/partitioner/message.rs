//! Events consumed and actions produced by the partitioning state machine.

use super::phase::Phase;
use crate::mesh::Centroids;
use crate::workunit::WorkUnit;
use std::collections::BTreeMap;

/// Host commands, issued once a global barrier or reduction completes.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Result of the collective partitioning into `nchare` work units: the
    /// work unit of every local element, in local element order.
    Partition { nchare: usize, che: Vec<usize> },
    /// All PEs have distributed their work units.
    Flatten,
    /// Renumber nodes starting at `start`. `comm` maps a peer to the old ids
    /// of this PE whose new id that peer assigns.
    Reorder {
        start: u64,
        comm: BTreeMap<usize, Vec<u64>>,
    },
    /// Mean communication cost across PEs.
    StdCost { avg: f64 },
}

/// Point-to-point messages between PEs.
#[derive(Debug, Clone, PartialEq)]
pub enum PeerMessage {
    /// Work units owned by the receiver: chare id → old node ids of the
    /// sender's elements in that chare.
    Add { chares: BTreeMap<usize, Vec<u64>> },
    /// The receiver merged an `Add`.
    Ack,
    /// Old ids whose new id the sender needs.
    Request { ids: Vec<u64> },
    /// Answer to a request: (old id, new id) pairs.
    NewOrder { pairs: Vec<(u64, u64)> },
    /// Upper bound of the sender, the receiver's lower bound.
    Lower(u64),
}

/// Elements a PE read, as gathered by the host for partitioning.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElementSlice {
    /// Global id of the first element; the slice is contiguous.
    pub first: u64,
    /// Four old node ids per element.
    pub connectivity: Vec<u64>,
    /// Element centroids, if the partitioner needs them.
    pub centroids: Option<Centroids>,
}

impl ElementSlice {
    pub fn nelem(&self) -> usize {
        self.connectivity.len() / crate::mesh::NODES_PER_TET
    }
}

/// What a PE reports to the host.
#[derive(Debug, Clone, PartialEq)]
pub enum Contribution {
    /// Number of elements read; summed.
    Load(u64),
    SetupComplete,
    /// The PE's share of the partitioner input.
    Elements(ElementSlice),
    DistributionComplete,
    FlattenComplete,
    /// Unique old node ids of the PE's work units.
    Nodes(Vec<u64>),
    /// Communication cost; summed.
    AvgCost(f64),
    /// Squared deviation of the cost from the mean; summed.
    StdCost(f64),
}

impl Contribution {
    pub fn kind(&self) -> &'static str {
        match self {
            Contribution::Load(_) => "load",
            Contribution::SetupComplete => "setup",
            Contribution::Elements(_) => "elements",
            Contribution::DistributionComplete => "distribution",
            Contribution::FlattenComplete => "flatten",
            Contribution::Nodes(_) => "nodes",
            Contribution::AvgCost(_) => "avgcost",
            Contribution::StdCost(_) => "stdcost",
        }
    }
}

/// Input to [`Partitioner::handle`](super::Partitioner::handle).
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    ReductionComplete(Command),
    PeerMessageArrived { from: usize, msg: PeerMessage },
    /// Local work of a phase finished; raised by the state machine itself.
    LocalPhaseDone(Phase),
}

/// Side effects requested by the state machine, executed by the scheduler.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Send { to: usize, msg: PeerMessage },
    Contribute(Contribution),
    /// Hand a finished work unit to the work-unit factory.
    Instantiate(WorkUnit),
    /// New node id range `[lower, upper)` of PE `pe`.
    Bounds { pe: usize, lower: u64, upper: u64 },
}

//! Phases of the per-PE partitioning state machine.

use std::fmt;

/// Where a PE is in the pipeline. Phases only ever advance, in declaration
/// order; `Centroids` is skipped by non-geometric algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    /// Reading the element chunk.
    Reading,
    /// Computing element centroids.
    Centroids,
    /// Setup done, waiting for the work-unit count.
    Ready,
    /// Partitioning and distributing work units.
    Partitioning,
    /// Collecting the node ids of owned work units.
    Flattening,
    /// Assigning new node ids.
    Reordering,
    /// Computing the new-id bounds of this PE.
    Bounding,
    /// Work units created, waiting for cost statistics.
    Creating,
    /// Nothing left to do.
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Reading => "reading",
            Phase::Centroids => "centroids",
            Phase::Ready => "ready",
            Phase::Partitioning => "partitioning",
            Phase::Flattening => "flattening",
            Phase::Reordering => "reordering",
            Phase::Bounding => "bounding",
            Phase::Creating => "creating",
            Phase::Done => "done",
        };
        f.write_str(s)
    }
}

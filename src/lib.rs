#![cfg_attr(docsrs, feature(doc_cfg))]
//! # mesh-partitioner
//!
//! mesh-partitioner decomposes a large unstructured tetrahedral mesh into many
//! more work units than there are processing elements (PEs), and renumbers
//! the mesh nodes so that every PE owns a contiguous range of new node ids.
//!
//! ## Pipeline
//! Every PE reads a contiguous chunk of elements. The host
//! ([`host::Conductor`]) gathers the chunks, partitions the whole mesh into
//! work units with one [`GraphPartitioner`](partitioning::GraphPartitioner)
//! call and hands every PE the work units of its elements. PEs ship each work
//! unit to the PE that owns it and then take part in a distributed
//! renumbering of the nodes. The host also provides the global barriers and
//! reductions. A per-PE
//! [`Partitioner`](partitioner::Partitioner) is a pure state machine: it
//! consumes [`Event`](partitioner::Event)s and returns
//! [`Action`](partitioner::Action)s, so the same code runs under
//!
//! - [`sim`]: all PEs in one thread, messages delivered in a seeded random order,
//! - [`driver`]: one PE per rank of a [`Communicator`](algs::communicator::Communicator)
//!   (threads, or MPI with the `mpi-support` feature).
//!
//! ## Features
//! - `mpi-support`: [`MpiComm`](algs::communicator::MpiComm) backend
//! - `metis-support`: k-way METIS partitioning of the element dual graph
//!
//! ## Determinism
//!
//! Partitioners are deterministic and randomized schedules use `SmallRng`
//! seeds, so runs are reproducible. The final numbering does not depend on
//! message order.

pub mod algs;
pub mod config;
pub mod driver;
pub mod host;
pub mod mesh;
pub mod mesh_error;
pub mod partitioner;
pub mod partitioning;
pub mod pipeline_error;
pub mod sim;
pub mod workunit;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::algs::communicator::{Communicator, NoComm, ThreadComm};
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::algs::meshgen::box_tets;
    pub use crate::config::{PartitionerConfig, PartitioningAlgorithm};
    pub use crate::driver::{run_pe, run_pe_with};
    pub use crate::host::{Conductor, Report};
    pub use crate::mesh::{MeshReader, TetMesh};
    pub use crate::mesh_error::MeshError;
    pub use crate::partitioner::{Action, Event, Partitioner, Phase};
    pub use crate::partitioning::GraphPartitioner;
    pub use crate::pipeline_error::PipelineError;
    pub use crate::sim::{Schedule, Simulation, simulate};
    pub use crate::workunit::{CollectingFactory, WorkUnit, WorkUnitFactory};
}

//! Building blocks shared by the pipeline: arithmetic distributions, the
//! node merge, transport and mesh utilities.

pub mod communicator;
pub mod distribution;
pub mod dual_graph;
pub mod meshgen;
pub mod node_merge;
pub mod wire;

pub use distribution::{element_range, linear_load_distributor, owner_of_chare};
pub use node_merge::merge_nodes;

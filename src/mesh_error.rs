//! MeshError: errors raised while reading a mesh chunk.
//!
//! Mesh readers are collaborators of the partitioner; whatever backs them
//! (an in-memory mesh, a file reader) reports failures through this type.

use thiserror::Error;

/// Unified error type for mesh reading operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MeshError {
    /// The requested element range does not fit in the mesh.
    #[error("Element range {from}..{till} out of bounds for mesh with {nelem} elements")]
    ElementRangeOutOfBounds { from: u64, till: u64, nelem: u64 },
    /// Coordinates were requested for a node the mesh does not contain.
    #[error("No coordinates for mesh node {0}")]
    MissingNodeCoordinates(u64),
    /// Connectivity is not a whole number of tetrahedra.
    #[error("Malformed connectivity: {len} node ids is not a multiple of 4")]
    MalformedConnectivity { len: usize },
    /// An element refers to a node that has no coordinates.
    #[error("Element {elem} references unknown node {node}")]
    UnknownNode { elem: u64, node: u64 },
    /// Generator parameters or coordinates that cannot describe a mesh.
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),
}

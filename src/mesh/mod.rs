//! Tetrahedral mesh access used by the partitioner.
//!
//! The partitioner never owns the whole mesh: every PE reads a contiguous
//! chunk of element connectivity through a [`MeshReader`] and, for geometric
//! partitioning, the coordinates of the nodes that chunk touches. [`TetMesh`]
//! is the in-memory reader used by tests, benches and the demos.

pub mod chunk;

use crate::mesh_error::MeshError;
use hashbrown::HashMap;
use std::ops::Range;
use std::sync::Arc;

pub use chunk::{Centroids, MeshChunk};

/// Number of nodes per tetrahedron.
pub const NODES_PER_TET: usize = 4;

/// Read-only access to a tetrahedral mesh, element chunk by element chunk.
///
/// Node ids are the "old" ids, i.e. the numbering used by the mesh source.
/// They do not have to be contiguous.
pub trait MeshReader {
    /// Total number of tetrahedra in the mesh.
    fn nelem(&self) -> Result<u64, MeshError>;

    /// Read the connectivity of elements `range.start..range.end`, four node
    /// ids per element, in element order.
    fn read_elements(&self, range: Range<u64>) -> Result<Vec<u64>, MeshError>;

    /// Read the coordinates of the given nodes.
    fn read_nodes(&self, ids: &[u64]) -> Result<HashMap<u64, [f64; 3]>, MeshError>;
}

impl<R: MeshReader + ?Sized> MeshReader for &R {
    fn nelem(&self) -> Result<u64, MeshError> {
        (**self).nelem()
    }
    fn read_elements(&self, range: Range<u64>) -> Result<Vec<u64>, MeshError> {
        (**self).read_elements(range)
    }
    fn read_nodes(&self, ids: &[u64]) -> Result<HashMap<u64, [f64; 3]>, MeshError> {
        (**self).read_nodes(ids)
    }
}

impl<R: MeshReader + ?Sized> MeshReader for Arc<R> {
    fn nelem(&self) -> Result<u64, MeshError> {
        (**self).nelem()
    }
    fn read_elements(&self, range: Range<u64>) -> Result<Vec<u64>, MeshError> {
        (**self).read_elements(range)
    }
    fn read_nodes(&self, ids: &[u64]) -> Result<HashMap<u64, [f64; 3]>, MeshError> {
        (**self).read_nodes(ids)
    }
}

/// An in-memory tetrahedral mesh.
#[derive(Debug, Clone, Default)]
pub struct TetMesh {
    tetinpoel: Vec<u64>,
    coords: HashMap<u64, [f64; 3]>,
}

impl TetMesh {
    /// Build a mesh from flattened connectivity and node coordinates.
    ///
    /// # Errors
    /// Returns [`MeshError::MalformedConnectivity`] if `tetinpoel` is not a
    /// multiple of four long, and [`MeshError::UnknownNode`] if an element
    /// refers to a node without coordinates.
    pub fn new(
        tetinpoel: Vec<u64>,
        coords: impl IntoIterator<Item = (u64, [f64; 3])>,
    ) -> Result<Self, MeshError> {
        if tetinpoel.len() % NODES_PER_TET != 0 {
            return Err(MeshError::MalformedConnectivity {
                len: tetinpoel.len(),
            });
        }
        let coords: HashMap<u64, [f64; 3]> = coords.into_iter().collect();
        for (e, tet) in tetinpoel.chunks_exact(NODES_PER_TET).enumerate() {
            if let Some(&node) = tet.iter().find(|n| !coords.contains_key(*n)) {
                return Err(MeshError::UnknownNode {
                    elem: e as u64,
                    node,
                });
            }
        }
        Ok(Self { tetinpoel, coords })
    }

    /// Flattened element connectivity.
    pub fn tetinpoel(&self) -> &[u64] {
        &self.tetinpoel
    }

    /// Number of distinct nodes with coordinates.
    pub fn nnode(&self) -> usize {
        self.coords.len()
    }

    /// Shift every node id by `offset`. Useful to exercise meshes whose node
    /// numbering does not start at zero.
    pub fn with_node_offset(self, offset: u64) -> Self {
        Self {
            tetinpoel: self.tetinpoel.into_iter().map(|n| n + offset).collect(),
            coords: self
                .coords
                .into_iter()
                .map(|(n, x)| (n + offset, x))
                .collect(),
        }
    }
}

impl MeshReader for TetMesh {
    fn nelem(&self) -> Result<u64, MeshError> {
        Ok((self.tetinpoel.len() / NODES_PER_TET) as u64)
    }

    fn read_elements(&self, range: Range<u64>) -> Result<Vec<u64>, MeshError> {
        let nelem = self.nelem()?;
        if range.start > range.end || range.end > nelem {
            return Err(MeshError::ElementRangeOutOfBounds {
                from: range.start,
                till: range.end,
                nelem,
            });
        }
        let lo = range.start as usize * NODES_PER_TET;
        let hi = range.end as usize * NODES_PER_TET;
        Ok(self.tetinpoel[lo..hi].to_vec())
    }

    fn read_nodes(&self, ids: &[u64]) -> Result<HashMap<u64, [f64; 3]>, MeshError> {
        ids.iter()
            .map(|&id| {
                self.coords
                    .get(&id)
                    .map(|&x| (id, x))
                    .ok_or(MeshError::MissingNodeCoordinates(id))
            })
            .collect()
    }
}

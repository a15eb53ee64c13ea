//! The contiguous chunk of mesh elements one PE reads.

use super::{MeshReader, NODES_PER_TET};
use crate::algs::distribution::element_range;
use crate::mesh_error::MeshError;
use itertools::Itertools;
use rayon::prelude::*;

/// Element centroid coordinates, stored per axis.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Centroids {
    pub coords: [Vec<f64>; 3],
}

impl Centroids {
    /// Build from one point per element.
    pub fn from_points(points: &[[f64; 3]]) -> Self {
        let mut coords: [Vec<f64>; 3] = Default::default();
        for (d, axis) in coords.iter_mut().enumerate() {
            *axis = points.iter().map(|p| p[d]).collect();
        }
        Self { coords }
    }

    pub fn len(&self) -> usize {
        self.coords[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Centroid of element `e`.
    #[inline]
    pub fn point(&self, e: usize) -> [f64; 3] {
        [self.coords[0][e], self.coords[1][e], self.coords[2][e]]
    }
}

/// Connectivity and global element ids of the elements a PE read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshChunk {
    /// Flattened connectivity, four old node ids per element.
    pub tetinpoel: Vec<u64>,
    /// Global element ids, `from..till`.
    pub gelemid: Vec<u64>,
}

impl MeshChunk {
    /// Read this PE's contiguously-numbered chunk of the mesh graph.
    ///
    /// The chunk is `nelem / npes` elements wide; the last PE also takes the
    /// remainder.
    pub fn read<R: MeshReader + ?Sized>(
        reader: &R,
        rank: usize,
        npes: usize,
    ) -> Result<Self, MeshError> {
        let nelem = reader.nelem()?;
        let range = element_range(nelem, npes, rank);
        let tetinpoel = reader.read_elements(range.clone())?;
        if tetinpoel.len() != (range.end - range.start) as usize * NODES_PER_TET {
            return Err(MeshError::MalformedConnectivity {
                len: tetinpoel.len(),
            });
        }
        Ok(Self {
            tetinpoel,
            gelemid: range.collect(),
        })
    }

    /// Number of elements in the chunk.
    pub fn nelem(&self) -> usize {
        self.gelemid.len()
    }

    /// Sorted, unique node ids referenced by the chunk.
    pub fn unique_nodes(&self) -> Vec<u64> {
        self.tetinpoel.iter().copied().sorted_unstable().dedup().collect()
    }

    /// Compute element centroids as the mean of the four vertex coordinates.
    pub fn compute_centroids<R: MeshReader + ?Sized>(
        &self,
        reader: &R,
    ) -> Result<Centroids, MeshError> {
        let coord = reader.read_nodes(&self.unique_nodes())?;
        let points: Vec<[f64; 3]> = self
            .tetinpoel
            .par_chunks_exact(NODES_PER_TET)
            .map(|tet| -> Result<[f64; 3], MeshError> {
                let mut c = [0.0; 3];
                for n in tet {
                    let x = coord
                        .get(n)
                        .ok_or(MeshError::MissingNodeCoordinates(*n))?;
                    for d in 0..3 {
                        c[d] += x[d];
                    }
                }
                Ok(c.map(|v| v / NODES_PER_TET as f64))
            })
            .collect::<Result<_, _>>()?;
        Ok(Centroids::from_points(&points))
    }
}

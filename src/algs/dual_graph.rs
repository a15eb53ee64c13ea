//! Build a CSR (compressed-sparse-row) *dual graph* of a tetrahedral mesh chunk.
//
// Each *element* is a vertex; an undirected edge is added between any two
// elements that share a face, i.e. three nodes.
//
// Returned in METIS-ready CSR triples:
//
// * `xadj[i] .. xadj[i+1]`   = neighbour list of element *i*
// * `adjncy`                 = concatenated neighbour vertices
// * `vwgt[i]`                = vertex weight, default = 1
//
// The dual graph is **symmetrised** (i↔j appear in both lists), **self-free**
// (no loops) and neighbour lists are sorted, so traversals are reproducible.

use crate::mesh::NODES_PER_TET;
use crate::mesh_error::MeshError;
use hashbrown::HashMap;

/// Face-local node triples of a tetrahedron.
const TET_FACES: [[usize; 3]; 4] = [[1, 2, 3], [0, 2, 3], [0, 1, 3], [0, 1, 2]];

/// CSR triple
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DualGraph {
    pub xadj: Vec<usize>,
    pub adjncy: Vec<usize>,
    pub vwgt: Vec<i32>, // METIS expects i32
}

impl DualGraph {
    /// Number of vertices (elements).
    pub fn len(&self) -> usize {
        self.xadj.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Neighbours of vertex `i`.
    pub fn neighbors(&self, i: usize) -> &[usize] {
        &self.adjncy[self.xadj[i]..self.xadj[i + 1]]
    }
}

/// Build the face-adjacency dual graph of flattened tetrahedron connectivity.
/// Element indices are positions in `tetinpoel`.
pub fn build_dual(tetinpoel: &[u64]) -> Result<DualGraph, MeshError> {
    if tetinpoel.len() % NODES_PER_TET != 0 {
        return Err(MeshError::MalformedConnectivity {
            len: tetinpoel.len(),
        });
    }
    let n = tetinpoel.len() / NODES_PER_TET;

    // 1. first-seen map: sorted face triple → element index
    let mut first_face_owner: HashMap<[u64; 3], usize> = HashMap::with_capacity(2 * n);

    // 2. adjacency list being built
    let mut adj: Vec<Vec<usize>> = vec![Vec::new(); n];

    for (e, tet) in tetinpoel.chunks_exact(NODES_PER_TET).enumerate() {
        for f in TET_FACES {
            let mut face = [tet[f[0]], tet[f[1]], tet[f[2]]];
            face.sort_unstable();
            if let Some(&other) = first_face_owner.get(&face) {
                // second time we see this face –> add undirected edge
                if other != e {
                    adj[e].push(other);
                    adj[other].push(e);
                }
            } else {
                first_face_owner.insert(face, e);
            }
        }
    }

    // 3. Convert adjacency → CSR vectors
    let mut xadj = Vec::with_capacity(n + 1);
    let mut adjncy = Vec::new();
    xadj.push(0);
    for nbrs in &mut adj {
        nbrs.sort_unstable();
        nbrs.dedup();
        adjncy.extend(nbrs.iter().copied());
        xadj.push(adjncy.len());
    }

    // 4. Simple unit vertex weights
    let vwgt = vec![1; n];

    Ok(DualGraph { xadj, adjncy, vwgt })
}

//! Basic tetrahedral mesh generator for structured boxes.

use crate::mesh::TetMesh;
use crate::mesh_error::MeshError;

/// Axis orders of the six Kuhn tetrahedra of a unit cube. Walking from
/// corner (0,0,0) to (1,1,1) one axis at a time, in each of these orders,
/// visits the four vertices of one tetrahedron.
const KUHN: [[usize; 3]; 6] = [
    [0, 1, 2],
    [0, 2, 1],
    [1, 0, 2],
    [1, 2, 0],
    [2, 0, 1],
    [2, 1, 0],
];

fn invalid_geometry(message: impl Into<String>) -> MeshError {
    MeshError::InvalidGeometry(message.into())
}

/// Tetrahedral mesh of the box `[min, max]` with `n[d]` hexahedral cells per
/// axis, each split into six tetrahedra. Neighbouring cells share faces
/// conformingly. Node ids are `i + (nx+1) * (j + (ny+1) * k)`.
pub fn box_tets(n: [usize; 3], min: [f64; 3], max: [f64; 3]) -> Result<TetMesh, MeshError> {
    if n.contains(&0) {
        return Err(invalid_geometry("cell counts must be positive"));
    }
    for d in 0..3 {
        if !(max[d] > min[d]) {
            return Err(invalid_geometry(format!(
                "box extent along axis {d} is empty: [{}, {}]",
                min[d], max[d]
            )));
        }
    }

    let [nx, ny, nz] = n;
    let id = |i: usize, j: usize, k: usize| (i + (nx + 1) * (j + (ny + 1) * k)) as u64;

    let mut coords = Vec::with_capacity((nx + 1) * (ny + 1) * (nz + 1));
    for k in 0..=nz {
        for j in 0..=ny {
            for i in 0..=nx {
                let x = [i, j, k];
                let mut p = [0.0; 3];
                for d in 0..3 {
                    p[d] = min[d] + (max[d] - min[d]) * x[d] as f64 / n[d] as f64;
                }
                coords.push((id(i, j, k), p));
            }
        }
    }

    let mut tetinpoel = Vec::with_capacity(6 * 4 * nx * ny * nz);
    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                for order in KUHN {
                    let mut c = [i, j, k];
                    tetinpoel.push(id(c[0], c[1], c[2]));
                    for axis in order {
                        c[axis] += 1;
                        tetinpoel.push(id(c[0], c[1], c[2]));
                    }
                }
            }
        }
    }

    TetMesh::new(tetinpoel, coords)
}

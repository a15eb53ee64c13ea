//! Recursive inertial bisection.

use super::bisection::{bisect, widest_axis};
use super::error::PartitionError;
use super::{GraphPartitioner, PartitionInput};
use crate::mesh::Centroids;

const POWER_ITERATIONS: usize = 64;

/// Recursive inertial bisection: every cut is normal to the principal axis
/// of inertia of the remaining points.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rib;

/// Dominant eigenvector of the covariance of the subset, by power iteration.
/// Falls back to the widest axis for degenerate clouds.
fn principal_axis(pts: &Centroids, idx: &[usize]) -> [f64; 3] {
    let n = idx.len() as f64;
    let mut mean = [0.0; 3];
    for &e in idx {
        let p = pts.point(e);
        for d in 0..3 {
            mean[d] += p[d] / n;
        }
    }
    let mut cov = [[0.0; 3]; 3];
    for &e in idx {
        let p = pts.point(e);
        let r = [p[0] - mean[0], p[1] - mean[1], p[2] - mean[2]];
        for i in 0..3 {
            for j in 0..3 {
                cov[i][j] += r[i] * r[j];
            }
        }
    }

    // start off the widest axis so that symmetric clouds stay axis-aligned
    let w = widest_axis(pts, idx);
    let mut v = [w[0] + 1e-3, w[1] + 2e-3, w[2] + 3e-3];
    for _ in 0..POWER_ITERATIONS {
        let mut next = [0.0; 3];
        for i in 0..3 {
            next[i] = cov[i][0] * v[0] + cov[i][1] * v[1] + cov[i][2] * v[2];
        }
        let norm = (next[0] * next[0] + next[1] * next[1] + next[2] * next[2]).sqrt();
        if !norm.is_normal() {
            return w;
        }
        v = next.map(|x| x / norm);
    }
    v
}

impl GraphPartitioner for Rib {
    fn name(&self) -> &'static str {
        "rib"
    }

    fn is_geometric(&self) -> bool {
        true
    }

    fn partition(
        &self,
        input: &PartitionInput<'_>,
        nparts: usize,
    ) -> Result<Vec<usize>, PartitionError> {
        if nparts == 0 {
            return Err(PartitionError::NoParts);
        }
        input.validate()?;
        let pts = input.require_centroids(self.name())?;
        let mut idx: Vec<usize> = (0..input.nelem()).collect();
        let mut out = vec![0; input.nelem()];
        bisect(pts, &mut idx, 0, nparts, &principal_axis, &mut out);
        Ok(out)
    }
}

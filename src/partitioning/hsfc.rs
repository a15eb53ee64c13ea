//! Hilbert space-filling-curve partitioning.
//!
//! Centroids are scaled into the unit cube, quantized to 21 bits per axis and
//! mapped to their 63-bit index along a 3-D Hilbert curve (Skilling's
//! transpose algorithm). Sorting by that index and cutting the sequence into
//! `nparts` equal runs yields spatially compact parts.

use super::bisection::bounding_box;
use super::error::PartitionError;
use super::{GraphPartitioner, PartitionInput, run_start};
use rayon::prelude::*;

const BITS: u32 = 21;

#[derive(Debug, Clone, Copy, Default)]
pub struct Hsfc;

/// Hilbert index of a quantized point.
pub fn hilbert_index(mut x: [u32; 3]) -> u64 {
    let m = 1u32 << (BITS - 1);

    // inverse undo
    let mut q = m;
    while q > 1 {
        let p = q - 1;
        for i in 0..3 {
            if x[i] & q != 0 {
                x[0] ^= p;
            } else {
                let t = (x[0] ^ x[i]) & p;
                x[0] ^= t;
                x[i] ^= t;
            }
        }
        q >>= 1;
    }

    // Gray encode
    for i in 1..3 {
        x[i] ^= x[i - 1];
    }
    let mut t = 0;
    let mut q = m;
    while q > 1 {
        if x[2] & q != 0 {
            t ^= q - 1;
        }
        q >>= 1;
    }
    for xi in &mut x {
        *xi ^= t;
    }

    // interleave the transposed bits, most significant first
    let mut key = 0u64;
    for b in (0..BITS).rev() {
        for xi in &x {
            key = (key << 1) | u64::from((xi >> b) & 1);
        }
    }
    key
}

impl GraphPartitioner for Hsfc {
    fn name(&self) -> &'static str {
        "hsfc"
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
        let n = input.nelem();
        let all: Vec<usize> = (0..n).collect();
        let (lo, hi) = bounding_box(pts, &all);
        let scale = ((1u32 << BITS) - 1) as f64;

        let mut keyed: Vec<(u64, usize)> = (0..n)
            .into_par_iter()
            .map(|e| {
                let p = pts.point(e);
                let mut q = [0u32; 3];
                for d in 0..3 {
                    let ext = hi[d] - lo[d];
                    let s = if ext > 0.0 { (p[d] - lo[d]) / ext } else { 0.0 };
                    q[d] = (s.clamp(0.0, 1.0) * scale) as u32;
                }
                (hilbert_index(q), e)
            })
            .collect();
        keyed.par_sort_unstable();

        let mut out = vec![0; n];
        let mut part = 0;
        for (k, &(_, e)) in keyed.iter().enumerate() {
            while part + 1 < nparts && k >= run_start(part + 1, n, nparts) {
                part += 1;
            }
            out[e] = part;
        }
        Ok(out)
    }
}

//! Recursive bisection of a point cloud, shared by [`Rcb`](super::Rcb) and
//! [`Rib`](super::Rib).
//!
//! At every level the points are projected on a direction chosen by the
//! caller and split at the weighted median: with `k` parts on the left and
//! `m - k` on the right, the left side receives `n * k / m` points. Ties in
//! the projection are broken by element index, so the result only depends on
//! the input.

use crate::mesh::Centroids;

/// Projection direction for a subset of points.
pub(crate) type Direction<'a> = dyn Fn(&Centroids, &[usize]) -> [f64; 3] + 'a;

/// Assign each point in `idx` a part in `first..first + nparts`.
pub(crate) fn bisect(
    pts: &Centroids,
    idx: &mut [usize],
    first: usize,
    nparts: usize,
    dir: &Direction<'_>,
    out: &mut [usize],
) {
    if nparts <= 1 || idx.len() <= 1 {
        for &e in idx.iter() {
            out[e] = first;
        }
        return;
    }
    let nleft_parts = nparts / 2;
    let nleft = ((idx.len() as u128 * nleft_parts as u128) / nparts as u128) as usize;

    let d = dir(pts, idx);
    let key = |e: usize| {
        let p = pts.point(e);
        p[0] * d[0] + p[1] * d[1] + p[2] * d[2]
    };
    if nleft > 0 && nleft < idx.len() {
        idx.select_nth_unstable_by(nleft, |&a, &b| key(a).total_cmp(&key(b)).then(a.cmp(&b)));
    }

    let (left, right) = idx.split_at_mut(nleft);
    bisect(pts, left, first, nleft_parts, dir, out);
    bisect(pts, right, first + nleft_parts, nparts - nleft_parts, dir, out);
}

/// Axis-aligned bounding box of a subset of points.
pub(crate) fn bounding_box(pts: &Centroids, idx: &[usize]) -> ([f64; 3], [f64; 3]) {
    let mut lo = [f64::INFINITY; 3];
    let mut hi = [f64::NEG_INFINITY; 3];
    for &e in idx {
        let p = pts.point(e);
        for d in 0..3 {
            lo[d] = lo[d].min(p[d]);
            hi[d] = hi[d].max(p[d]);
        }
    }
    (lo, hi)
}

/// Unit vector along the widest extent of the subset.
pub(crate) fn widest_axis(pts: &Centroids, idx: &[usize]) -> [f64; 3] {
    let (lo, hi) = bounding_box(pts, idx);
    let mut axis = 0;
    for d in 1..3 {
        if hi[d] - lo[d] > hi[axis] - lo[axis] {
            axis = d;
        }
    }
    let mut v = [0.0; 3];
    v[axis] = 1.0;
    v
}

//! Linear (contiguous block) distributions of elements and work units over PEs.
//!
//! Everything here is pure arithmetic so that every PE derives the same
//! answer without communicating.

use crate::pipeline_error::PipelineError;
use std::ops::Range;

/// Half-open range of global element ids read by `rank`.
///
/// Every PE gets `nelem / npes` elements; the last one also takes the
/// remainder.
pub fn element_range(nelem: u64, npes: usize, rank: usize) -> Range<u64> {
    debug_assert!(npes > 0 && rank < npes);
    let npes = npes as u64;
    let rank = rank as u64;
    let chunk = nelem / npes;
    let from = rank * chunk;
    let mut till = from + chunk;
    if rank == npes - 1 {
        till += nelem % npes;
    }
    from..till
}

/// Chunk size (work units per PE, except the last) and the number of work
/// units `rank` creates.
pub fn chare_distribution(nchare: usize, npes: usize, rank: usize) -> (usize, usize) {
    debug_assert!(npes > 0 && rank < npes);
    let chunksize = nchare / npes;
    let mut mynchare = chunksize;
    if rank == npes - 1 {
        mynchare += nchare % npes;
    }
    (chunksize, mynchare)
}

/// Contiguous block of work-unit ids owned by `rank`.
pub fn owned_chares(nchare: usize, npes: usize, rank: usize) -> Range<usize> {
    let (chunksize, mynchare) = chare_distribution(nchare, npes, rank);
    let first = rank * chunksize;
    first..first + mynchare
}

/// PE that owns (creates) work unit `chare`.
///
/// Work units are laid out in contiguous blocks of `nchare / npes`, the last
/// PE absorbing the remainder: with `nchare = 7` and `npes = 3` PE 0 owns
/// 0 1, PE 1 owns 2 3 and PE 2 owns 4 5 6.
pub fn owner_of_chare(chare: usize, nchare: usize, npes: usize) -> usize {
    debug_assert!(npes > 0);
    match nchare / npes {
        0 => npes - 1,
        chunksize => (chare / chunksize).min(npes - 1),
    }
}

/// Derive the work-unit size and count from the degree of virtualization.
///
/// `virtualization` in `[0, 1]` interpolates linearly between the largest
/// work units (`load / npes` elements, i.e. about one per PE) and the
/// smallest (one element each). Returns `(chunksize, nchare)`.
///
/// # Errors
/// [`PipelineError::InvalidConfig`] if `virtualization` is outside `[0, 1]`,
/// `npes` is zero, or the load is smaller than the number of PEs.
pub fn linear_load_distributor(
    virtualization: f64,
    load: u64,
    npes: usize,
) -> Result<(u64, u64), PipelineError> {
    if !(0.0..=1.0).contains(&virtualization) {
        return Err(PipelineError::InvalidConfig(format!(
            "virtualization must be in [0, 1], got {virtualization}"
        )));
    }
    if npes == 0 {
        return Err(PipelineError::InvalidConfig(
            "number of PEs must be positive".into(),
        ));
    }
    if load < npes as u64 {
        return Err(PipelineError::InvalidConfig(format!(
            "load ({load} elements) must not be smaller than the number of PEs ({npes})"
        )));
    }
    // smallest possible chunk: one element
    let a = 1.0;
    // largest possible chunk: one work unit per PE
    let b = load as f64 / npes as f64;
    let chunksize = (((1.0 - virtualization) * (b - a) + a) as u64).max(1);
    Ok((chunksize, load / chunksize))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seven_chares_three_pes() {
        let owners: Vec<_> = (0..7).map(|c| owner_of_chare(c, 7, 3)).collect();
        assert_eq!(owners, vec![0, 0, 1, 1, 2, 2, 2]);
        assert_eq!(owned_chares(7, 3, 0), 0..2);
        assert_eq!(owned_chares(7, 3, 1), 2..4);
        assert_eq!(owned_chares(7, 3, 2), 4..7);
    }

    #[test]
    fn element_range_last_takes_remainder() {
        assert_eq!(element_range(10, 3, 0), 0..3);
        assert_eq!(element_range(10, 3, 1), 3..6);
        assert_eq!(element_range(10, 3, 2), 6..10);
        assert_eq!(element_range(2, 4, 1), 0..0);
        assert_eq!(element_range(2, 4, 3), 0..2);
    }

    #[test]
    fn virtualization_extremes() {
        assert_eq!(linear_load_distributor(0.0, 100, 4).unwrap(), (25, 4));
        assert_eq!(linear_load_distributor(1.0, 100, 4).unwrap(), (1, 100));
        let (chunk, nchare) = linear_load_distributor(0.5, 100, 4).unwrap();
        assert_eq!(chunk, 13);
        assert_eq!(nchare, 7);
    }

    #[test]
    fn virtualization_rejects_bad_input() {
        assert!(linear_load_distributor(1.5, 100, 4).is_err());
        assert!(linear_load_distributor(-0.1, 100, 4).is_err());
        assert!(linear_load_distributor(0.0, 3, 4).is_err());
        assert!(linear_load_distributor(0.0, 3, 0).is_err());
    }
}

use super::*;
mod partition_property_tests;

/// Input over `points`, with a face-connected chain of tetrahedra as
/// connectivity and global ids starting at `first`.
pub(super) struct Fixture {
    pub centroids: Centroids,
    pub connectivity: Vec<u64>,
    pub gelemid: Vec<u64>,
    pub nelem_global: u64,
}

impl Fixture {
    pub fn new(points: &[[f64; 3]], first: u64, nelem_global: u64) -> Self {
        let n = points.len() as u64;
        Self {
            centroids: Centroids::from_points(points),
            connectivity: (0..n).flat_map(|e| [e, e + 1, e + 2, e + 3]).collect(),
            gelemid: (first..first + n).collect(),
            nelem_global,
        }
    }

    pub fn line(n: usize) -> Self {
        let pts: Vec<[f64; 3]> = (0..n).map(|i| [i as f64, 0.0, 0.0]).collect();
        Self::new(&pts, 0, n as u64)
    }

    pub fn input(&self) -> PartitionInput<'_> {
        PartitionInput {
            connectivity: &self.connectivity,
            centroids: Some(&self.centroids),
            gelemid: &self.gelemid,
            nelem_global: self.nelem_global,
        }
    }
}

#[test]
fn line_splits_into_ordered_runs() {
    let f = Fixture::line(8);
    let expected = vec![0, 0, 1, 1, 2, 2, 3, 3];
    assert_eq!(Rcb.partition(&f.input(), 4).unwrap(), expected);
    assert_eq!(Rib.partition(&f.input(), 4).unwrap(), expected);
    assert_eq!(Block.partition(&f.input(), 4).unwrap(), expected);
    assert_eq!(Greedy.partition(&f.input(), 4).unwrap(), expected);
    let h = Hsfc.partition(&f.input(), 4).unwrap();
    for p in 0..4 {
        assert_eq!(h.iter().filter(|&&q| q == p).count(), 2);
    }
}

#[test]
fn rcb_cuts_the_widest_axis_first() {
    // 2 x 4 grid, wider along y
    let pts: Vec<[f64; 3]> = (0..8).map(|i| [(i % 2) as f64, (i / 2) as f64, 0.0]).collect();
    let f = Fixture::new(&pts, 0, 8);
    let parts = Rcb.partition(&f.input(), 2).unwrap();
    assert_eq!(parts, vec![0, 0, 0, 0, 1, 1, 1, 1]);
}

#[test]
fn block_follows_global_element_ids() {
    // elements 6..9 of a 12-element mesh, 4 parts of 3
    let pts = [[0.0; 3]; 3];
    let f = Fixture::new(&pts, 6, 12);
    assert_eq!(Block.partition(&f.input(), 4).unwrap(), vec![2, 2, 2]);
}

#[test]
fn geometric_needs_centroids() {
    let f = Fixture::line(4);
    let input = PartitionInput {
        centroids: None,
        ..f.input()
    };
    assert_eq!(
        Rcb.partition(&input, 2),
        Err(PartitionError::MissingCentroids("rcb"))
    );
    assert!(Hsfc.partition(&input, 2).is_err());
    assert!(Block.partition(&input, 2).is_ok());
}

#[test]
fn invalid_inputs() {
    let f = Fixture::line(4);
    assert_eq!(Rcb.partition(&f.input(), 0), Err(PartitionError::NoParts));
    let short = PartitionInput {
        connectivity: &f.connectivity[..8],
        ..f.input()
    };
    assert!(matches!(
        Greedy.partition(&short, 2),
        Err(PartitionError::InvalidInput(_))
    ));
}

#[cfg(not(feature = "metis-support"))]
#[test]
fn metis_unavailable_without_feature() {
    let f = Fixture::line(4);
    assert_eq!(
        Metis.partition(&f.input(), 2),
        Err(PartitionError::Unsupported("metis", "metis-support"))
    );
}

#[cfg(feature = "metis-support")]
#[test]
fn metis_covers_all_parts() {
    let f = Fixture::line(16);
    let parts = Metis.partition(&f.input(), 4).unwrap();
    assert_eq!(parts.len(), 16);
    for p in 0..4 {
        assert!(parts.contains(&p));
    }
}

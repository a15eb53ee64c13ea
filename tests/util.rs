#![allow(dead_code)]
use mesh_partitioner::prelude::*;
use hashbrown::HashMap;
use std::collections::BTreeSet;

/// Unit cube split into `n`³ hexahedra, six tetrahedra each.
pub fn cube(n: usize) -> TetMesh {
    box_tets([n, n, n], [0.0; 3], [1.0; 3]).unwrap()
}

/// Configuration with an explicit work-unit count.
pub fn config(algorithm: PartitioningAlgorithm, nchare: usize) -> PartitionerConfig {
    PartitionerConfig {
        algorithm,
        nchare: Some(nchare),
        ..Default::default()
    }
}

/// Algorithms that are always available and never leave a work unit empty
/// on a chunk with at least as many elements as work units.
pub fn balanced_algorithms() -> [PartitioningAlgorithm; 5] {
    use PartitioningAlgorithm as A;
    [A::Rcb, A::Rib, A::Hsfc, A::Block, A::Greedy]
}

/// Assert vec is a permutation of another vec (order-agnostic).
pub fn assert_permutation<T: Ord + Copy + std::fmt::Debug>(got: &[T], want: &[T]) {
    let mut a = got.to_vec();
    a.sort_unstable();
    let mut b = want.to_vec();
    b.sort_unstable();
    assert_eq!(a, b, "not a permutation\n got={:?}\nwant={:?}", got, want);
}

fn sorted_tets(tets: impl Iterator<Item = [u64; 4]>) -> Vec<[u64; 4]> {
    let mut v: Vec<_> = tets
        .map(|mut t| {
            t.sort_unstable();
            t
        })
        .collect();
    v.sort_unstable();
    v
}

/// Check everything a finished run promises:
/// 1) the new numbering is a bijection `[0, nodes)` → old node ids,
/// 2) every element lands in exactly one work unit,
/// 3) PE bounds tile `[0, nodes)` in rank order.
pub fn check_run(mesh: &TetMesh, npes: usize, report: &Report, f: &CollectingFactory) {
    let old: BTreeSet<u64> = mesh.tetinpoel().iter().copied().collect();
    assert_eq!(report.nodes, old.len() as u64);
    assert_eq!(report.npes, npes);

    let map = f.global_new_to_old().expect("work units disagree on a node");
    assert!(map.keys().copied().eq(0..report.nodes), "new ids not contiguous");
    let images: BTreeSet<u64> = map.values().copied().collect();
    assert_eq!(images, old, "new numbering is not onto the old ids");
    assert_eq!(images.len(), map.len(), "two new ids for one old id");

    let chares: Vec<usize> = f.sorted_units().iter().map(|u| u.chare).collect();
    assert!(chares.iter().copied().eq(0..report.nchare));
    let got = sorted_tets(f.units.iter().flat_map(|u| {
        u.inpoel
            .chunks_exact(4)
            .map(|t| to_old(t, &u.new_to_old))
            .collect::<Vec<_>>()
    }));
    let want = sorted_tets(
        mesh.tetinpoel()
            .chunks_exact(4)
            .map(|t| [t[0], t[1], t[2], t[3]]),
    );
    assert_eq!(got, want);

    assert_eq!(f.bounds.len(), npes);
    let mut expected_lower = 0;
    for (pe, &(lower, upper)) in &f.bounds {
        assert_eq!(lower, expected_lower, "gap before PE {pe}");
        assert!(lower <= upper);
        expected_lower = upper;
    }
    assert_eq!(expected_lower, report.nodes);
}

fn to_old(tet: &[u64], new_to_old: &HashMap<u64, u64>) -> [u64; 4] {
    [0, 1, 2, 3].map(|i| new_to_old[&tet[i]])
}

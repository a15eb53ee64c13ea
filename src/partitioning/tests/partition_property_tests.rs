use proptest::prelude::*;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use super::Fixture;
use crate::partitioning::{Block, GraphPartitioner, Greedy, Hsfc, Rcb, Rib};

fn random_points(n: usize, seed: u64) -> Vec<[f64; 3]> {
    let mut rng = SmallRng::seed_from_u64(seed);
    (0..n)
        .map(|_| [rng.gen_range(-1.0..1.0), rng.gen_range(0.0..10.0), rng.gen_range(0.0..0.5)])
        .collect()
}

fn algorithms() -> Vec<Box<dyn GraphPartitioner>> {
    vec![
        Box::new(Rcb),
        Box::new(Rib),
        Box::new(Hsfc),
        Box::new(Block),
        Box::new(Greedy),
    ]
}

proptest! {
    #[test]
    fn prop_parts_in_range_balanced_and_deterministic(
        n in 0usize..80,
        nparts in 1usize..12,
        seed in any::<u64>(),
    ) {
        let f = Fixture::new(&random_points(n, seed), 0, n as u64);
        for algo in algorithms() {
            let parts = algo.partition(&f.input(), nparts).unwrap();
            prop_assert_eq!(parts.len(), n);
            prop_assert!(parts.iter().all(|&p| p < nparts), "{}: {:?}", algo.name(), parts);

            // A) every part gets floor(n/k) or ceil(n/k) elements
            let mut sizes = vec![0usize; nparts];
            for &p in &parts {
                sizes[p] += 1;
            }
            let lo = n / nparts;
            let hi = n.div_ceil(nparts);
            prop_assert!(
                sizes.iter().all(|&s| s == lo || s == hi),
                "{}: sizes = {:?}", algo.name(), sizes
            );

            // B) same input, same answer
            prop_assert_eq!(&algo.partition(&f.input(), nparts).unwrap(), &parts);
        }
    }

    #[test]
    fn prop_block_independent_of_chunking(
        n in 1usize..100,
        nparts in 1usize..10,
        cut in 0usize..100,
    ) {
        let cut = cut % (n + 1);
        let pts = random_points(n, 7);
        let whole = Block.partition(&Fixture::new(&pts, 0, n as u64).input(), nparts).unwrap();
        let head = Block.partition(&Fixture::new(&pts[..cut], 0, n as u64).input(), nparts).unwrap();
        let tail = Block
            .partition(&Fixture::new(&pts[cut..], cut as u64, n as u64).input(), nparts)
            .unwrap();
        prop_assert_eq!(whole, [head, tail].concat());
    }
}

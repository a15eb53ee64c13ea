// Partition a box of tetrahedra on a handful of threads, one PE per thread,
// and print the run report as JSON.
//
//     cargo run --example partition_box -- [npes] [cells-per-side] [algorithm]
use mesh_partitioner::prelude::*;
use std::sync::Arc;
use std::thread;

fn main() {
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .init()
        .unwrap();

    let mut args = std::env::args().skip(1);
    let npes: usize = args.next().map_or(4, |s| s.parse().unwrap());
    let n: usize = args.next().map_or(10, |s| s.parse().unwrap());
    let algorithm: PartitioningAlgorithm = args
        .next()
        .map_or(PartitioningAlgorithm::Rcb, |s| {
            serde_json::from_value(serde_json::Value::String(s)).unwrap()
        });

    // 1. Build the mesh and the configuration
    let mesh = Arc::new(box_tets([n, n, n], [0.0; 3], [1.0; 3]).unwrap());
    let cfg = PartitionerConfig {
        algorithm,
        virtualization: 0.1,
        nchare: None,
    };

    // 2. One thread per PE
    let handles: Vec<_> = ThreadComm::universe(npes)
        .into_iter()
        .map(|comm| {
            let mesh = Arc::clone(&mesh);
            let cfg = cfg.clone();
            thread::spawn(move || {
                let mut f = CollectingFactory::default();
                let report = run_pe(&comm, mesh, &cfg, &mut f).unwrap();
                (report, f)
            })
        })
        .collect();

    // 3. Print what every PE ended up with
    for (rank, h) in handles.into_iter().enumerate() {
        let (report, f) = h.join().unwrap();
        let (lower, upper) = f.bounds[&rank];
        let nelem: usize = f.units.iter().map(WorkUnit::nelem).sum();
        println!(
            "PE {rank}: {} work units, {nelem} elements, rows [{lower}, {upper})",
            f.units.len()
        );
        if let Some(report) = report {
            println!("{}", serde_json::to_string_pretty(&report).unwrap());
        }
    }
}

// Partition a box of tetrahedra over MPI, one PE per rank.
//
//     mpirun -n 4 cargo run --example partition_box_mpi --features mpi-support
fn main() {
    use mesh_partitioner::prelude::*;

    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .init()
        .unwrap();

    // 1. Initialize MPI
    let universe = mpi::initialize().unwrap();
    let comm = MpiComm::new(universe.world());

    // 2. Every rank builds (or would read) the same mesh
    let mesh = box_tets([16, 16, 16], [0.0; 3], [1.0; 3]).unwrap();
    let cfg = PartitionerConfig {
        algorithm: PartitioningAlgorithm::Hsfc,
        virtualization: 0.25,
        nchare: None,
    };

    // 3. Run this rank's PE
    let mut f = CollectingFactory::default();
    let report = run_pe(&comm, &mesh, &cfg, &mut f).unwrap();
    if let Some(&(lower, upper)) = f.bounds.get(&comm.rank()) {
        println!(
            "Rank {}: {} work units, rows [{lower}, {upper})",
            comm.rank(),
            f.units.len()
        );
    }
    if let Some(report) = report {
        println!("{}", serde_json::to_string_pretty(&report).unwrap());
    }
}

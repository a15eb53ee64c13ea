use super::*;
use crate::config::PartitioningAlgorithm;
use crate::mesh::TetMesh;

fn two_tets() -> TetMesh {
    let coords = (10..16).map(|i| (i, [i as f64, (i % 3) as f64, (i % 2) as f64]));
    TetMesh::new(vec![10, 11, 12, 13, 12, 13, 14, 15], coords).unwrap()
}

fn block(nchare: usize) -> PartitionerConfig {
    PartitionerConfig {
        algorithm: PartitioningAlgorithm::Block,
        nchare: Some(nchare),
        ..Default::default()
    }
}

fn partition(nchare: usize, che: &[usize]) -> Event {
    Event::ReductionComplete(Command::Partition {
        nchare,
        che: che.to_vec(),
    })
}

fn sends(actions: &[Action]) -> Vec<(usize, PeerMessage)> {
    actions
        .iter()
        .filter_map(|a| match a {
            Action::Send { to, msg } => Some((*to, msg.clone())),
            _ => None,
        })
        .collect()
}

fn contributions(actions: &[Action]) -> Vec<Contribution> {
    actions
        .iter()
        .filter_map(|a| match a {
            Action::Contribute(c) => Some(c.clone()),
            _ => None,
        })
        .collect()
}

fn cmd(c: Command) -> Event {
    Event::ReductionComplete(c)
}

fn peer(from: usize, msg: PeerMessage) -> Event {
    Event::PeerMessageArrived { from, msg }
}

fn elements(actions: &[Action]) -> ElementSlice {
    actions
        .iter()
        .find_map(|a| match a {
            Action::Contribute(Contribution::Elements(s)) => Some(s.clone()),
            _ => None,
        })
        .unwrap()
}

#[test]
fn start_reads_chunk_and_computes_centroids() {
    let mesh = two_tets();
    let mut pe = Partitioner::new(1, 2, &mesh, &PartitionerConfig::default()).unwrap();
    let a = pe.start().unwrap();
    let c = contributions(&a);
    assert_eq!(c[..2], [Contribution::Load(1), Contribution::SetupComplete]);
    assert_eq!(pe.phase(), Phase::Ready);
    let slice = elements(&a);
    assert_eq!(slice.first, 1);
    assert_eq!(slice.connectivity, vec![12, 13, 14, 15]);
    assert_eq!(slice.centroids.map(|c| c.point(0)), Some([13.5, 0.75, 0.5]));
    assert!(pe.start().is_err());

    let mut nongeo = Partitioner::new(0, 2, &mesh, &block(2)).unwrap();
    let slice = elements(&nongeo.start().unwrap());
    assert_eq!(slice.first, 0);
    assert!(slice.centroids.is_none());
}

#[test]
fn centroids_follow_the_partitioner_that_runs() {
    let mesh = two_tets();
    let mut pe = Partitioner::new(0, 2, &mesh, &block(2))
        .unwrap()
        .prepare_for(&crate::partitioning::Rcb);
    let a = pe.start().unwrap();
    assert_eq!(elements(&a).centroids.map(|c| c.len()), Some(1));

    let mut pe = Partitioner::new(0, 2, &mesh, &PartitionerConfig::default())
        .unwrap()
        .prepare_for(&crate::partitioning::Block);
    assert!(elements(&pe.start().unwrap()).centroids.is_none());
}

#[test]
fn two_tetrahedra_by_hand() {
    let mesh = two_tets();
    let mut p0 = Partitioner::new(0, 2, &mesh, &block(2)).unwrap();
    let mut p1 = Partitioner::new(1, 2, &mesh, &block(2)).unwrap();
    p0.start().unwrap();
    p1.start().unwrap();

    // each PE keeps its element in its own work unit
    let a0 = p0.handle(partition(2, &[0])).unwrap();
    let a1 = p1.handle(partition(2, &[1])).unwrap();
    assert_eq!(contributions(&a0), vec![Contribution::DistributionComplete]);
    assert_eq!(contributions(&a1), vec![Contribution::DistributionComplete]);
    assert!(sends(&a0).is_empty() && sends(&a1).is_empty());

    let a0 = p0.handle(cmd(Command::Flatten)).unwrap();
    let a1 = p1.handle(cmd(Command::Flatten)).unwrap();
    assert_eq!(
        contributions(&a0),
        vec![Contribution::FlattenComplete, Contribution::Nodes(vec![10, 11, 12, 13])]
    );
    assert_eq!(contributions(&a1)[1], Contribution::Nodes(vec![12, 13, 14, 15]));

    // PE 1 asks PE 0 for the shared nodes
    let a1 = p1
        .handle(cmd(Command::Reorder {
            start: 4,
            comm: [(0, vec![12, 13])].into(),
        }))
        .unwrap();
    assert_eq!(sends(&a1), vec![(0, PeerMessage::Request { ids: vec![12, 13] })]);

    // PE 0 numbers everything itself and starts the bounds chain
    let a0 = p0
        .handle(cmd(Command::Reorder {
            start: 0,
            comm: Default::default(),
        }))
        .unwrap();
    assert_eq!(sends(&a0), vec![(1, PeerMessage::Lower(3))]);
    assert!(a0.contains(&Action::Bounds { pe: 0, lower: 0, upper: 3 }));
    assert_eq!(contributions(&a0), vec![Contribution::AvgCost(0.25)]);
    assert_eq!(p0.phase(), Phase::Creating);

    let a0 = p0.handle(peer(1, PeerMessage::Request { ids: vec![12, 13] })).unwrap();
    assert_eq!(
        sends(&a0),
        vec![(1, PeerMessage::NewOrder { pairs: vec![(12, 2), (13, 3)] })]
    );

    let a1 = p1
        .handle(peer(0, PeerMessage::NewOrder { pairs: vec![(12, 2), (13, 3)] }))
        .unwrap();
    assert!(a1.is_empty());
    assert_eq!(p1.phase(), Phase::Bounding);

    let a1 = p1.handle(peer(0, PeerMessage::Lower(3))).unwrap();
    assert!(a1.contains(&Action::Bounds { pe: 1, lower: 3, upper: 6 }));
    assert_eq!(contributions(&a1), vec![Contribution::AvgCost(0.25)]);
    let unit = a1
        .iter()
        .find_map(|a| match a {
            Action::Instantiate(u) => Some(u.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(unit.chare, 1);
    assert_eq!(unit.inpoel, vec![2, 3, 4, 5]);
    assert_eq!(unit.new_to_old.get(&5), Some(&15));

    for p in [&mut p0, &mut p1] {
        let a = p.handle(cmd(Command::StdCost { avg: 0.25 })).unwrap();
        assert_eq!(contributions(&a), vec![Contribution::StdCost(0.0)]);
        assert!(p.is_done());
    }
}

#[test]
fn early_lower_bound_is_held() {
    let mesh = two_tets();
    let mut p1 = Partitioner::new(1, 2, &mesh, &block(2)).unwrap();
    p1.start().unwrap();
    p1.handle(partition(2, &[1])).unwrap();
    p1.handle(cmd(Command::Flatten)).unwrap();
    assert!(p1.handle(peer(0, PeerMessage::Lower(3))).unwrap().is_empty());
    assert_eq!(p1.bounds(), None);
    p1.handle(cmd(Command::Reorder {
        start: 4,
        comm: [(0, vec![12, 13])].into(),
    }))
    .unwrap();
    let a = p1
        .handle(peer(0, PeerMessage::NewOrder { pairs: vec![(12, 2), (13, 3)] }))
        .unwrap();
    assert!(a.contains(&Action::Bounds { pe: 1, lower: 3, upper: 6 }));
    assert_eq!(p1.cost(), Some(0.25));
    assert!(p1.handle(peer(0, PeerMessage::Lower(3))).is_err());
}

#[test]
fn work_units_before_partition_are_parked() {
    let mesh = two_tets();
    let mut p0 = Partitioner::new(0, 2, &mesh, &block(2)).unwrap();
    let mut p1 = Partitioner::new(1, 2, &mesh, &block(2)).unwrap();
    p0.start().unwrap();
    p1.start().unwrap();

    // the elements swap work units
    let a0 = p0.handle(partition(2, &[1])).unwrap();
    let add = sends(&a0);
    assert_eq!(
        add,
        vec![(1, PeerMessage::Add { chares: [(1, vec![10, 11, 12, 13])].into() })]
    );
    assert!(contributions(&a0).is_empty());

    // PE 1 has not seen the work-unit count yet
    let a1 = p1.handle(peer(0, add[0].1.clone())).unwrap();
    assert!(a1.is_empty());

    let a1 = p1.handle(partition(2, &[0])).unwrap();
    let s = sends(&a1);
    assert!(s.contains(&(0, PeerMessage::Ack)));
    assert!(s.contains(&(0, PeerMessage::Add { chares: [(0, vec![12, 13, 14, 15])].into() })));
    assert!(contributions(&a1).is_empty());

    // PE 0 is done distributing once its own export is acknowledged
    let a0 = p0.handle(peer(1, PeerMessage::Ack)).unwrap();
    assert_eq!(contributions(&a0), vec![Contribution::DistributionComplete]);
    let a0 = p0
        .handle(peer(1, PeerMessage::Add { chares: [(0, vec![12, 13, 14, 15])].into() }))
        .unwrap();
    assert_eq!(a0, vec![Action::Send { to: 1, msg: PeerMessage::Ack }]);

    let a1 = p1.handle(peer(0, PeerMessage::Ack)).unwrap();
    assert_eq!(contributions(&a1), vec![Contribution::DistributionComplete]);

    let a0 = p0.handle(cmd(Command::Flatten)).unwrap();
    assert_eq!(contributions(&a0)[1], Contribution::Nodes(vec![12, 13, 14, 15]));
}

#[test]
fn overdecomposition_is_a_user_error() {
    let coords = (0..7).map(|i| (i, [i as f64, (i * i) as f64, 0.0]));
    let mesh = TetMesh::new(
        vec![0, 1, 2, 3, 1, 2, 3, 4, 2, 3, 4, 5, 3, 4, 5, 6],
        coords,
    )
    .unwrap();
    let mut pe = Partitioner::new(0, 1, &mesh, &block(10)).unwrap();
    pe.start().unwrap();
    pe.handle(partition(10, &[0, 2, 5, 7])).unwrap();
    let err = pe.handle(cmd(Command::Flatten)).unwrap_err();
    assert!(err.is_user_error());
    assert!(matches!(
        err,
        PipelineError::Overdecomposition { pe: 0, nchare: 10, npes: 1, .. }
    ));
}

#[test]
fn malformed_assignment_is_internal() {
    let mesh = two_tets();
    let mut pe = Partitioner::new(0, 1, &mesh, &block(2)).unwrap();
    pe.start().unwrap();
    let err = pe.handle(partition(2, &[])).unwrap_err();
    assert!(matches!(err, PipelineError::Internal { pe: 0, .. }));
    assert!(!err.is_user_error());

    let mut pe = Partitioner::new(0, 1, &mesh, &block(2)).unwrap();
    pe.start().unwrap();
    assert!(matches!(
        pe.handle(partition(2, &[0, 5])),
        Err(PipelineError::Internal { .. })
    ));
}

#[test]
fn protocol_violations_are_internal() {
    let mesh = two_tets();
    let mut pe = Partitioner::new(0, 2, &mesh, &block(2)).unwrap();
    pe.start().unwrap();
    assert!(pe.handle(cmd(Command::Flatten)).is_err());
    assert!(pe.handle(peer(0, PeerMessage::Ack)).is_err());
    assert!(pe.handle(peer(1, PeerMessage::Lower(2))).is_err());
    assert!(matches!(
        pe.handle(partition(1, &[0])),
        Err(PipelineError::TooFewWorkUnits { nchare: 1, npes: 2 })
    ));
    pe.handle(partition(2, &[0])).unwrap();
    assert!(pe.handle(peer(1, PeerMessage::Ack)).is_err());
    // work unit 0 belongs to PE 0, but work unit 1 does not
    assert!(
        pe.handle(peer(1, PeerMessage::Add { chares: [(1, vec![1, 2, 3, 4])].into() }))
            .is_err()
    );
}

#[test]
fn request_before_reorder_is_answered_later() {
    let mesh = two_tets();
    let mut p0 = Partitioner::new(0, 2, &mesh, &block(2)).unwrap();
    p0.start().unwrap();
    p0.handle(partition(2, &[0])).unwrap();
    p0.handle(cmd(Command::Flatten)).unwrap();

    let a = p0.handle(peer(1, PeerMessage::Request { ids: vec![13, 12] })).unwrap();
    assert!(a.is_empty());
    assert_eq!(p0.assignments().map(|m| m.len()), Some(0));

    let a = p0
        .handle(cmd(Command::Reorder {
            start: 0,
            comm: Default::default(),
        }))
        .unwrap();
    assert!(sends(&a).contains(&(1, PeerMessage::NewOrder { pairs: vec![(13, 3), (12, 2)] })));
    assert_eq!(p0.assignments().unwrap().get(&10), Some(&0));
}

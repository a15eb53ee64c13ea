//! Single-threaded simulation of a whole partitioning run.
//!
//! All PEs and the host live in one thread. Every message is encoded to
//! bytes, parked in an in-flight pool and delivered in FIFO order or in an
//! order drawn from a seeded random generator. Because no ordering between
//! PEs is assumed anywhere in the protocol, every schedule must produce the
//! same renumbering and bounds.

use crate::algs::wire::{self, Envelope};
use crate::config::PartitionerConfig;
use crate::host::{Conductor, Directive, Report};
use crate::mesh::MeshReader;
use crate::partitioner::{Action, Event, Partitioner};
use crate::partitioning::GraphPartitioner;
use crate::pipeline_error::PipelineError;
use crate::workunit::WorkUnitFactory;
use bytes::Bytes;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;

/// Delivery order of in-flight messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    Fifo,
    /// Uniformly random pick from the pool, seeded.
    Random(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Pe(usize),
    Host,
}

pub struct Simulation<R> {
    pes: Vec<Partitioner<R>>,
    host: Conductor,
    pool: VecDeque<(Target, Bytes)>,
    rng: Option<SmallRng>,
    delivered: usize,
}

impl<R: MeshReader + Clone> Simulation<R> {
    pub fn new(
        reader: R,
        npes: usize,
        cfg: &PartitionerConfig,
        schedule: Schedule,
    ) -> Result<Self, PipelineError> {
        let pes = (0..npes)
            .map(|rank| Partitioner::new(rank, npes, reader.clone(), cfg))
            .collect::<Result<_, _>>()?;
        Ok(Self {
            pes,
            host: Conductor::new(npes, cfg.clone())?,
            pool: VecDeque::new(),
            rng: match schedule {
                Schedule::Fifo => None,
                Schedule::Random(seed) => Some(SmallRng::seed_from_u64(seed)),
            },
            delivered: 0,
        })
    }
}

impl<R: MeshReader> Simulation<R> {
    /// Partition with a custom graph partitioner instead of the configured
    /// algorithm.
    pub fn with_partitioner(mut self, partitioner: Box<dyn GraphPartitioner + Send>) -> Self {
        self.pes = self
            .pes
            .into_iter()
            .map(|pe| pe.prepare_for(&*partitioner))
            .collect();
        self.host = self.host.with_partitioner(partitioner);
        self
    }

    pub fn pes(&self) -> &[Partitioner<R>] {
        &self.pes
    }

    /// Number of messages delivered so far.
    pub fn delivered(&self) -> usize {
        self.delivered
    }

    fn post(&mut self, from: usize, to: Target, env: &Envelope) {
        self.pool.push_back((to, wire::encode(from, env)));
    }

    fn execute<F: WorkUnitFactory>(&mut self, from: usize, actions: Vec<Action>, factory: &mut F) {
        for action in actions {
            match action {
                Action::Send { to, msg } => self.post(from, Target::Pe(to), &Envelope::Peer(msg)),
                Action::Contribute(c) => self.post(from, Target::Host, &Envelope::Contribution(c)),
                Action::Instantiate(unit) => factory.instantiate(unit),
                Action::Bounds { pe, lower, upper } => factory.bounds(pe, lower, upper),
            }
        }
    }

    fn next(&mut self) -> Option<(Target, Bytes)> {
        match self.rng.as_mut() {
            Some(rng) if !self.pool.is_empty() => {
                let i = rng.gen_range(0..self.pool.len());
                self.pool.swap_remove_back(i)
            }
            _ => self.pool.pop_front(),
        }
    }

    /// Run to completion, handing work units to `factory`.
    pub fn run<F: WorkUnitFactory>(&mut self, factory: &mut F) -> Result<Report, PipelineError> {
        for rank in 0..self.pes.len() {
            let actions = self.pes[rank].start()?;
            self.execute(rank, actions, factory);
        }
        while let Some((target, bytes)) = self.next() {
            self.delivered += 1;
            let (from, env) = wire::decode(&bytes)?;
            match (target, env) {
                (Target::Host, Envelope::Contribution(c)) => {
                    for directive in self.host.contribute(from, c)? {
                        match directive {
                            Directive::Broadcast(cmd) => {
                                for pe in 0..self.pes.len() {
                                    self.post(0, Target::Pe(pe), &Envelope::Command(cmd.clone()));
                                }
                            }
                            Directive::To { pe, cmd } => {
                                self.post(0, Target::Pe(pe), &Envelope::Command(cmd))
                            }
                            Directive::Finished(report) => {
                                log::debug!("simulation finished after {} deliveries", self.delivered);
                                return Ok(report);
                            }
                        }
                    }
                }
                (Target::Pe(pe), Envelope::Command(cmd)) => {
                    let actions = self.pes[pe].handle(Event::ReductionComplete(cmd))?;
                    self.execute(pe, actions, factory);
                }
                (Target::Pe(pe), Envelope::Peer(msg)) => {
                    let actions = self.pes[pe].handle(Event::PeerMessageArrived { from, msg })?;
                    self.execute(pe, actions, factory);
                }
                (target, env) => {
                    return Err(PipelineError::internal(
                        from,
                        format!("misrouted message {env:?} to {target:?}"),
                    ));
                }
            }
        }
        Err(PipelineError::Stalled {
            undelivered: self.pes.iter().filter(|pe| !pe.is_done()).count(),
        })
    }
}

/// Run a whole pipeline in one thread.
pub fn simulate<R, F>(
    reader: R,
    npes: usize,
    cfg: &PartitionerConfig,
    schedule: Schedule,
    factory: &mut F,
) -> Result<Report, PipelineError>
where
    R: MeshReader + Clone,
    F: WorkUnitFactory,
{
    Simulation::new(reader, npes, cfg, schedule)?.run(factory)
}

//! Run one PE of the pipeline over a [`Communicator`].
//!
//! Every rank runs [`run_pe`]. Rank 0 also hosts the [`Conductor`]: PEs send
//! their contributions to rank 0, and host commands go out to every rank.
//! Messages a rank addresses to itself never touch the communicator.
//!
//! A rank that fails sends an abort message to every other rank before it
//! returns its error; a rank receiving one returns [`PipelineError::Aborted`].

use crate::algs::communicator::Communicator;
use crate::algs::wire::{self, Envelope};
use crate::config::PartitionerConfig;
use crate::host::{Conductor, Directive, HOST, Report};
use crate::mesh::MeshReader;
use crate::partitioner::{Action, Event, Partitioner};
use crate::partitioning::GraphPartitioner;
use crate::pipeline_error::PipelineError;
use crate::workunit::WorkUnitFactory;
use std::collections::VecDeque;

struct Endpoint<'a, C: ?Sized> {
    comm: &'a C,
    rank: usize,
    /// Messages to self.
    local: VecDeque<(usize, Envelope)>,
}

impl<C: Communicator + ?Sized> Endpoint<'_, C> {
    fn post(&mut self, to: usize, env: Envelope) -> Result<(), PipelineError> {
        if to == self.rank {
            self.local.push_back((self.rank, env));
        } else {
            self.comm.send(to, wire::encode(self.rank, &env))?;
        }
        Ok(())
    }

    fn next(&mut self) -> Result<(usize, Envelope), PipelineError> {
        if let Some(msg) = self.local.pop_front() {
            return Ok(msg);
        }
        let (src, bytes) = self.comm.recv()?;
        let (from, env) = wire::decode(&bytes)?;
        if from != src {
            log::warn!("[pe {}] message from rank {src} claims sender {from}", self.rank);
        }
        Ok((from, env))
    }
}

/// Run this rank's PE to completion. Returns the final report on rank 0 and
/// `None` elsewhere.
pub fn run_pe<C, R, F>(
    comm: &C,
    reader: R,
    cfg: &PartitionerConfig,
    factory: &mut F,
) -> Result<Option<Report>, PipelineError>
where
    C: Communicator + ?Sized,
    R: MeshReader,
    F: WorkUnitFactory,
{
    run_pe_with(comm, reader, cfg, cfg.algorithm.partitioner(), factory)
}

/// [`run_pe`] with a custom graph partitioner. Every rank must pass the same
/// kind of partitioner; only the host's runs.
pub fn run_pe_with<C, R, F>(
    comm: &C,
    reader: R,
    cfg: &PartitionerConfig,
    partitioner: Box<dyn GraphPartitioner + Send>,
    factory: &mut F,
) -> Result<Option<Report>, PipelineError>
where
    C: Communicator + ?Sized,
    R: MeshReader,
    F: WorkUnitFactory,
{
    let result = drive(comm, reader, cfg, partitioner, factory);
    if let Err(e) = &result {
        if !matches!(e, PipelineError::Aborted { .. }) {
            abort(comm, e);
        }
    }
    result
}

/// Tell every other rank to stop.
fn abort<C: Communicator + ?Sized>(comm: &C, err: &PipelineError) {
    let rank = comm.rank();
    log::error!("[pe {rank}] aborting the run: {err}");
    let msg = wire::encode(
        rank,
        &Envelope::Abort {
            user: err.is_user_error(),
            reason: err.to_string(),
        },
    );
    for to in (0..comm.size()).filter(|&to| to != rank) {
        if let Err(e) = comm.send(to, msg.clone()) {
            log::warn!("[pe {rank}] could not send abort to PE {to}: {e}");
        }
    }
}

fn drive<C, R, F>(
    comm: &C,
    reader: R,
    cfg: &PartitionerConfig,
    partitioner: Box<dyn GraphPartitioner + Send>,
    factory: &mut F,
) -> Result<Option<Report>, PipelineError>
where
    C: Communicator + ?Sized,
    R: MeshReader,
    F: WorkUnitFactory,
{
    let rank = comm.rank();
    let npes = comm.size();
    let mut pe = Partitioner::new(rank, npes, reader, cfg)?.prepare_for(&*partitioner);
    let mut host = if rank == HOST {
        Some(Conductor::new(npes, cfg.clone())?.with_partitioner(partitioner))
    } else {
        None
    };
    let mut ep = Endpoint {
        comm,
        rank,
        local: VecDeque::new(),
    };
    let mut report = None;

    let actions = pe.start()?;
    execute(&mut ep, actions, factory)?;

    while !(pe.is_done() && (host.is_none() || report.is_some())) {
        let (from, env) = ep.next()?;
        match env {
            Envelope::Peer(msg) => {
                let actions = pe.handle(Event::PeerMessageArrived { from, msg })?;
                execute(&mut ep, actions, factory)?;
            }
            Envelope::Command(cmd) => {
                let actions = pe.handle(Event::ReductionComplete(cmd))?;
                execute(&mut ep, actions, factory)?;
            }
            Envelope::Abort { user, reason } => {
                log::debug!("[pe {rank}] run aborted by PE {from}");
                return Err(PipelineError::Aborted {
                    pe: from,
                    user,
                    reason,
                });
            }
            Envelope::Contribution(c) => {
                let h = host
                    .as_mut()
                    .ok_or_else(|| PipelineError::internal(rank, "contribution sent to a non-host rank"))?;
                for directive in h.contribute(from, c)? {
                    match directive {
                        Directive::Broadcast(cmd) => {
                            for to in 0..npes {
                                ep.post(to, Envelope::Command(cmd.clone()))?;
                            }
                        }
                        Directive::To { pe, cmd } => ep.post(pe, Envelope::Command(cmd))?,
                        Directive::Finished(r) => report = Some(r),
                    }
                }
            }
        }
    }
    log::debug!("[pe {rank}] finished");
    Ok(report)
}

fn execute<C, F>(ep: &mut Endpoint<'_, C>, actions: Vec<Action>, factory: &mut F) -> Result<(), PipelineError>
where
    C: Communicator + ?Sized,
    F: WorkUnitFactory,
{
    for action in actions {
        match action {
            Action::Send { to, msg } => ep.post(to, Envelope::Peer(msg))?,
            Action::Contribute(c) => ep.post(HOST, Envelope::Contribution(c))?,
            Action::Instantiate(unit) => factory.instantiate(unit),
            Action::Bounds { pe, lower, upper } => factory.bounds(pe, lower, upper),
        }
    }
    Ok(())
}

//! Thin façade over intra-process (threads) or inter-process (MPI) message passing.
//!
//! Messages are whole byte buffers addressed to a peer rank. Receives are
//! "any source": the partitioning protocol never waits on a particular peer,
//! it reacts to whatever arrives next.

use bytes::Bytes;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CommError {
    #[error("Peer rank {peer} out of range for communicator of size {size}")]
    PeerOutOfRange { peer: usize, size: usize },
    #[error("Communication backend failure: {0}")]
    Backend(String),
}

/// Point-to-point message passing between the ranks of a fixed group.
pub trait Communicator {
    /// Rank of this endpoint.
    fn rank(&self) -> usize;
    /// Number of ranks in the group.
    fn size(&self) -> usize;
    /// Queue `buf` for delivery to `peer`.
    fn send(&self, peer: usize, buf: Bytes) -> Result<(), CommError>;
    /// Next message from any peer, if one is waiting.
    fn try_recv(&self) -> Result<Option<(usize, Bytes)>, CommError>;
    /// Next message from any peer, blocking until one arrives.
    fn recv(&self) -> Result<(usize, Bytes), CommError>;
}

/// Single-rank communicator: sends to rank 0 loop back.
#[derive(Debug, Default)]
pub struct NoComm {
    loopback: Mutex<VecDeque<Bytes>>,
}

impl NoComm {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Communicator for NoComm {
    fn rank(&self) -> usize {
        0
    }
    fn size(&self) -> usize {
        1
    }
    fn send(&self, peer: usize, buf: Bytes) -> Result<(), CommError> {
        if peer != 0 {
            return Err(CommError::PeerOutOfRange { peer, size: 1 });
        }
        self.loopback.lock().push_back(buf);
        Ok(())
    }
    fn try_recv(&self) -> Result<Option<(usize, Bytes)>, CommError> {
        Ok(self.loopback.lock().pop_front().map(|b| (0, b)))
    }
    fn recv(&self) -> Result<(usize, Bytes), CommError> {
        // nobody else can ever send
        self.try_recv()?
            .ok_or_else(|| CommError::Backend("recv on empty single-rank communicator".into()))
    }
}

// --- ThreadComm: intra-process, one thread per rank ---

#[derive(Debug, Default)]
struct Mailbox {
    queue: Mutex<VecDeque<(usize, Bytes)>>,
    ready: Condvar,
}

/// In-process communicator; every rank owns a mailbox guarded by a mutex and
/// a condition variable.
#[derive(Debug, Clone)]
pub struct ThreadComm {
    rank: usize,
    mailboxes: Arc<Vec<Mailbox>>,
}

impl ThreadComm {
    /// Create `size` connected endpoints, one per rank.
    pub fn universe(size: usize) -> Vec<ThreadComm> {
        let mailboxes: Arc<Vec<Mailbox>> =
            Arc::new((0..size).map(|_| Mailbox::default()).collect());
        (0..size)
            .map(|rank| ThreadComm {
                rank,
                mailboxes: Arc::clone(&mailboxes),
            })
            .collect()
    }
}

impl Communicator for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }
    fn size(&self) -> usize {
        self.mailboxes.len()
    }
    fn send(&self, peer: usize, buf: Bytes) -> Result<(), CommError> {
        let mb = self.mailboxes.get(peer).ok_or(CommError::PeerOutOfRange {
            peer,
            size: self.mailboxes.len(),
        })?;
        mb.queue.lock().push_back((self.rank, buf));
        mb.ready.notify_one();
        Ok(())
    }
    fn try_recv(&self) -> Result<Option<(usize, Bytes)>, CommError> {
        Ok(self.mailboxes[self.rank].queue.lock().pop_front())
    }
    fn recv(&self) -> Result<(usize, Bytes), CommError> {
        let mb = &self.mailboxes[self.rank];
        let mut queue = mb.queue.lock();
        loop {
            if let Some(msg) = queue.pop_front() {
                return Ok(msg);
            }
            mb.ready.wait(&mut queue);
        }
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::*;
    use mpi::topology::SimpleCommunicator;
    use mpi::traits::{Communicator as _, Destination, Source};

    const TAG: mpi::Tag = 0x5041;

    /// MPI communicator over a `SimpleCommunicator`, usually the world.
    ///
    /// Sends are standard-mode blocking sends; the receiver side always
    /// drains its queue, so they complete as long as every rank keeps
    /// receiving.
    pub struct MpiComm {
        world: SimpleCommunicator,
        rank: usize,
        size: usize,
    }

    impl MpiComm {
        pub fn new(world: SimpleCommunicator) -> Self {
            let rank = world.rank() as usize;
            let size = world.size() as usize;
            Self { world, rank, size }
        }
    }

    impl Communicator for MpiComm {
        fn rank(&self) -> usize {
            self.rank
        }
        fn size(&self) -> usize {
            self.size
        }
        fn send(&self, peer: usize, buf: Bytes) -> Result<(), CommError> {
            if peer >= self.size {
                return Err(CommError::PeerOutOfRange {
                    peer,
                    size: self.size,
                });
            }
            self.world
                .process_at_rank(peer as i32)
                .send_with_tag(&buf[..], TAG);
            Ok(())
        }
        fn try_recv(&self) -> Result<Option<(usize, Bytes)>, CommError> {
            Ok(self
                .world
                .any_process()
                .immediate_matched_probe_with_tag(TAG)
                .map(|(msg, _)| {
                    let (data, status) = msg.matched_receive_vec::<u8>();
                    (status.source_rank() as usize, Bytes::from(data))
                }))
        }
        fn recv(&self) -> Result<(usize, Bytes), CommError> {
            let (data, status) = self.world.any_process().receive_vec_with_tag::<u8>(TAG);
            Ok((status.source_rank() as usize, Bytes::from(data)))
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;

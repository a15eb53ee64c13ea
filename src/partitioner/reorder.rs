//! Per-PE state of the distributed node renumbering.
//!
//! A PE numbers the old ids it owns, i.e. the ids of its candidate set that
//! appear in none of its comm-map entries, and asks the owners of the rest.
//! Requests from peers may arrive before the PE has numbered its own nodes:
//! they wait in an inbox that [`Renumbering::flush`] drains once the PE's own
//! assignment exists. Flushing is idempotent and never drops a request.

use hashbrown::{HashMap, HashSet};
use std::collections::{BTreeMap, VecDeque};

type Reply = (usize, Vec<(u64, u64)>);

#[derive(Debug, Clone, Default)]
pub struct Renumbering {
    /// Sorted, unique old ids used by this PE's work units.
    ids: Vec<u64>,
    /// Peer → old ids that peer numbers for us.
    comm: BTreeMap<usize, Vec<u64>>,
    /// Old → new id, own and resolved.
    newid: HashMap<u64, u64>,
    start: u64,
    block_end: u64,
    assigned: bool,
    inbox: VecDeque<(usize, Vec<u64>)>,
}

impl Renumbering {
    pub fn new(ids: Vec<u64>) -> Self {
        Self {
            ids,
            ..Default::default()
        }
    }

    /// Candidate set.
    pub fn ids(&self) -> &[u64] {
        &self.ids
    }

    /// Number own ids from `start` up, in ascending old-id order. Returns the
    /// requests to send, one per peer.
    pub fn begin(
        &mut self,
        rank: usize,
        start: u64,
        mut comm: BTreeMap<usize, Vec<u64>>,
    ) -> Result<Vec<(usize, Vec<u64>)>, String> {
        if self.assigned {
            return Err("reorder started twice".into());
        }
        for (&peer, list) in comm.iter_mut() {
            if peer == rank {
                return Err("comm map lists the PE itself".into());
            }
            list.sort_unstable();
            list.dedup();
            if let Some(x) = list.iter().find(|x| self.ids.binary_search(x).is_err()) {
                return Err(format!("comm map entry of PE {peer} holds unknown node {x}"));
            }
        }
        comm.retain(|_, list| !list.is_empty());

        let foreign: HashSet<u64> = comm.values().flatten().copied().collect();
        let mut next = start;
        for &x in self.ids.iter().filter(|x| !foreign.contains(*x)) {
            self.newid.insert(x, next);
            next += 1;
        }
        self.start = start;
        self.block_end = next;
        self.assigned = true;

        let requests = comm.iter().map(|(&p, list)| (p, list.clone())).collect();
        self.comm = comm;
        Ok(requests)
    }

    /// Queue a peer's request.
    pub fn push_request(&mut self, from: usize, ids: Vec<u64>) {
        self.inbox.push_back((from, ids));
    }

    /// Answer every queued request, if own ids are numbered.
    pub fn flush(&mut self) -> Result<Vec<Reply>, String> {
        if !self.assigned {
            return Ok(Vec::new());
        }
        let mut replies = Vec::with_capacity(self.inbox.len());
        while let Some((from, ids)) = self.inbox.pop_front() {
            let pairs = ids
                .iter()
                .map(|&x| match self.newid.get(&x) {
                    Some(&n) if (self.start..self.block_end).contains(&n) => Ok((x, n)),
                    _ => Err(format!("PE {from} requested node {x}, which is not numbered here")),
                })
                .collect::<Result<Vec<_>, _>>()?;
            replies.push((from, pairs));
        }
        Ok(replies)
    }

    /// Record the new ids a peer assigned.
    pub fn resolve(&mut self, from: usize, pairs: Vec<(u64, u64)>) -> Result<(), String> {
        let requested = self
            .comm
            .get(&from)
            .ok_or_else(|| format!("unsolicited new ids from PE {from}"))?;
        for (old, new) in pairs {
            if requested.binary_search(&old).is_err() {
                return Err(format!("PE {from} numbered node {old}, which was not requested"));
            }
            if self.newid.insert(old, new).is_some() {
                return Err(format!("node {old} assigned a new id twice"));
            }
        }
        Ok(())
    }

    /// All candidate ids have a new id.
    pub fn is_complete(&self) -> bool {
        self.assigned && self.newid.len() == self.ids.len()
    }

    pub fn new_id(&self, old: u64) -> Option<u64> {
        self.newid.get(&old).copied()
    }

    /// Old → new assignments known so far.
    pub fn assignments(&self) -> &HashMap<u64, u64> {
        &self.newid
    }

    /// One past the last id this PE numbered.
    pub fn block_end(&self) -> u64 {
        self.block_end
    }

    pub fn pending_requests(&self) -> usize {
        self.inbox.len()
    }
}

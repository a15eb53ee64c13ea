//! Fixed, versioned, little-endian wire format for the partitioning protocol.
//!
//! Every message is an 8-byte [`WireHdr`] followed by a payload of
//! little-endian `u64` words. Reals travel as their IEEE-754 bits. Variable
//! length lists are prefixed by their word count, text by its byte count and
//! zero-padded to a whole word.

use crate::mesh::Centroids;
use crate::partitioner::message::{Command, Contribution, ElementSlice, PeerMessage};
use bytemuck::{Pod, Zeroable};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use static_assertions::const_assert_eq;
use std::collections::BTreeMap;
use std::mem::size_of;
use thiserror::Error;

/// Bump when the layout or semantics change in incompatible ways.
pub const WIRE_VERSION: u16 = 2;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum WireError {
    #[error("Message of {len} bytes is truncated or not word aligned")]
    Truncated { len: usize },
    #[error("Wire version {found} does not match {expected}")]
    VersionMismatch { found: u16, expected: u16 },
    #[error("Unknown message kind {0}")]
    UnknownKind(u16),
    #[error("{0} trailing bytes after message payload")]
    Trailing(usize),
    #[error("Invalid option flag {0}")]
    InvalidFlag(u64),
}

/// Anything that travels between ranks.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    Peer(PeerMessage),
    Command(Command),
    Contribution(Contribution),
    /// Rank `from` hit a fatal error; every receiver stops.
    Abort { user: bool, reason: String },
}

mod kind {
    pub const ADD: u16 = 1;
    pub const ACK: u16 = 2;
    pub const REQUEST: u16 = 3;
    pub const NEWORDER: u16 = 4;
    pub const LOWER: u16 = 5;

    pub const PARTITION: u16 = 16;
    pub const FLATTEN: u16 = 17;
    pub const REORDER: u16 = 18;
    pub const STDCOST_AVG: u16 = 19;

    pub const LOAD: u16 = 32;
    pub const SETUP: u16 = 33;
    pub const DISTRIBUTED: u16 = 34;
    pub const FLATTENED: u16 = 35;
    pub const NODES: u16 = 36;
    pub const AVGCOST: u16 = 37;
    pub const STDCOST: u16 = 38;
    pub const ELEMENTS: u16 = 39;

    pub const ABORT: u16 = 48;
}

/// All multi-byte integers in the header are **little-endian** on the wire.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireHdr {
    pub version_le: u16, // = WIRE_VERSION.to_le()
    pub kind_le: u16,
    pub from_le: u32, // sender rank
}

const_assert_eq!(size_of::<WireHdr>(), 8);

impl WireHdr {
    pub fn new(kind: u16, from: usize) -> Self {
        Self {
            version_le: WIRE_VERSION.to_le(),
            kind_le: kind.to_le(),
            from_le: (from as u32).to_le(),
        }
    }
    pub fn kind(&self) -> u16 {
        u16::from_le(self.kind_le)
    }
    pub fn version(&self) -> u16 {
        u16::from_le(self.version_le)
    }
    pub fn from(&self) -> usize {
        u32::from_le(self.from_le) as usize
    }
}

fn put_list(buf: &mut BytesMut, ids: &[u64]) {
    buf.put_u64_le(ids.len() as u64);
    for &id in ids {
        buf.put_u64_le(id);
    }
}

fn put_reals(buf: &mut BytesMut, xs: &[f64]) {
    buf.put_u64_le(xs.len() as u64);
    for &x in xs {
        buf.put_u64_le(x.to_bits());
    }
}

fn put_text(buf: &mut BytesMut, text: &str) {
    buf.put_u64_le(text.len() as u64);
    buf.put_slice(text.as_bytes());
    buf.put_bytes(0, (8 - text.len() % 8) % 8);
}

fn put_map(buf: &mut BytesMut, map: &BTreeMap<usize, Vec<u64>>) {
    buf.put_u64_le(map.len() as u64);
    for (&k, ids) in map {
        buf.put_u64_le(k as u64);
        put_list(buf, ids);
    }
}

/// Serialize `env`, sent by rank `from`.
pub fn encode(from: usize, env: &Envelope) -> Bytes {
    let mut body = BytesMut::new();
    let kind = match env {
        Envelope::Peer(m) => match m {
            PeerMessage::Add { chares } => {
                put_map(&mut body, chares);
                kind::ADD
            }
            PeerMessage::Ack => kind::ACK,
            PeerMessage::Request { ids } => {
                put_list(&mut body, ids);
                kind::REQUEST
            }
            PeerMessage::NewOrder { pairs } => {
                body.put_u64_le(pairs.len() as u64);
                for &(old, new) in pairs {
                    body.put_u64_le(old);
                    body.put_u64_le(new);
                }
                kind::NEWORDER
            }
            PeerMessage::Lower(v) => {
                body.put_u64_le(*v);
                kind::LOWER
            }
        },
        Envelope::Command(c) => match c {
            Command::Partition { nchare, che } => {
                body.put_u64_le(*nchare as u64);
                body.put_u64_le(che.len() as u64);
                for &c in che {
                    body.put_u64_le(c as u64);
                }
                kind::PARTITION
            }
            Command::Flatten => kind::FLATTEN,
            Command::Reorder { start, comm } => {
                body.put_u64_le(*start);
                put_map(&mut body, comm);
                kind::REORDER
            }
            Command::StdCost { avg } => {
                body.put_u64_le(avg.to_bits());
                kind::STDCOST_AVG
            }
        },
        Envelope::Contribution(c) => match c {
            Contribution::Load(n) => {
                body.put_u64_le(*n);
                kind::LOAD
            }
            Contribution::SetupComplete => kind::SETUP,
            Contribution::Elements(slice) => {
                body.put_u64_le(slice.first);
                put_list(&mut body, &slice.connectivity);
                match &slice.centroids {
                    None => body.put_u64_le(0),
                    Some(c) => {
                        body.put_u64_le(1);
                        for axis in &c.coords {
                            put_reals(&mut body, axis);
                        }
                    }
                }
                kind::ELEMENTS
            }
            Contribution::DistributionComplete => kind::DISTRIBUTED,
            Contribution::FlattenComplete => kind::FLATTENED,
            Contribution::Nodes(ids) => {
                put_list(&mut body, ids);
                kind::NODES
            }
            Contribution::AvgCost(x) => {
                body.put_u64_le(x.to_bits());
                kind::AVGCOST
            }
            Contribution::StdCost(x) => {
                body.put_u64_le(x.to_bits());
                kind::STDCOST
            }
        },
        Envelope::Abort { user, reason } => {
            body.put_u64_le(u64::from(*user));
            put_text(&mut body, reason);
            kind::ABORT
        }
    };
    let mut out = BytesMut::with_capacity(size_of::<WireHdr>() + body.len());
    out.put_slice(bytemuck::bytes_of(&WireHdr::new(kind, from)));
    out.put(body);
    out.freeze()
}

/// Cursor over the payload words.
struct Words<'a> {
    buf: &'a [u8],
    len: usize,
}

impl Words<'_> {
    fn word(&mut self) -> Result<u64, WireError> {
        if self.buf.remaining() < 8 {
            return Err(WireError::Truncated { len: self.len });
        }
        Ok(self.buf.get_u64_le())
    }

    fn count(&mut self) -> Result<usize, WireError> {
        let n = self.word()? as usize;
        // every counted item is at least one word
        if n > self.buf.remaining() / 8 {
            return Err(WireError::Truncated { len: self.len });
        }
        Ok(n)
    }

    fn list(&mut self) -> Result<Vec<u64>, WireError> {
        let n = self.count()?;
        (0..n).map(|_| self.word()).collect()
    }

    fn reals(&mut self) -> Result<Vec<f64>, WireError> {
        Ok(self.list()?.into_iter().map(f64::from_bits).collect())
    }

    fn flag(&mut self) -> Result<bool, WireError> {
        match self.word()? {
            0 => Ok(false),
            1 => Ok(true),
            f => Err(WireError::InvalidFlag(f)),
        }
    }

    fn text(&mut self) -> Result<String, WireError> {
        let n = self.word()? as usize;
        if n > self.buf.remaining() || n.div_ceil(8) * 8 > self.buf.remaining() {
            return Err(WireError::Truncated { len: self.len });
        }
        let text = String::from_utf8_lossy(&self.buf[..n]).into_owned();
        self.buf.advance(n.div_ceil(8) * 8);
        Ok(text)
    }

    fn elements(&mut self) -> Result<ElementSlice, WireError> {
        let first = self.word()?;
        let connectivity = self.list()?;
        let centroids = if self.flag()? {
            Some(Centroids {
                coords: [self.reals()?, self.reals()?, self.reals()?],
            })
        } else {
            None
        };
        Ok(ElementSlice {
            first,
            connectivity,
            centroids,
        })
    }

    fn map(&mut self) -> Result<BTreeMap<usize, Vec<u64>>, WireError> {
        let n = self.count()?;
        (0..n)
            .map(|_| Ok::<_, WireError>((self.word()? as usize, self.list()?)))
            .collect()
    }

    fn finish<T>(self, value: T) -> Result<T, WireError> {
        match self.buf.remaining() {
            0 => Ok(value),
            n => Err(WireError::Trailing(n)),
        }
    }
}

/// Parse a message; returns the sender rank and the envelope.
pub fn decode(buf: &[u8]) -> Result<(usize, Envelope), WireError> {
    const HDR: usize = size_of::<WireHdr>();
    if buf.len() < HDR || (buf.len() - HDR) % 8 != 0 {
        return Err(WireError::Truncated { len: buf.len() });
    }
    let hdr: WireHdr = bytemuck::pod_read_unaligned(&buf[..HDR]);
    if hdr.version() != WIRE_VERSION {
        return Err(WireError::VersionMismatch {
            found: hdr.version(),
            expected: WIRE_VERSION,
        });
    }
    let mut w = Words {
        buf: &buf[HDR..],
        len: buf.len(),
    };
    let env = match hdr.kind() {
        kind::ADD => Envelope::Peer(PeerMessage::Add { chares: w.map()? }),
        kind::ACK => Envelope::Peer(PeerMessage::Ack),
        kind::REQUEST => Envelope::Peer(PeerMessage::Request { ids: w.list()? }),
        kind::NEWORDER => {
            let n = w.count()?;
            let pairs = (0..n)
                .map(|_| Ok((w.word()?, w.word()?)))
                .collect::<Result<_, WireError>>()?;
            Envelope::Peer(PeerMessage::NewOrder { pairs })
        }
        kind::LOWER => Envelope::Peer(PeerMessage::Lower(w.word()?)),
        kind::PARTITION => Envelope::Command(Command::Partition {
            nchare: w.word()? as usize,
            che: w.list()?.into_iter().map(|c| c as usize).collect(),
        }),
        kind::FLATTEN => Envelope::Command(Command::Flatten),
        kind::REORDER => Envelope::Command(Command::Reorder {
            start: w.word()?,
            comm: w.map()?,
        }),
        kind::STDCOST_AVG => Envelope::Command(Command::StdCost {
            avg: f64::from_bits(w.word()?),
        }),
        kind::LOAD => Envelope::Contribution(Contribution::Load(w.word()?)),
        kind::SETUP => Envelope::Contribution(Contribution::SetupComplete),
        kind::ELEMENTS => Envelope::Contribution(Contribution::Elements(w.elements()?)),
        kind::DISTRIBUTED => Envelope::Contribution(Contribution::DistributionComplete),
        kind::FLATTENED => Envelope::Contribution(Contribution::FlattenComplete),
        kind::NODES => Envelope::Contribution(Contribution::Nodes(w.list()?)),
        kind::AVGCOST => Envelope::Contribution(Contribution::AvgCost(f64::from_bits(w.word()?))),
        kind::STDCOST => Envelope::Contribution(Contribution::StdCost(f64::from_bits(w.word()?))),
        kind::ABORT => Envelope::Abort {
            user: w.flag()?,
            reason: w.text()?,
        },
        other => return Err(WireError::UnknownKind(other)),
    };
    w.finish((hdr.from(), env))
}

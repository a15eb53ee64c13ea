//! PipelineError: the error taxonomy of the partitioning pipeline.
//!
//! Two classes matter to callers. *User errors* come from parameters the user
//! chose (too many work units for the mesh, invalid configuration) and carry
//! remediation text. Everything else is either a collaborator failure
//! (mesh reader, graph partitioner, transport) or an internal-consistency
//! violation that signals a protocol bug.

use crate::algs::communicator::CommError;
use crate::algs::wire::WireError;
use crate::mesh_error::MeshError;
use crate::partitioning::error::PartitionError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Internal invariant broken on PE `pe`.
    #[error("PE {pe}: internal consistency violation: {reason}")]
    Internal { pe: usize, reason: String },

    /// A work unit owned by PE `pe` received no elements.
    #[error(
        "PE {pe}: work unit {chare} of {nchare} has no mesh elements on {npes} PE(s); \
         the mesh is overdecomposed, decrease the degree of virtualization or the number of PEs"
    )]
    Overdecomposition {
        pe: usize,
        chare: usize,
        nchare: usize,
        npes: usize,
    },

    /// Fewer work units than PEs: some PE would own nothing.
    #[error(
        "{nchare} work unit(s) requested for {npes} PEs; \
         increase the degree of virtualization or decrease the number of PEs"
    )]
    TooFewWorkUnits { nchare: usize, npes: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Another rank failed with `reason` and stopped the run.
    #[error("Run aborted by PE {pe}: {reason}")]
    Aborted { pe: usize, user: bool, reason: String },

    /// The scheduler ran out of events before the run finished.
    #[error("Pipeline stalled with {undelivered} PE(s) unfinished")]
    Stalled { undelivered: usize },

    #[error(transparent)]
    Mesh(#[from] MeshError),
    #[error(transparent)]
    Partition(#[from] PartitionError),
    #[error(transparent)]
    Comm(#[from] CommError),
    #[error(transparent)]
    Wire(#[from] WireError),
}

impl PipelineError {
    /// Shorthand for [`PipelineError::Internal`].
    pub fn internal(pe: usize, reason: impl Into<String>) -> Self {
        Self::Internal {
            pe,
            reason: reason.into(),
        }
    }

    /// True for errors caused by user-chosen parameters rather than bugs or
    /// collaborator failures.
    pub fn is_user_error(&self) -> bool {
        match self {
            Self::Overdecomposition { .. } | Self::TooFewWorkUnits { .. } | Self::InvalidConfig(_) => true,
            Self::Aborted { user, .. } => *user,
            _ => false,
        }
    }
}

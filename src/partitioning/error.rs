//! Partitioning errors for the graph partitioners

use thiserror::Error;

/// Errors from the element-to-work-unit partitioners
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PartitionError {
    /// A geometric algorithm was called without element centroids
    #[error("{0} partitioning needs element centroids")]
    MissingCentroids(&'static str),
    /// Zero parts requested
    #[error("Cannot partition into zero parts")]
    NoParts,
    /// Input arrays disagree with each other
    #[error("Invalid partitioner input: {0}")]
    InvalidInput(String),
    /// The algorithm is not compiled into this build
    #[error("Partitioning algorithm {0} is not available; rebuild with the `{1}` feature")]
    Unsupported(&'static str, &'static str),
    /// Other errors (e.g. METIS wrapper failures)
    #[error("Partitioner error: {0}")]
    Other(String),
}

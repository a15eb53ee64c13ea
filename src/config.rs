//! Partitioner configuration.

use crate::partitioning::{Block, GraphPartitioner, Greedy, Hsfc, Metis, Rcb, Rib};
use crate::pipeline_error::PipelineError;
use serde::{Deserialize, Serialize};

/// Graph partitioning algorithm used to map elements to work units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartitioningAlgorithm {
    /// Recursive coordinate bisection.
    #[default]
    Rcb,
    /// Recursive inertial bisection.
    Rib,
    /// Hilbert space-filling curve.
    Hsfc,
    /// Contiguous runs in global element order.
    Block,
    /// Breadth-first graph growing on the element dual graph.
    Greedy,
    /// k-way METIS on the element dual graph.
    Metis,
}

impl PartitioningAlgorithm {
    /// Whether the algorithm works on element centroids, in which case PEs
    /// compute them before the setup barrier.
    pub fn is_geometric(self) -> bool {
        matches!(self, Self::Rcb | Self::Rib | Self::Hsfc)
    }

    /// Instantiate the partitioner.
    pub fn partitioner(self) -> Box<dyn GraphPartitioner + Send> {
        match self {
            Self::Rcb => Box::new(Rcb),
            Self::Rib => Box::new(Rib),
            Self::Hsfc => Box::new(Hsfc),
            Self::Block => Box::new(Block),
            Self::Greedy => Box::new(Greedy),
            Self::Metis => Box::new(Metis),
        }
    }
}

/// Knobs of one partitioning run. Every PE and the host must use the same
/// configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitionerConfig {
    pub algorithm: PartitioningAlgorithm,
    /// Degree of virtualization in `[0, 1]`: 0 asks for about one work unit
    /// per PE, 1 for one work unit per element.
    pub virtualization: f64,
    /// Explicit number of work units; overrides `virtualization`.
    pub nchare: Option<usize>,
}

impl Default for PartitionerConfig {
    fn default() -> Self {
        Self {
            algorithm: PartitioningAlgorithm::Rcb,
            virtualization: 0.0,
            nchare: None,
        }
    }
}

impl PartitionerConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !(0.0..=1.0).contains(&self.virtualization) {
            return Err(PipelineError::InvalidConfig(format!(
                "virtualization must be in [0, 1], got {}",
                self.virtualization
            )));
        }
        if self.nchare == Some(0) {
            return Err(PipelineError::InvalidConfig(
                "number of work units must be positive".into(),
            ));
        }
        Ok(())
    }
}

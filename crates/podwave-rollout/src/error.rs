//! Workload-local hard failures.

use thiserror::Error;

use podwave_cluster::ClusterError;
use podwave_health::ValidationError;

/// A failure that ends one workload's remaining phases within its wave.
///
/// Sibling workloads and later waves are unaffected.
#[derive(Debug, Error)]
pub enum WorkloadError {
    #[error("failed to read state of {workload}: {source}")]
    ReadFailure {
        workload: String,
        #[source]
        source: ClusterError,
    },

    #[error("scaling {workload} to {replicas} replicas was rejected: {source}")]
    ScaleRequestFailure {
        workload: String,
        replicas: u32,
        #[source]
        source: ClusterError,
    },

    #[error("no running pods found for {workload} (selector {selector})")]
    NoPodsFound { workload: String, selector: String },

    #[error("{workload}: task aborted: {reason}")]
    Aborted { workload: String, reason: String },
}

impl WorkloadError {
    pub fn workload(&self) -> &str {
        match self {
            WorkloadError::ReadFailure { workload, .. }
            | WorkloadError::ScaleRequestFailure { workload, .. }
            | WorkloadError::NoPodsFound { workload, .. }
            | WorkloadError::Aborted { workload, .. } => workload,
        }
    }

    pub(crate) fn from_validation(workload: &str, err: ValidationError) -> Self {
        match err {
            ValidationError::NoPodsFound { selector } => WorkloadError::NoPodsFound {
                workload: workload.to_string(),
                selector,
            },
            ValidationError::PodDiscovery { source, .. } => WorkloadError::ReadFailure {
                workload: workload.to_string(),
                source,
            },
        }
    }
}

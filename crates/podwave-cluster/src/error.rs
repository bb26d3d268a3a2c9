//! Orchestrator client error types.

use thiserror::Error;

/// Result type alias for control-plane calls.
pub type ClusterResult<T> = Result<T, ClusterError>;

/// Errors returned by a [`ClusterClient`](crate::ClusterClient).
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("workload not found: {0}")]
    NotFound(String),

    #[error("request rejected by control plane: {0}")]
    Rejected(String),

    #[error("control plane unreachable: {0}")]
    Unavailable(String),

    #[error("failed to build client: {0}")]
    Client(String),
}

impl From<kube::Error> for ClusterError {
    fn from(e: kube::Error) -> Self {
        match e {
            kube::Error::Api(resp) if resp.code == 404 => ClusterError::NotFound(resp.message),
            kube::Error::Api(resp) => {
                ClusterError::Rejected(format!("{} ({})", resp.message, resp.code))
            }
            other => ClusterError::Unavailable(other.to_string()),
        }
    }
}

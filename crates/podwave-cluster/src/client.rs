//! The control-plane contract used by the rollout engine.

use std::future::Future;
use std::pin::Pin;

use podwave_core::{PodRef, Selector};

use crate::error::ClusterResult;

/// Boxed future alias for client calls.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Orchestrator-reported readiness of a workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RolloutStatus {
    /// Replicas that passed the orchestrator's own readiness checks.
    pub ready_replicas: u32,
}

/// Operations the rollout engine performs against the cluster.
///
/// Implementations must be cheap to share: the wave executor hands one
/// `Arc<dyn ClusterClient>` to every per-workload task.
pub trait ClusterClient: Send + Sync {
    /// Current desired replica count of `workload`.
    fn replica_count<'a>(&'a self, workload: &'a str) -> BoxFuture<'a, ClusterResult<u32>>;

    /// Request `workload` be scaled to `replicas`.
    fn set_replica_count<'a>(
        &'a self,
        workload: &'a str,
        replicas: u32,
    ) -> BoxFuture<'a, ClusterResult<()>>;

    /// Orchestrator-level rollout status of `workload`.
    fn rollout_status<'a>(&'a self, workload: &'a str) -> BoxFuture<'a, ClusterResult<RolloutStatus>>;

    /// Running pods with an assigned address matching `selector`.
    fn running_pods<'a>(&'a self, selector: &'a Selector) -> BoxFuture<'a, ClusterResult<Vec<PodRef>>>;
}

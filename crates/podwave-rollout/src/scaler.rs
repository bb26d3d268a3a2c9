//! Scaling controller: raises one workload's replicas in bounded steps.
//!
//! ```text
//! current = read replicas
//! while current < target:
//!     next = min(current + step, target)
//!     set replicas = next
//!     if next < target: sleep(interval)
//!     current = read replicas
//! ```
//!
//! A workload already at (or above) its target issues no requests, so
//! re-running a rollout after a restart is harmless.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use podwave_cluster::ClusterClient;

use crate::error::WorkloadError;

/// What the controller did to one workload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaleSummary {
    /// Replica count read before the first request.
    pub from: u32,
    pub target: u32,
    /// Every replica count requested, in order.
    pub requests: Vec<u32>,
}

impl ScaleSummary {
    /// The last replica count requested, or the starting count.
    pub fn reached(&self) -> u32 {
        self.requests.last().copied().unwrap_or(self.from)
    }
}

/// Drives replica counts towards their targets through a [`ClusterClient`].
#[derive(Clone)]
pub struct ScalingController {
    cluster: Arc<dyn ClusterClient>,
}

impl ScalingController {
    pub fn new(cluster: Arc<dyn ClusterClient>) -> Self {
        Self { cluster }
    }

    /// Scale `workload` up to `target`, `step` replicas at a time, pausing
    /// `interval` between increments.
    pub async fn scale(
        &self,
        workload: &str,
        target: u32,
        step: u32,
        interval: Duration,
    ) -> Result<ScaleSummary, WorkloadError> {
        let step = step.max(1);
        let from = self.read(workload).await?;
        let mut summary = ScaleSummary {
            from,
            target,
            requests: Vec::new(),
        };

        if from >= target {
            info!(%workload, replicas = from, target, "already at target, nothing to scale");
            return Ok(summary);
        }

        let mut current = from;
        while current < target {
            let next = next_replicas(current, target, step);
            self.cluster
                .set_replica_count(workload, next)
                .await
                .map_err(|source| WorkloadError::ScaleRequestFailure {
                    workload: workload.to_string(),
                    replicas: next,
                    source,
                })?;
            summary.requests.push(next);
            info!(%workload, replicas = next, target, "scaled");

            if next >= target {
                break;
            }
            debug!(%workload, pause = ?interval, "pausing before next increment");
            tokio::time::sleep(interval).await;
            current = self.read(workload).await?;
        }

        Ok(summary)
    }

    async fn read(&self, workload: &str) -> Result<u32, WorkloadError> {
        self.cluster
            .replica_count(workload)
            .await
            .map_err(|source| WorkloadError::ReadFailure {
                workload: workload.to_string(),
                source,
            })
    }
}

/// One increment: `min(current + step, target)`.
pub fn next_replicas(current: u32, target: u32, step: u32) -> u32 {
    current.saturating_add(step).min(target)
}

/// The replica counts the controller would request going from `from`
/// to `target`. Empty when `from >= target`.
pub fn planned_sequence(from: u32, target: u32, step: u32) -> Vec<u32> {
    let step = step.max(1);
    let mut sequence = Vec::new();
    let mut current = from;
    while current < target {
        current = next_replicas(current, target, step);
        sequence.push(current);
    }
    sequence
}

#[cfg(test)]
mod tests {
    use super::*;

    use podwave_cluster::testing::FakeCluster;
    use tokio::time::Instant;

    fn controller(cluster: &Arc<FakeCluster>) -> ScalingController {
        ScalingController::new(cluster.clone())
    }

    #[tokio::test(start_paused = true)]
    async fn scales_in_steps_without_overshoot() {
        let cluster = Arc::new(FakeCluster::new().with_workload("api", 1));
        let summary = controller(&cluster)
            .scale("api", 8, 3, Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(summary.requests, vec![4, 7, 8]);
        assert_eq!(summary.reached(), 8);
        assert_eq!(cluster.scale_requests("api"), vec![4, 7, 8]);
        assert_eq!(cluster.replicas("api"), Some(8));
    }

    #[tokio::test(start_paused = true)]
    async fn request_count_is_ceil_of_distance_over_step() {
        for (current, target, step) in [(0, 10, 3), (2, 4, 2), (0, 1, 5), (5, 6, 1), (0, 12, 4)] {
            let cluster = Arc::new(FakeCluster::new().with_workload("api", current));
            controller(&cluster)
                .scale("api", target, step, Duration::ZERO)
                .await
                .unwrap();

            let requests = cluster.scale_requests("api");
            assert_eq!(
                requests.len() as u32,
                (target - current).div_ceil(step),
                "current={current} target={target} step={step}"
            );
            assert_eq!(requests.last(), Some(&target));
            assert!(requests.iter().all(|&r| r <= target));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn at_target_issues_no_requests() {
        let cluster = Arc::new(FakeCluster::new().with_workload("api", 5));
        let summary = controller(&cluster)
            .scale("api", 5, 2, Duration::from_secs(5))
            .await
            .unwrap();

        assert!(summary.requests.is_empty());
        assert_eq!(summary.reached(), 5);
        assert!(cluster.scale_requests("api").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn above_target_is_left_alone() {
        let cluster = Arc::new(FakeCluster::new().with_workload("api", 9));
        controller(&cluster)
            .scale("api", 5, 2, Duration::ZERO)
            .await
            .unwrap();
        assert!(cluster.scale_requests("api").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn pauses_only_between_increments() {
        let cluster = Arc::new(FakeCluster::new().with_workload("api", 0));
        let start = Instant::now();
        controller(&cluster)
            .scale("api", 6, 2, Duration::from_secs(30))
            .await
            .unwrap();

        // Three requests, two pauses.
        assert_eq!(start.elapsed(), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn read_failure_is_reported() {
        let cluster = Arc::new(FakeCluster::new().with_workload("api", 0).fail_reads("api"));
        let err = controller(&cluster)
            .scale("api", 4, 2, Duration::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkloadError::ReadFailure { .. }));
        assert_eq!(err.workload(), "api");
    }

    #[tokio::test(start_paused = true)]
    async fn missing_workload_is_read_failure() {
        let cluster = Arc::new(FakeCluster::new());
        let err = controller(&cluster)
            .scale("ghost", 4, 2, Duration::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkloadError::ReadFailure { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_scale_request_is_reported() {
        let cluster = Arc::new(FakeCluster::new().with_workload("api", 0).reject_scale("api"));
        let err = controller(&cluster)
            .scale("api", 4, 2, Duration::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WorkloadError::ScaleRequestFailure { replicas: 2, .. }
        ));
    }

    #[test]
    fn planned_sequence_matches_controller_arithmetic() {
        assert_eq!(planned_sequence(0, 4, 2), vec![2, 4]);
        assert_eq!(planned_sequence(0, 6, 3), vec![3, 6]);
        assert_eq!(planned_sequence(0, 5, 5), vec![5]);
        assert_eq!(planned_sequence(1, 8, 3), vec![4, 7, 8]);
        assert!(planned_sequence(4, 4, 1).is_empty());
    }

    #[test]
    fn next_replicas_saturates() {
        assert_eq!(next_replicas(u32::MAX - 1, u32::MAX, 10), u32::MAX);
        assert_eq!(next_replicas(3, 10, 4), 7);
    }
}

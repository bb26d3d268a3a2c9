//! Rollout waiter: blocks until the orchestrator reports a workload ready.
//!
//! Expiry of the readiness timeout is not an error: the workload is
//! marked degraded and the wave moves on.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use podwave_cluster::ClusterClient;

/// Default interval between rollout status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// How a readiness wait ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// All target replicas reported ready.
    Ready { polls: u32 },
    /// The timeout expired first; the rollout proceeded anyway.
    TimedOut {
        polls: u32,
        /// Last successfully read ready count, if any poll succeeded.
        last_ready: Option<u32>,
        waited: Duration,
    },
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        matches!(self, Readiness::Ready { .. })
    }

    pub fn polls(&self) -> u32 {
        match self {
            Readiness::Ready { polls } | Readiness::TimedOut { polls, .. } => *polls,
        }
    }
}

/// Polls rollout status on a fixed interval.
#[derive(Clone)]
pub struct RolloutWaiter {
    cluster: Arc<dyn ClusterClient>,
    poll_interval: Duration,
}

impl RolloutWaiter {
    pub fn new(cluster: Arc<dyn ClusterClient>) -> Self {
        Self {
            cluster,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Wait until `workload` reports at least `target` ready replicas or
    /// `timeout` elapses. Never sleeps past the deadline.
    pub async fn wait(&self, workload: &str, target: u32, timeout: Duration) -> Readiness {
        let start = Instant::now();
        let deadline = start + timeout;
        let mut polls = 0;
        let mut last_ready = None;

        loop {
            polls += 1;
            match self.cluster.rollout_status(workload).await {
                Ok(status) if status.ready_replicas >= target => {
                    info!(%workload, ready = status.ready_replicas, target, polls, "rollout ready");
                    return Readiness::Ready { polls };
                }
                Ok(status) => {
                    last_ready = Some(status.ready_replicas);
                    debug!(%workload, ready = status.ready_replicas, target, "waiting for rollout");
                }
                Err(e) => {
                    // Transient; keep polling until the deadline.
                    debug!(%workload, error = %e, "rollout status poll failed");
                }
            }

            let now = Instant::now();
            if now >= deadline {
                break;
            }
            tokio::time::sleep_until((now + self.poll_interval).min(deadline)).await;
            if Instant::now() >= deadline {
                break;
            }
        }

        let waited = start.elapsed();
        warn!(
            %workload,
            ?timeout,
            ready = ?last_ready,
            target,
            "readiness timeout reached, proceeding anyway"
        );
        Readiness::TimedOut {
            polls,
            last_ready,
            waited,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use podwave_cluster::testing::FakeCluster;

    fn waiter(cluster: &Arc<FakeCluster>) -> RolloutWaiter {
        RolloutWaiter::new(cluster.clone()).with_poll_interval(Duration::from_secs(1))
    }

    #[tokio::test(start_paused = true)]
    async fn ready_on_first_poll() {
        let cluster = Arc::new(FakeCluster::new().with_workload("api", 4));
        let readiness = waiter(&cluster)
            .wait("api", 4, Duration::from_secs(30))
            .await;
        assert_eq!(readiness, Readiness::Ready { polls: 1 });
    }

    #[tokio::test(start_paused = true)]
    async fn ready_after_k_polls() {
        let cluster = Arc::new(
            FakeCluster::new()
                .with_workload("api", 4)
                .ready_after_polls("api", 4),
        );
        let start = Instant::now();
        let readiness = waiter(&cluster)
            .wait("api", 4, Duration::from_secs(30))
            .await;

        assert_eq!(readiness, Readiness::Ready { polls: 4 });
        assert_eq!(cluster.status_polls("api"), 4);
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_yields_two_polls_at_one_second_interval() {
        let cluster = Arc::new(FakeCluster::new().with_workload("api", 4).never_ready("api"));
        let start = Instant::now();
        let readiness = waiter(&cluster)
            .wait("api", 4, Duration::from_secs(2))
            .await;

        assert_eq!(
            readiness,
            Readiness::TimedOut {
                polls: 2,
                last_ready: Some(0),
                waited: Duration::from_secs(2),
            }
        );
        assert_eq!(cluster.status_polls("api"), 2);
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn never_overruns_timeout_by_more_than_one_interval() {
        let cluster = Arc::new(FakeCluster::new().with_workload("api", 4).never_ready("api"));
        let start = Instant::now();
        let readiness = RolloutWaiter::new(cluster.clone())
            .with_poll_interval(Duration::from_secs(4))
            .wait("api", 4, Duration::from_secs(10))
            .await;

        assert!(!readiness.is_ready());
        assert!(start.elapsed() <= Duration::from_secs(14));
        assert_eq!(start.elapsed(), Duration::from_secs(10));
        // Polls at 0s, 4s and 8s.
        assert_eq!(readiness.polls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_keep_polling() {
        let cluster = Arc::new(
            FakeCluster::new()
                .with_workload("api", 2)
                .failing_status_polls("api", 2),
        );
        let readiness = waiter(&cluster)
            .wait("api", 2, Duration::from_secs(30))
            .await;
        assert_eq!(readiness, Readiness::Ready { polls: 3 });
    }

    #[tokio::test(start_paused = true)]
    async fn zero_timeout_polls_once() {
        let cluster = Arc::new(FakeCluster::new().with_workload("api", 2).never_ready("api"));
        let readiness = waiter(&cluster).wait("api", 2, Duration::ZERO).await;
        assert_eq!(readiness.polls(), 1);
        assert!(!readiness.is_ready());
    }
}

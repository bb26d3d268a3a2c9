//! Wave executor: runs the three phases over every member of a wave.
//!
//! ```text
//! scale all members      ─┐
//!   (barrier)             │ hard failures drop out here
//! wait for all rollouts   │
//!   (barrier)             │
//! validate all members   ─┘
//! ```
//!
//! Each phase fans out over the members still in play and joins them all
//! before the next phase starts. A member that hard-fails skips its
//! remaining phases; siblings carry on.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{error, info, warn};

use podwave_cluster::ClusterClient;
use podwave_core::WorkloadSpec;
use podwave_health::{HealthValidator, Prober};

use crate::driver::RolloutPhase;
use crate::error::WorkloadError;
use crate::report::{WaveReport, WorkloadReport};
use crate::scaler::ScalingController;
use crate::waiter::RolloutWaiter;

/// How members of one wave are scheduled relative to each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Concurrency {
    /// One task per member, joined at the end of each phase.
    #[default]
    Concurrent,
    /// Members run one after another, in configuration order.
    Sequential,
}

/// Executes one wave at a time.
#[derive(Clone)]
pub struct WaveExecutor {
    scaler: ScalingController,
    waiter: RolloutWaiter,
    validator: HealthValidator,
    concurrency: Concurrency,
}

impl WaveExecutor {
    pub fn new(cluster: Arc<dyn ClusterClient>, prober: Arc<dyn Prober>) -> Self {
        Self {
            scaler: ScalingController::new(cluster.clone()),
            waiter: RolloutWaiter::new(cluster.clone()),
            validator: HealthValidator::new(cluster, prober),
            concurrency: Concurrency::default(),
        }
    }

    /// Interval between rollout status polls.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.waiter = self.waiter.with_poll_interval(interval);
        self
    }

    /// Pause between validation rounds.
    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.validator = self.validator.with_retry_interval(interval);
        self
    }

    pub fn with_concurrency(mut self, concurrency: Concurrency) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Run scaling, readiness and validation for every member of `wave`.
    ///
    /// Always returns a report for every member; failures are recorded,
    /// never propagated.
    pub async fn execute(
        &self,
        wave: u32,
        members: &[WorkloadSpec],
        phase: &watch::Sender<RolloutPhase>,
    ) -> WaveReport {
        let started = Instant::now();
        let mut reports: Vec<WorkloadReport> = members
            .iter()
            .map(|spec| WorkloadReport::new(&spec.name, wave))
            .collect();

        info!(wave, workloads = members.len(), "starting wave");

        // Scaling.
        phase.send_replace(RolloutPhase::Scaling { wave });
        let scaled = self
            .run_phase(live(members, &reports), |spec| {
                let scaler = self.scaler.clone();
                async move {
                    scaler
                        .scale(&spec.name, spec.max_replicas, spec.scale_step, spec.scale_interval)
                        .await
                }
            })
            .await;
        for (index, result) in scaled {
            match result {
                Ok(summary) => reports[index].scaling = Some(summary),
                Err(e) => record_failure(&mut reports[index], e),
            }
        }
        info!(wave, "wave scaling complete, waiting for readiness");

        // Readiness.
        phase.send_replace(RolloutPhase::Waiting { wave });
        let waited = self
            .run_phase(live(members, &reports), |spec| {
                let waiter = self.waiter.clone();
                async move {
                    Ok::<_, WorkloadError>(
                        waiter
                            .wait(&spec.name, spec.max_replicas, spec.readiness_timeout)
                            .await,
                    )
                }
            })
            .await;
        for (index, result) in waited {
            match result {
                Ok(readiness) => reports[index].readiness = Some(readiness),
                Err(e) => record_failure(&mut reports[index], e),
            }
        }
        info!(wave, "wave ready, proceeding to validation");

        // Validation.
        phase.send_replace(RolloutPhase::Validating { wave });
        let validated = self
            .run_phase(live(members, &reports), |spec| {
                let validator = self.validator.clone();
                async move {
                    validator
                        .validate(&spec.name, &spec.selector, &spec.validation, spec.max_retries)
                        .await
                        .map_err(|e| WorkloadError::from_validation(&spec.name, e))
                }
            })
            .await;
        for (index, result) in validated {
            match result {
                Ok(outcome) => reports[index].validation = Some(outcome),
                Err(e) => record_failure(&mut reports[index], e),
            }
        }

        let report = WaveReport {
            wave,
            started,
            finished: Instant::now(),
            workloads: reports,
        };
        info!(wave, elapsed = ?report.elapsed(), "wave complete");
        report
    }

    /// Run `task` for each `(index, spec)` and wait for all of them.
    ///
    /// Results come back tagged with the member index; order is
    /// unspecified.
    async fn run_phase<T, F, Fut>(
        &self,
        members: Vec<(usize, WorkloadSpec)>,
        task: F,
    ) -> Vec<(usize, Result<T, WorkloadError>)>
    where
        F: Fn(WorkloadSpec) -> Fut,
        Fut: Future<Output = Result<T, WorkloadError>> + Send + 'static,
        T: Send + 'static,
    {
        let mut results = Vec::with_capacity(members.len());

        match self.concurrency {
            Concurrency::Sequential => {
                for (index, spec) in members {
                    results.push((index, task(spec).await));
                }
            }
            Concurrency::Concurrent => {
                let mut set = JoinSet::new();
                let mut tasks = HashMap::new();
                for (index, spec) in members {
                    let name = spec.name.clone();
                    let fut = task(spec);
                    let handle = set.spawn(async move { (index, fut.await) });
                    tasks.insert(handle.id(), (index, name));
                }
                while let Some(joined) = set.join_next().await {
                    match joined {
                        Ok(result) => results.push(result),
                        Err(e) => {
                            let Some((index, name)) = tasks.remove(&e.id()) else {
                                error!(error = %e, "untracked wave task failed");
                                continue;
                            };
                            results.push((
                                index,
                                Err(WorkloadError::Aborted {
                                    workload: name,
                                    reason: e.to_string(),
                                }),
                            ));
                        }
                    }
                }
            }
        }

        results
    }
}

/// Members that have not hard-failed yet, tagged with their index.
fn live(members: &[WorkloadSpec], reports: &[WorkloadReport]) -> Vec<(usize, WorkloadSpec)> {
    members
        .iter()
        .zip(reports)
        .enumerate()
        .filter(|(_, (_, report))| report.error.is_none())
        .map(|(index, (spec, _))| (index, spec.clone()))
        .collect()
}

fn record_failure(report: &mut WorkloadReport, err: WorkloadError) {
    match &err {
        WorkloadError::NoPodsFound { .. } => {
            warn!(workload = %report.name, error = %err, "skipping validation")
        }
        _ => error!(workload = %report.name, error = %err, "workload failed, skipping remaining phases"),
    }
    report.error = Some(err);
}

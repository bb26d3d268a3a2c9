//! Health validator: bounded retry rounds over a workload's pods.
//!
//! After a workload's rollout is reported ready, the validator discovers
//! its running pods and probes each one until it passes or the retry
//! budget is spent. Pods leave the pending set as soon as they pass; a
//! pod that never passes is reported, not fatal.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use podwave_cluster::{ClusterClient, ClusterError};
use podwave_core::{PodRef, Selector, ValidationSpec};

use crate::check;
use crate::probe::{ProbeRequest, Prober};

/// Default pause between validation rounds.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(10);

/// Hard validation failures. Both end the workload's validation at once.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("no running pods match selector {selector}")]
    NoPodsFound { selector: String },

    #[error("failed to list pods for selector {selector}: {source}")]
    PodDiscovery {
        selector: String,
        #[source]
        source: ClusterError,
    },
}

/// Result of a validation pass that found pods to probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// Every pod passed.
    Complete { validated: Vec<PodRef>, rounds: u32 },
    /// The retry budget ran out with pods still pending.
    Incomplete {
        validated: Vec<PodRef>,
        pending: Vec<PodRef>,
        rounds: u32,
    },
}

impl ValidationOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, ValidationOutcome::Complete { .. })
    }

    pub fn validated(&self) -> &[PodRef] {
        match self {
            ValidationOutcome::Complete { validated, .. }
            | ValidationOutcome::Incomplete { validated, .. } => validated,
        }
    }

    pub fn pending(&self) -> &[PodRef] {
        match self {
            ValidationOutcome::Complete { .. } => &[],
            ValidationOutcome::Incomplete { pending, .. } => pending,
        }
    }

    pub fn rounds(&self) -> u32 {
        match self {
            ValidationOutcome::Complete { rounds, .. }
            | ValidationOutcome::Incomplete { rounds, .. } => *rounds,
        }
    }
}

/// Why a single probe did not accept a pod.
enum Rejection {
    Status(http::StatusCode),
    Check,
    Unreachable(String),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Status(status) => write!(f, "status {status}"),
            Rejection::Check => f.write_str("check not satisfied"),
            Rejection::Unreachable(reason) => write!(f, "unreachable: {reason}"),
        }
    }
}

/// Validates the pods of one workload at a time.
///
/// Cheap to clone; holds shared handles to the cluster and the prober.
#[derive(Clone)]
pub struct HealthValidator {
    cluster: Arc<dyn ClusterClient>,
    prober: Arc<dyn Prober>,
    retry_interval: Duration,
}

impl HealthValidator {
    pub fn new(cluster: Arc<dyn ClusterClient>, prober: Arc<dyn Prober>) -> Self {
        Self {
            cluster,
            prober,
            retry_interval: DEFAULT_RETRY_INTERVAL,
        }
    }

    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// Validate the pods behind `selector` for up to `max_rounds` rounds.
    pub async fn validate(
        &self,
        workload: &str,
        selector: &Selector,
        spec: &ValidationSpec,
        max_rounds: u32,
    ) -> Result<ValidationOutcome, ValidationError> {
        if !spec.delay.is_zero() {
            debug!(%workload, delay = ?spec.delay, "waiting before first validation");
            tokio::time::sleep(spec.delay).await;
        }

        let mut pending = self
            .cluster
            .running_pods(selector)
            .await
            .map_err(|source| ValidationError::PodDiscovery {
                selector: selector.to_string(),
                source,
            })?;
        if pending.is_empty() {
            return Err(ValidationError::NoPodsFound {
                selector: selector.to_string(),
            });
        }
        info!(%workload, pods = pending.len(), "validating pods");

        let mut validated = Vec::with_capacity(pending.len());
        let mut rounds = 0;

        while rounds < max_rounds {
            rounds += 1;

            let mut still_pending = Vec::with_capacity(pending.len());
            for pod in pending {
                match self.probe_pod(&pod, spec).await {
                    Ok(()) => {
                        info!(%workload, pod = %pod.name, address = %pod.address, "pod passed validation");
                        validated.push(pod);
                    }
                    Err(rejection) => {
                        debug!(%workload, pod = %pod.name, round = rounds, %rejection, "pod failed validation");
                        still_pending.push(pod);
                    }
                }
            }
            pending = still_pending;

            if pending.is_empty() {
                return Ok(ValidationOutcome::Complete { validated, rounds });
            }

            if rounds < max_rounds {
                warn!(
                    %workload,
                    pending = pending.len(),
                    retries_left = max_rounds - rounds,
                    "retrying validation"
                );
                tokio::time::sleep(self.retry_interval).await;
            }
        }

        warn!(
            %workload,
            rounds,
            pending = ?pending.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
            "pods failed validation after all retries"
        );
        Ok(ValidationOutcome::Incomplete {
            validated,
            pending,
            rounds,
        })
    }

    async fn probe_pod(&self, pod: &PodRef, spec: &ValidationSpec) -> Result<(), Rejection> {
        let request = build_request(pod, spec);
        let response = self
            .prober
            .probe(&request)
            .await
            .map_err(|e| Rejection::Unreachable(e.to_string()))?;

        if !response.status.is_success() {
            return Err(Rejection::Status(response.status));
        }
        match &spec.check {
            Some(clause) if !check::evaluate(clause, &response.body) => Err(Rejection::Check),
            _ => Ok(()),
        }
    }
}

/// Render the validation request for one pod.
pub fn build_request(pod: &PodRef, spec: &ValidationSpec) -> ProbeRequest {
    ProbeRequest {
        method: spec.method.clone(),
        url: spec.url.render(pod),
        headers: spec
            .headers
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
        body: spec.body.clone(),
    }
}

//! Rollout driver: runs waves strictly in ascending order.
//!
//! The driver is the only place that sequences waves. Wave N+1 starts
//! after every member of wave N has finished all three phases, whatever
//! their outcome.

use std::fmt;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{info, warn};

use podwave_core::WorkloadSpec;

use crate::executor::WaveExecutor;
use crate::report::RolloutReport;
use crate::wave::WavePlan;

/// Where the rollout currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RolloutPhase {
    /// Nothing started yet.
    Idle,
    /// Issuing scale requests for a wave.
    Scaling { wave: u32 },
    /// Waiting for a wave's rollouts to report ready.
    Waiting { wave: u32 },
    /// Probing a wave's pods.
    Validating { wave: u32 },
    /// Every wave processed.
    Done,
}

impl RolloutPhase {
    /// The wave being worked on, if any.
    pub fn wave(&self) -> Option<u32> {
        match self {
            RolloutPhase::Scaling { wave }
            | RolloutPhase::Waiting { wave }
            | RolloutPhase::Validating { wave } => Some(*wave),
            RolloutPhase::Idle | RolloutPhase::Done => None,
        }
    }
}

impl fmt::Display for RolloutPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RolloutPhase::Idle => write!(f, "idle"),
            RolloutPhase::Scaling { wave } => write!(f, "scaling wave {wave}"),
            RolloutPhase::Waiting { wave } => write!(f, "waiting for wave {wave}"),
            RolloutPhase::Validating { wave } => write!(f, "validating wave {wave}"),
            RolloutPhase::Done => write!(f, "done"),
        }
    }
}

/// Top-level rollout engine.
pub struct RolloutDriver {
    executor: WaveExecutor,
    phase: watch::Sender<RolloutPhase>,
}

impl RolloutDriver {
    pub fn new(executor: WaveExecutor) -> Self {
        let (phase, _) = watch::channel(RolloutPhase::Idle);
        Self { executor, phase }
    }

    /// Observe phase transitions.
    pub fn subscribe(&self) -> watch::Receiver<RolloutPhase> {
        self.phase.subscribe()
    }

    pub fn phase(&self) -> RolloutPhase {
        *self.phase.borrow()
    }

    /// Run every wave to completion and return the per-workload report.
    ///
    /// Per-workload failures are recorded in the report; the rollout as a
    /// whole always reaches [`RolloutPhase::Done`].
    pub async fn run(&self, workloads: Vec<WorkloadSpec>) -> RolloutReport {
        let start = Instant::now();
        let plan = WavePlan::group(workloads);

        info!(
            waves = plan.len(),
            workloads = plan.workload_count(),
            "starting staged rollout"
        );

        let mut waves = Vec::with_capacity(plan.len());
        for (wave, members) in plan.iter() {
            waves.push(self.executor.execute(wave, members, &self.phase).await);
        }

        let report = RolloutReport {
            waves,
            elapsed: start.elapsed(),
        };
        self.phase.send_replace(RolloutPhase::Done);

        let summary = report.summary();
        if summary.degraded + summary.failed > 0 {
            warn!(
                validated = summary.validated,
                degraded = summary.degraded,
                failed = summary.failed,
                elapsed = ?report.elapsed,
                "rollout finished with problems"
            );
        } else {
            info!(
                validated = summary.validated,
                elapsed = ?report.elapsed,
                "rollout finished"
            );
        }
        report
    }
}

//! podwave-rollout: staged rollout of workloads in waves.
//!
//! A rollout is a list of [`WorkloadSpec`](podwave_core::WorkloadSpec)s
//! grouped by wave number. Waves run strictly in ascending order; within a
//! wave every member goes through three phases, each joined before the
//! next begins:
//!
//! 1. **Scale**: [`ScalingController`] raises replicas by `scaleStep`
//!    with `scaleInterval` pauses until `maxReplicas` is reached.
//! 2. **Wait**: [`RolloutWaiter`] polls rollout status until the target is
//!    ready or `readinessTimeout` passes. A timeout is a warning, not a
//!    failure.
//! 3. **Validate**: [`HealthValidator`](podwave_health::HealthValidator)
//!    probes each running pod for up to `maxRetries` rounds.
//!
//! Failures stay local to one workload. A hard failure (replica read,
//! scale request, no pods) skips that workload's later phases; soft
//! failures (readiness timeout, pods still pending) mark it degraded.

pub mod driver;
pub mod error;
pub mod executor;
pub mod report;
pub mod scaler;
pub mod waiter;
pub mod wave;

pub use driver::{RolloutDriver, RolloutPhase};
pub use error::WorkloadError;
pub use executor::{Concurrency, WaveExecutor};
pub use report::{Outcome, RolloutReport, Summary, WaveReport, WorkloadReport};
pub use scaler::{next_replicas, planned_sequence, ScaleSummary, ScalingController};
pub use waiter::{Readiness, RolloutWaiter, DEFAULT_POLL_INTERVAL};
pub use wave::WavePlan;

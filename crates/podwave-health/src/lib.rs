//! podwave-health: application-level validation of freshly scaled pods.
//!
//! Orchestrator readiness only says a container passed its own probe.
//! Before the next wave is allowed to start, every pod of a workload is
//! asked over HTTP whether it is actually serving, and the decoded
//! response is held against the workload's `check` clause.
//!
//! # Architecture
//!
//! ```text
//! HealthValidator::validate()
//!   ├── sleep(validation delay)
//!   ├── ClusterClient::running_pods(selector)   → pending set
//!   └── up to max_retries rounds
//!       ├── Prober::probe() per pending pod
//!       ├── check::evaluate() on the body
//!       ├── drop accepted pods from the pending set
//!       └── sleep(retry interval) if pods remain
//! ```
//!
//! Exhausting the rounds is a soft outcome
//! ([`ValidationOutcome::Incomplete`]); only an empty pod list or a
//! failed pod listing is an error.

pub mod check;
pub mod probe;
pub mod validator;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use check::evaluate;
pub use probe::{HttpProber, ProbeError, ProbeFuture, ProbeRequest, ProbeResponse, Prober};
pub use validator::{HealthValidator, ValidationError, ValidationOutcome};

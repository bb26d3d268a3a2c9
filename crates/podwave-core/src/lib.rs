//! podwave-core: the data model shared by every podwave crate.
//!
//! A rollout is described by a list of workload descriptors, each naming
//! a deployment, how far and how fast to scale it, which wave it belongs
//! to, and how to validate its pods once the orchestrator reports them
//! ready. This crate parses that document ([`RolloutConfig`]) and turns
//! it into immutable, fully validated [`WorkloadSpec`] values.

pub mod config;
pub mod duration;
pub mod error;
pub mod types;

pub use config::{CheckConfig, RolloutConfig, ValidationConfig, WorkloadConfig, DEFAULT_CONFIG_PATH};
pub use duration::{format_duration, parse_duration};
pub use error::{ConfigError, ConfigResult};
pub use types::*;

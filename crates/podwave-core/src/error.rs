//! Configuration error types.

use thiserror::Error;

/// Result type alias for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading or validating the rollout configuration.
///
/// All of these are fatal: they are reported before any wave runs.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("workload {workload}: {reason}")]
    Invalid { workload: String, reason: String },

    #[error("duplicate workload name: {0}")]
    DuplicateName(String),

    #[error("{} invalid workload(s):\n{}", .0.len(), render_all(.0))]
    Multiple(Vec<ConfigError>),
}

impl ConfigError {
    pub(crate) fn invalid(workload: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            workload: workload.to_string(),
            reason: reason.into(),
        }
    }
}

fn render_all(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {e}"))
        .collect::<Vec<_>>()
        .join("\n")
}

//! Rollout configuration parser.
//!
//! The document lists the workloads to scale:
//!
//! ```json
//! {
//!   "deployments": [
//!     {
//!       "name": "api",
//!       "initialReplicas": 1,
//!       "maxReplicas": 6,
//!       "scaleStep": 2,
//!       "scaleInterval": "30s",
//!       "wave": 1,
//!       "readinessTimeout": "5m",
//!       "maxRetries": 3,
//!       "validation": {
//!         "type": "http",
//!         "url": "http://{podIP}:8080/healthz",
//!         "method": "GET",
//!         "validationDelay": "10s",
//!         "check": { "field": "status", "condition": "equals", "value": "ok" }
//!       }
//!     }
//!   ]
//! }
//! ```
//!
//! Files ending in `.toml` are read as TOML with the same keys; anything
//! else is read as JSON.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::duration::parse_duration;
use crate::error::{ConfigError, ConfigResult};
use crate::types::{
    CheckClause, Condition, Selector, UrlTemplate, ValidationSpec, WorkloadSpec,
};

/// Where the config map is mounted in the orchestrator pod.
pub const DEFAULT_CONFIG_PATH: &str = "/config/deployments.yaml";

const DEFAULT_READINESS_TIMEOUT: &str = "5m";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolloutConfig {
    pub deployments: Vec<WorkloadConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadConfig {
    pub name: String,
    #[serde(default)]
    pub initial_replicas: i64,
    pub max_replicas: i64,
    #[serde(default = "default_scale_step")]
    pub scale_step: i64,
    #[serde(default)]
    pub scale_interval: String,
    #[serde(default)]
    pub wave: i64,
    #[serde(default = "default_readiness_timeout")]
    pub readiness_timeout: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: i64,
    /// Pod labels; defaults to `app=<name>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<BTreeMap<String, String>>,
    pub validation: ValidationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationConfig {
    #[serde(rename = "type", default = "default_validation_type")]
    pub kind: String,
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub validation_delay: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check: Option<CheckConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckConfig {
    pub field: String,
    pub condition: String,
    pub value: serde_json::Value,
}

fn default_scale_step() -> i64 {
    1
}

fn default_readiness_timeout() -> String {
    DEFAULT_READINESS_TIMEOUT.to_string()
}

fn default_max_retries() -> i64 {
    3
}

fn default_validation_type() -> String {
    "http".to_string()
}

fn default_method() -> String {
    "GET".to_string()
}

impl RolloutConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let display = path.display().to_string();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;

        let is_toml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        if is_toml {
            Self::from_toml_str(&content).map_err(|reason| ConfigError::Parse {
                path: display,
                reason,
            })
        } else {
            Self::from_json_str(&content).map_err(|reason| ConfigError::Parse {
                path: display,
                reason,
            })
        }
    }

    pub fn from_json_str(content: &str) -> Result<Self, String> {
        serde_json::from_str(content).map_err(|e| e.to_string())
    }

    pub fn from_toml_str(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Validate every workload and convert to typed descriptors.
    ///
    /// All problems are collected so a broken file is reported in one go.
    pub fn into_workloads(self) -> ConfigResult<Vec<WorkloadSpec>> {
        let mut errors = Vec::new();
        let mut seen = HashSet::new();
        let mut workloads = Vec::with_capacity(self.deployments.len());

        for raw in self.deployments {
            let name = raw.name.trim();
            if !name.is_empty() && !seen.insert(name.to_string()) {
                errors.push(ConfigError::DuplicateName(name.to_string()));
                continue;
            }
            match raw.into_spec() {
                Ok(spec) => workloads.push(spec),
                Err(e) => errors.push(e),
            }
        }

        match errors.len() {
            0 => Ok(workloads),
            1 => Err(errors.remove(0)),
            _ => Err(ConfigError::Multiple(errors)),
        }
    }
}

impl WorkloadConfig {
    pub fn into_spec(self) -> ConfigResult<WorkloadSpec> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(ConfigError::invalid("<unnamed>", "name must not be empty"));
        }

        let initial_replicas = non_negative(&name, "initialReplicas", self.initial_replicas)?;
        let max_replicas = non_negative(&name, "maxReplicas", self.max_replicas)?;
        if max_replicas < initial_replicas {
            return Err(ConfigError::invalid(
                &name,
                format!(
                    "maxReplicas ({max_replicas}) must be >= initialReplicas ({initial_replicas})"
                ),
            ));
        }

        if self.scale_step < 1 {
            return Err(ConfigError::invalid(
                &name,
                format!("scaleStep must be at least 1, got {}", self.scale_step),
            ));
        }
        let scale_step = non_negative(&name, "scaleStep", self.scale_step)?;

        if self.max_retries < 1 {
            return Err(ConfigError::invalid(
                &name,
                format!("maxRetries must be at least 1, got {}", self.max_retries),
            ));
        }
        let max_retries = non_negative(&name, "maxRetries", self.max_retries)?;

        let wave = non_negative(&name, "wave", self.wave)?;
        let scale_interval = duration(&name, "scaleInterval", &self.scale_interval)?;
        let readiness_timeout = duration(&name, "readinessTimeout", &self.readiness_timeout)?;

        let selector = match self.selector {
            Some(labels) if labels.is_empty() => {
                return Err(ConfigError::invalid(&name, "selector must not be empty"));
            }
            Some(labels) => Selector::new(labels),
            None => Selector::for_workload(&name),
        };

        let validation = self.validation.into_spec(&name)?;

        Ok(WorkloadSpec {
            name,
            initial_replicas,
            max_replicas,
            scale_step,
            scale_interval,
            wave,
            readiness_timeout,
            max_retries,
            selector,
            validation,
        })
    }
}

impl ValidationConfig {
    fn into_spec(self, workload: &str) -> ConfigResult<ValidationSpec> {
        if !self.kind.eq_ignore_ascii_case("http") {
            return Err(ConfigError::invalid(
                workload,
                format!("unsupported validation type {:?}", self.kind),
            ));
        }

        let method = http::Method::from_bytes(self.method.trim().to_ascii_uppercase().as_bytes())
            .map_err(|_| {
                ConfigError::invalid(workload, format!("invalid HTTP method {:?}", self.method))
            })?;
        let url = UrlTemplate::parse(&self.url).map_err(|e| ConfigError::invalid(workload, e))?;
        let delay = duration(workload, "validationDelay", &self.validation_delay)?;

        for (name, value) in &self.headers {
            if http::HeaderName::from_bytes(name.as_bytes()).is_err() {
                return Err(ConfigError::invalid(
                    workload,
                    format!("invalid header name {name:?}"),
                ));
            }
            if http::HeaderValue::from_str(value).is_err() {
                return Err(ConfigError::invalid(
                    workload,
                    format!("invalid value for header {name:?}"),
                ));
            }
        }

        let check = match self.check {
            Some(check) => {
                if check.field.trim().is_empty() {
                    return Err(ConfigError::invalid(workload, "check field must not be empty"));
                }
                let condition: Condition = check
                    .condition
                    .parse()
                    .map_err(|e: String| ConfigError::invalid(workload, e))?;
                Some(CheckClause {
                    field: check.field.trim().to_string(),
                    condition,
                    value: check.value,
                })
            }
            None => None,
        };

        Ok(ValidationSpec {
            method,
            url,
            body: self.body,
            headers: self.headers,
            delay,
            check,
        })
    }
}

fn non_negative(workload: &str, field: &str, value: i64) -> ConfigResult<u32> {
    u32::try_from(value).map_err(|_| {
        ConfigError::invalid(
            workload,
            format!("{field} must be between 0 and {}, got {value}", u32::MAX),
        )
    })
}

fn duration(workload: &str, field: &str, value: &str) -> ConfigResult<Duration> {
    parse_duration(value)
        .ok_or_else(|| ConfigError::invalid(workload, format!("{field}: invalid duration {value:?}")))
}

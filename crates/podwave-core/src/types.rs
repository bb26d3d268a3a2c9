//! Typed workload descriptors.
//!
//! These are produced once from the raw configuration by
//! [`RolloutConfig::into_workloads`](crate::RolloutConfig::into_workloads)
//! and never change afterwards.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Placeholder in a validation URL replaced by the pod's IP address.
pub const POD_IP_PLACEHOLDER: &str = "{podIP}";

/// Placeholder in a validation URL replaced by the pod's name.
pub const POD_NAME_PLACEHOLDER: &str = "{podName}";

// ── Workload ──────────────────────────────────────────────────────

/// One scalable workload and its scaling/validation policy.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkloadSpec {
    /// Deployment name, unique within the namespace.
    pub name: String,
    pub initial_replicas: u32,
    /// Target replica count the scaling controller drives towards.
    pub max_replicas: u32,
    /// Replicas added per scaling iteration. Always >= 1.
    pub scale_step: u32,
    /// Pause between successive increments.
    pub scale_interval: Duration,
    /// Wave number; lower waves complete before higher ones start.
    pub wave: u32,
    /// How long to wait for the orchestrator to report all replicas ready.
    pub readiness_timeout: Duration,
    /// Validation rounds before giving up on pending pods. Always >= 1.
    pub max_retries: u32,
    /// Label selector used to discover this workload's pods.
    pub selector: Selector,
    pub validation: ValidationSpec,
}

/// Application-level validation of a workload's pods.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationSpec {
    pub method: http::Method,
    pub url: UrlTemplate,
    pub body: Option<String>,
    pub headers: BTreeMap<String, String>,
    /// Pause before the first probe, letting the application warm up.
    pub delay: Duration,
    /// Condition on the decoded response body. `None` accepts any 2xx.
    pub check: Option<CheckClause>,
}

/// A field/operator/value condition evaluated against a JSON response.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckClause {
    /// Dot-separated path into the response body, e.g. `status.ready`.
    pub field: String,
    pub condition: Condition,
    pub value: serde_json::Value,
}

/// Comparison operator of a [`CheckClause`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Condition {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
}

impl Condition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Condition::Equals => "equals",
            Condition::NotEquals => "notEquals",
            Condition::GreaterThan => "greaterThan",
            Condition::LessThan => "lessThan",
        }
    }
}

impl FromStr for Condition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "equals" | "eq" | "==" => Ok(Condition::Equals),
            "notEquals" | "ne" | "!=" => Ok(Condition::NotEquals),
            "greaterThan" | "gt" | ">" => Ok(Condition::GreaterThan),
            "lessThan" | "lt" | "<" => Ok(Condition::LessThan),
            other => Err(format!("unknown check condition: {other:?}")),
        }
    }
}

impl TryFrom<String> for Condition {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Condition> for String {
    fn from(c: Condition) -> Self {
        c.as_str().to_string()
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Selector ──────────────────────────────────────────────────────

/// Equality-based label selector, rendered as `k1=v1,k2=v2`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Selector(BTreeMap<String, String>);

impl Selector {
    pub fn new(labels: BTreeMap<String, String>) -> Self {
        Self(labels)
    }

    /// The conventional `app=<name>` selector.
    pub fn for_workload(name: &str) -> Self {
        Self(BTreeMap::from([("app".to_string(), name.to_string())]))
    }

    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether a pod with `labels` is selected.
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.0.iter().all(|(k, v)| labels.get(k) == Some(v))
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (k, v) in &self.0 {
            if !first {
                f.write_str(",")?;
            }
            write!(f, "{k}={v}")?;
            first = false;
        }
        Ok(())
    }
}

// ── URL template ──────────────────────────────────────────────────

/// A validation URL with `{podIP}` (and optionally `{podName}`) holes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplate {
    raw: String,
}

impl UrlTemplate {
    /// Parse a template. It must contain the `{podIP}` placeholder.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err("validation url is empty".to_string());
        }
        if !raw.contains(POD_IP_PLACEHOLDER) {
            return Err(format!(
                "validation url {raw:?} has no {POD_IP_PLACEHOLDER} placeholder"
            ));
        }
        Ok(Self {
            raw: raw.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Substitute a pod's address and name.
    pub fn render(&self, pod: &PodRef) -> String {
        self.raw
            .replace(POD_IP_PLACEHOLDER, &pod.address)
            .replace(POD_NAME_PLACEHOLDER, &pod.name)
    }
}

impl fmt::Display for UrlTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

// ── Pod ───────────────────────────────────────────────────────────

/// A running pod discovered at validation time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PodRef {
    pub name: String,
    /// Pod IP address.
    pub address: String,
}

impl PodRef {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}

impl fmt::Display for PodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn condition_aliases() {
        assert_eq!("equals".parse::<Condition>(), Ok(Condition::Equals));
        assert_eq!("==".parse::<Condition>(), Ok(Condition::Equals));
        assert_eq!("ne".parse::<Condition>(), Ok(Condition::NotEquals));
        assert_eq!(">".parse::<Condition>(), Ok(Condition::GreaterThan));
        assert_eq!("lessThan".parse::<Condition>(), Ok(Condition::LessThan));
        assert!("contains".parse::<Condition>().is_err());
    }

    #[test]
    fn condition_serde_uses_canonical_name() {
        let json = serde_json::to_string(&Condition::GreaterThan).unwrap();
        assert_eq!(json, "\"greaterThan\"");
        let back: Condition = serde_json::from_str("\"!=\"").unwrap();
        assert_eq!(back, Condition::NotEquals);
    }

    #[test]
    fn selector_display_and_match() {
        let selector = Selector::new(BTreeMap::from([
            ("app".to_string(), "api".to_string()),
            ("tier".to_string(), "web".to_string()),
        ]));
        assert_eq!(selector.to_string(), "app=api,tier=web");

        let mut labels = selector.labels().clone();
        labels.insert("pod-template-hash".to_string(), "abc".to_string());
        assert!(selector.matches(&labels));

        labels.insert("tier".to_string(), "db".to_string());
        assert!(!selector.matches(&labels));
    }

    #[test]
    fn default_selector_is_app_label() {
        assert_eq!(Selector::for_workload("api").to_string(), "app=api");
    }

    #[test]
    fn url_template_requires_pod_ip() {
        assert!(UrlTemplate::parse("http://{podIP}:8080/healthz").is_ok());
        assert!(UrlTemplate::parse("http://localhost/healthz").is_err());
        assert!(UrlTemplate::parse("   ").is_err());
    }

    #[test]
    fn url_template_renders_pod() {
        let template = UrlTemplate::parse("http://{podIP}:8080/ready?pod={podName}").unwrap();
        let pod = PodRef::new("api-7d9f", "10.1.2.3");
        assert_eq!(
            template.render(&pod),
            "http://10.1.2.3:8080/ready?pod=api-7d9f"
        );
    }
}

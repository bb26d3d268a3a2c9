//! Per-workload outcomes and the final rollout summary.

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

use podwave_core::format_duration;
use podwave_health::ValidationOutcome;

use crate::error::WorkloadError;
use crate::scaler::ScaleSummary;
use crate::waiter::Readiness;

/// Final classification of one workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// Scaled, reported ready and every pod passed validation.
    Validated,
    /// Finished, but readiness timed out or some pods never validated.
    Degraded,
    /// A hard failure ended the workload's phases early.
    Failed,
}

impl Outcome {
    pub fn symbol(&self) -> &'static str {
        match self {
            Outcome::Validated => "✅",
            Outcome::Degraded => "⚠️",
            Outcome::Failed => "❌",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Validated => "validated",
            Outcome::Degraded => "degraded",
            Outcome::Failed => "failed",
        }
    }
}

/// Everything that happened to one workload within its wave.
#[derive(Debug)]
pub struct WorkloadReport {
    pub name: String,
    pub wave: u32,
    pub scaling: Option<ScaleSummary>,
    pub readiness: Option<Readiness>,
    pub validation: Option<ValidationOutcome>,
    /// Set when a hard failure skipped the remaining phases.
    pub error: Option<WorkloadError>,
}

impl WorkloadReport {
    pub fn new(name: &str, wave: u32) -> Self {
        Self {
            name: name.to_string(),
            wave,
            scaling: None,
            readiness: None,
            validation: None,
            error: None,
        }
    }

    pub fn outcome(&self) -> Outcome {
        if self.error.is_some() {
            Outcome::Failed
        } else if self.degradations().is_empty() {
            Outcome::Validated
        } else {
            Outcome::Degraded
        }
    }

    /// Human-readable reasons this workload is degraded.
    pub fn degradations(&self) -> Vec<String> {
        let mut reasons = Vec::new();
        if let Some(Readiness::TimedOut {
            last_ready, waited, ..
        }) = &self.readiness
        {
            let target = self.scaling.as_ref().map(|s| s.target);
            reasons.push(match (last_ready, target) {
                (Some(ready), Some(target)) => format!(
                    "rollout not ready after {} ({ready}/{target} ready)",
                    format_duration(*waited)
                ),
                _ => format!("rollout not ready after {}", format_duration(*waited)),
            });
        }
        if let Some(ValidationOutcome::Incomplete {
            pending, rounds, ..
        }) = &self.validation
        {
            let names: Vec<_> = pending.iter().map(|p| p.name.as_str()).collect();
            reasons.push(format!(
                "{} pod(s) failed validation after {rounds} round(s): {}",
                pending.len(),
                names.join(", ")
            ));
        }
        reasons
    }

    fn detail(&self) -> String {
        if let Some(err) = &self.error {
            return err.to_string();
        }
        let degradations = self.degradations();
        if !degradations.is_empty() {
            return degradations.join("; ");
        }
        match &self.validation {
            Some(validation) => format!("{} pod(s) validated", validation.validated().len()),
            None => "complete".to_string(),
        }
    }
}

/// One executed wave.
#[derive(Debug)]
pub struct WaveReport {
    pub wave: u32,
    pub started: Instant,
    pub finished: Instant,
    pub workloads: Vec<WorkloadReport>,
}

impl WaveReport {
    pub fn elapsed(&self) -> Duration {
        self.finished.saturating_duration_since(self.started)
    }

    pub fn workload(&self, name: &str) -> Option<&WorkloadReport> {
        self.workloads.iter().find(|w| w.name == name)
    }
}

/// Aggregate counts over all waves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub validated: usize,
    pub degraded: usize,
    pub failed: usize,
}

impl Summary {
    pub fn total(&self) -> usize {
        self.validated + self.degraded + self.failed
    }
}

/// The driver's final report. Produced even when workloads failed.
#[derive(Debug)]
pub struct RolloutReport {
    pub waves: Vec<WaveReport>,
    pub elapsed: Duration,
}

impl RolloutReport {
    pub fn workloads(&self) -> impl Iterator<Item = &WorkloadReport> {
        self.waves.iter().flat_map(|w| w.workloads.iter())
    }

    pub fn workload(&self, name: &str) -> Option<&WorkloadReport> {
        self.workloads().find(|w| w.name == name)
    }

    pub fn summary(&self) -> Summary {
        self.workloads()
            .fold(Summary::default(), |mut summary, w| {
                match w.outcome() {
                    Outcome::Validated => summary.validated += 1,
                    Outcome::Degraded => summary.degraded += 1,
                    Outcome::Failed => summary.failed += 1,
                }
                summary
            })
    }
}

impl fmt::Display for RolloutReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let summary = self.summary();
        writeln!(
            f,
            "Rollout finished in {}: {} validated, {} degraded, {} failed",
            format_duration(self.elapsed),
            summary.validated,
            summary.degraded,
            summary.failed
        )?;
        let width = self.workloads().map(|w| w.name.len()).max().unwrap_or(0);
        for wave in &self.waves {
            writeln!(f, "Wave {} ({})", wave.wave, format_duration(wave.elapsed()))?;
            for workload in &wave.workloads {
                let outcome = workload.outcome();
                writeln!(
                    f,
                    "  {} {:<width$}  {}: {}",
                    outcome.symbol(),
                    workload.name,
                    outcome.label(),
                    workload.detail(),
                )?;
            }
        }
        Ok(())
    }
}

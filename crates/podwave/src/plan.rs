//! Dry-run rendering of a rollout: waves, members and scale sequences.

use std::fmt::Write;

use podwave_core::format_duration;
use podwave_rollout::{planned_sequence, WavePlan};

/// Render `plan` the way `podwave plan` prints it.
///
/// Sequences start from each workload's `initialReplicas`; a live run
/// starts from whatever the cluster reports instead.
pub fn render(plan: &WavePlan) -> String {
    let mut out = String::new();
    if plan.is_empty() {
        out.push_str("No workloads configured.\n");
        return out;
    }

    let _ = writeln!(
        out,
        "{} workload(s) in {} wave(s)",
        plan.workload_count(),
        plan.len()
    );
    for (wave, members) in plan.iter() {
        let _ = writeln!(out, "\nWave {wave}");
        let width = members.iter().map(|w| w.name.len()).max().unwrap_or(0);
        for w in members {
            let sequence = planned_sequence(w.initial_replicas, w.max_replicas, w.scale_step);
            let steps = if sequence.is_empty() {
                "already at target".to_string()
            } else {
                sequence
                    .iter()
                    .map(u32::to_string)
                    .collect::<Vec<_>>()
                    .join(" -> ")
            };
            let _ = writeln!(
                out,
                "  {:<width$}  {} -> {} by {} every {}: {}",
                w.name,
                w.initial_replicas,
                w.max_replicas,
                w.scale_step,
                format_duration(w.scale_interval),
                steps,
            );
            let _ = writeln!(
                out,
                "  {:<width$}  ready within {}, validate {} {} up to {} round(s)",
                "",
                format_duration(w.readiness_timeout),
                w.validation.method,
                w.validation.url.as_str(),
                w.max_retries,
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    use podwave_core::RolloutConfig;

    fn plan(raw: &str) -> WavePlan {
        WavePlan::group(
            RolloutConfig::from_json_str(raw)
                .unwrap()
                .into_workloads()
                .unwrap(),
        )
    }

    #[test]
    fn renders_waves_in_order() {
        let rendered = render(&plan(
            r#"{"deployments": [
                {"name": "worker", "maxReplicas": 5, "scaleStep": 5, "wave": 2,
                 "validation": {"url": "http://{podIP}/health"}},
                {"name": "web", "maxReplicas": 4, "scaleStep": 2, "scaleInterval": "30s", "wave": 1,
                 "validation": {"url": "http://{podIP}:8080/ready"}}
            ]}"#,
        ));

        assert!(rendered.starts_with("2 workload(s) in 2 wave(s)"));
        let wave1 = rendered.find("Wave 1").unwrap();
        let wave2 = rendered.find("Wave 2").unwrap();
        assert!(wave1 < wave2);
        assert!(rendered.contains("web  0 -> 4 by 2 every 30s: 2 -> 4"));
        assert!(rendered.contains("validate GET http://{podIP}:8080/ready up to 3 round(s)"));
        assert!(rendered.contains("worker  0 -> 5 by 5 every 0s: 5"));
    }

    #[test]
    fn workload_at_target_has_no_steps() {
        let rendered = render(&plan(
            r#"{"deployments": [
                {"name": "cache", "initialReplicas": 2, "maxReplicas": 2,
                 "validation": {"url": "http://{podIP}/"}}
            ]}"#,
        ));
        assert!(rendered.contains("already at target"));
    }

    #[test]
    fn empty_plan() {
        assert_eq!(render(&WavePlan::default()), "No workloads configured.\n");
    }
}

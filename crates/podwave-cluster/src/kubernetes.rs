//! [`ClusterClient`] over the Kubernetes API.
//!
//! Workloads are `apps/v1` Deployments in a single namespace. Scaling is
//! a JSON merge patch of `spec.replicas`; readiness is read from
//! `status.readyReplicas`.

use std::path::Path;
use std::time::Duration;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, ListParams, Patch, PatchParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use tracing::{debug, trace};

use podwave_core::{PodRef, Selector};

use crate::client::{BoxFuture, ClusterClient, RolloutStatus};
use crate::error::{ClusterError, ClusterResult};

/// Field manager recorded on scale patches.
const FIELD_MANAGER: &str = "podwave";

/// Connection timeout for the API server.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Read timeout for API calls.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Build a kube client from an explicit kubeconfig, or infer one
/// (in-cluster service account, then `$KUBECONFIG` / `~/.kube/config`).
pub async fn create_client(kubeconfig: Option<&Path>) -> ClusterResult<Client> {
    let mut config = match kubeconfig {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                ClusterError::Client(format!("failed to read kubeconfig {}: {e}", path.display()))
            })?;
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .map_err(|e| ClusterError::Client(format!("failed to load kubeconfig: {e}")))?
        }
        None => Config::infer()
            .await
            .map_err(|e| ClusterError::Client(format!("failed to infer config: {e}")))?,
    };
    config.connect_timeout = Some(DEFAULT_CONNECT_TIMEOUT);
    config.read_timeout = Some(DEFAULT_READ_TIMEOUT);

    Client::try_from(config)
        .map_err(|e| ClusterError::Client(format!("failed to create client: {e}")))
}

/// Deployments and pods of one namespace.
#[derive(Clone)]
pub struct KubeCluster {
    deployments: Api<Deployment>,
    pods: Api<Pod>,
    namespace: String,
}

impl KubeCluster {
    pub fn new(client: Client, namespace: &str) -> Self {
        Self {
            deployments: Api::namespaced(client.clone(), namespace),
            pods: Api::namespaced(client, namespace),
            namespace: namespace.to_string(),
        }
    }

    async fn get_replicas(&self, workload: &str) -> ClusterResult<u32> {
        let deployment = self.deployments.get(workload).await?;
        Ok(spec_replicas(&deployment))
    }

    async fn patch_replicas(&self, workload: &str, replicas: u32) -> ClusterResult<()> {
        let patch = serde_json::json!({
            "spec": {
                "replicas": replicas
            }
        });
        self.deployments
            .patch(
                workload,
                &PatchParams {
                    field_manager: Some(FIELD_MANAGER.to_string()),
                    ..Default::default()
                },
                &Patch::Merge(&patch),
            )
            .await?;
        debug!(namespace = %self.namespace, %workload, replicas, "patched deployment replicas");
        Ok(())
    }

    async fn get_status(&self, workload: &str) -> ClusterResult<RolloutStatus> {
        let deployment = self.deployments.get(workload).await?;
        Ok(RolloutStatus {
            ready_replicas: ready_replicas(&deployment),
        })
    }

    async fn list_running(&self, selector: &Selector) -> ClusterResult<Vec<PodRef>> {
        let params = ListParams::default().labels(&selector.to_string());
        let list = self.pods.list(&params).await?;
        let pods: Vec<PodRef> = list.items.iter().filter_map(running_pod).collect();
        trace!(%selector, total = list.items.len(), running = pods.len(), "listed pods");
        Ok(pods)
    }
}

impl ClusterClient for KubeCluster {
    fn replica_count<'a>(&'a self, workload: &'a str) -> BoxFuture<'a, ClusterResult<u32>> {
        Box::pin(self.get_replicas(workload))
    }

    fn set_replica_count<'a>(
        &'a self,
        workload: &'a str,
        replicas: u32,
    ) -> BoxFuture<'a, ClusterResult<()>> {
        Box::pin(self.patch_replicas(workload, replicas))
    }

    fn rollout_status<'a>(&'a self, workload: &'a str) -> BoxFuture<'a, ClusterResult<RolloutStatus>> {
        Box::pin(self.get_status(workload))
    }

    fn running_pods<'a>(&'a self, selector: &'a Selector) -> BoxFuture<'a, ClusterResult<Vec<PodRef>>> {
        Box::pin(self.list_running(selector))
    }
}

/// `spec.replicas`, which the API server defaults to 1 when unset.
fn spec_replicas(deployment: &Deployment) -> u32 {
    let replicas = deployment
        .spec
        .as_ref()
        .and_then(|s| s.replicas)
        .unwrap_or(1);
    u32::try_from(replicas).unwrap_or(0)
}

/// `status.readyReplicas`, omitted by the API server when zero.
fn ready_replicas(deployment: &Deployment) -> u32 {
    let ready = deployment
        .status
        .as_ref()
        .and_then(|s| s.ready_replicas)
        .unwrap_or(0);
    u32::try_from(ready).unwrap_or(0)
}

/// A pod that is `Running`, not terminating, and has an IP.
fn running_pod(pod: &Pod) -> Option<PodRef> {
    if pod.metadata.deletion_timestamp.is_some() {
        return None;
    }
    let status = pod.status.as_ref()?;
    if status.phase.as_deref() != Some("Running") {
        return None;
    }
    let address = status.pod_ip.clone().filter(|ip| !ip.is_empty())?;
    let name = pod.metadata.name.clone()?;
    Some(PodRef::new(name, address))
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::apps::v1::{DeploymentSpec, DeploymentStatus};
    use k8s_openapi::api::core::v1::PodStatus;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn deployment(replicas: Option<i32>, ready: Option<i32>) -> Deployment {
        Deployment {
            metadata: ObjectMeta {
                name: Some("api".to_string()),
                ..Default::default()
            },
            spec: Some(DeploymentSpec {
                replicas,
                ..Default::default()
            }),
            status: Some(DeploymentStatus {
                ready_replicas: ready,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn pod(name: &str, phase: &str, ip: Option<&str>) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            status: Some(PodStatus {
                phase: Some(phase.to_string()),
                pod_ip: ip.map(str::to_string),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn spec_replicas_defaults_to_one() {
        assert_eq!(spec_replicas(&deployment(Some(4), None)), 4);
        assert_eq!(spec_replicas(&deployment(None, None)), 1);
    }

    #[test]
    fn ready_replicas_defaults_to_zero() {
        assert_eq!(ready_replicas(&deployment(Some(4), Some(3))), 3);
        assert_eq!(ready_replicas(&deployment(Some(4), None)), 0);
    }

    #[test]
    fn running_pod_requires_phase_and_ip() {
        assert_eq!(
            running_pod(&pod("api-1", "Running", Some("10.0.0.1"))),
            Some(PodRef::new("api-1", "10.0.0.1"))
        );
        assert_eq!(running_pod(&pod("api-2", "Pending", Some("10.0.0.2"))), None);
        assert_eq!(running_pod(&pod("api-3", "Running", None)), None);
        assert_eq!(running_pod(&pod("api-4", "Running", Some(""))), None);
    }

    #[test]
    fn running_pod_skips_terminating() {
        let terminating: Pod = serde_json::from_value(serde_json::json!({
            "metadata": {
                "name": "api-1",
                "deletionTimestamp": "2024-01-01T00:00:00Z"
            },
            "status": { "phase": "Running", "podIP": "10.0.0.1" }
        }))
        .unwrap();
        assert_eq!(running_pod(&terminating), None);
    }
}

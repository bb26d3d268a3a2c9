//! In-memory [`ClusterClient`] for tests.
//!
//! Every scale request is recorded with the (tokio) instant it was made,
//! so tests can assert both the replica sequence of each workload and the
//! relative ordering of waves.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use tokio::time::Instant;

use podwave_core::{PodRef, Selector};

use crate::client::{BoxFuture, ClusterClient, RolloutStatus};
use crate::error::{ClusterError, ClusterResult};

/// One recorded `set_replica_count` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaleEvent {
    pub workload: String,
    pub replicas: u32,
    pub at: Instant,
}

#[derive(Debug)]
struct FakeWorkload {
    replicas: u32,
    /// Poll number (1-based) from which all replicas report ready.
    /// `None` never becomes ready.
    ready_after: Option<u32>,
    status_polls: u32,
    failing_status_polls: u32,
    fail_reads: bool,
    reject_scale: bool,
}

#[derive(Debug, Default)]
struct Inner {
    workloads: HashMap<String, FakeWorkload>,
    pods: HashMap<String, Vec<PodRef>>,
    failing_pod_lists: HashSet<String>,
    pod_lists: u32,
    scale_log: Vec<ScaleEvent>,
}

/// In-memory cluster with scripted readiness and failure injection.
#[derive(Debug, Default)]
pub struct FakeCluster {
    inner: Mutex<Inner>,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a deployment currently at `replicas`. Ready on first poll.
    pub fn with_workload(self, name: &str, replicas: u32) -> Self {
        self.lock().workloads.insert(
            name.to_string(),
            FakeWorkload {
                replicas,
                ready_after: Some(1),
                status_polls: 0,
                failing_status_polls: 0,
                fail_reads: false,
                reject_scale: false,
            },
        );
        self
    }

    /// Report all replicas ready from the `polls`-th status poll on.
    pub fn ready_after_polls(self, name: &str, polls: u32) -> Self {
        self.update(name, |w| w.ready_after = Some(polls));
        self
    }

    /// Never report the workload ready.
    pub fn never_ready(self, name: &str) -> Self {
        self.update(name, |w| w.ready_after = None);
        self
    }

    /// Fail the first `polls` status polls with a transient error.
    pub fn failing_status_polls(self, name: &str, polls: u32) -> Self {
        self.update(name, |w| w.failing_status_polls = polls);
        self
    }

    /// Fail every replica-count read.
    pub fn fail_reads(self, name: &str) -> Self {
        self.update(name, |w| w.fail_reads = true);
        self
    }

    /// Reject every scale request.
    pub fn reject_scale(self, name: &str) -> Self {
        self.update(name, |w| w.reject_scale = true);
        self
    }

    /// Running pods returned for `selector`.
    pub fn with_pods(self, selector: &Selector, pods: Vec<PodRef>) -> Self {
        self.lock().pods.insert(selector.to_string(), pods);
        self
    }

    /// Fail every pod listing for `selector`.
    pub fn fail_pod_lists(self, selector: &Selector) -> Self {
        self.lock().failing_pod_lists.insert(selector.to_string());
        self
    }

    /// Replica values requested for `name`, in order.
    pub fn scale_requests(&self, name: &str) -> Vec<u32> {
        self.lock()
            .scale_log
            .iter()
            .filter(|e| e.workload == name)
            .map(|e| e.replicas)
            .collect()
    }

    /// Every scale request across all workloads, in order.
    pub fn scale_log(&self) -> Vec<ScaleEvent> {
        self.lock().scale_log.clone()
    }

    pub fn status_polls(&self, name: &str) -> u32 {
        self.lock()
            .workloads
            .get(name)
            .map(|w| w.status_polls)
            .unwrap_or(0)
    }

    pub fn pod_lists(&self) -> u32 {
        self.lock().pod_lists
    }

    pub fn replicas(&self, name: &str) -> Option<u32> {
        self.lock().workloads.get(name).map(|w| w.replicas)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn update(&self, name: &str, f: impl FnOnce(&mut FakeWorkload)) {
        if let Some(w) = self.lock().workloads.get_mut(name) {
            f(w);
        }
    }
}

impl ClusterClient for FakeCluster {
    fn replica_count<'a>(&'a self, workload: &'a str) -> BoxFuture<'a, ClusterResult<u32>> {
        Box::pin(async move {
            let inner = self.lock();
            match inner.workloads.get(workload) {
                None => Err(ClusterError::NotFound(workload.to_string())),
                Some(w) if w.fail_reads => Err(ClusterError::Unavailable(
                    "connection refused".to_string(),
                )),
                Some(w) => Ok(w.replicas),
            }
        })
    }

    fn set_replica_count<'a>(
        &'a self,
        workload: &'a str,
        replicas: u32,
    ) -> BoxFuture<'a, ClusterResult<()>> {
        Box::pin(async move {
            let mut inner = self.lock();
            let w = inner
                .workloads
                .get_mut(workload)
                .ok_or_else(|| ClusterError::NotFound(workload.to_string()))?;
            if w.reject_scale {
                return Err(ClusterError::Rejected(format!(
                    "scaling {workload} is forbidden"
                )));
            }
            w.replicas = replicas;
            inner.scale_log.push(ScaleEvent {
                workload: workload.to_string(),
                replicas,
                at: Instant::now(),
            });
            Ok(())
        })
    }

    fn rollout_status<'a>(&'a self, workload: &'a str) -> BoxFuture<'a, ClusterResult<RolloutStatus>> {
        Box::pin(async move {
            let mut inner = self.lock();
            let w = inner
                .workloads
                .get_mut(workload)
                .ok_or_else(|| ClusterError::NotFound(workload.to_string()))?;
            w.status_polls += 1;
            if w.status_polls <= w.failing_status_polls {
                return Err(ClusterError::Unavailable("etcd timeout".to_string()));
            }
            let ready = match w.ready_after {
                Some(after) if w.status_polls >= after => w.replicas,
                _ => 0,
            };
            Ok(RolloutStatus {
                ready_replicas: ready,
            })
        })
    }

    fn running_pods<'a>(&'a self, selector: &'a Selector) -> BoxFuture<'a, ClusterResult<Vec<PodRef>>> {
        Box::pin(async move {
            let mut inner = self.lock();
            inner.pod_lists += 1;
            let key = selector.to_string();
            if inner.failing_pod_lists.contains(&key) {
                return Err(ClusterError::Unavailable(format!("listing pods for {key} timed out")));
            }
            Ok(inner
                .pods
                .get(&key)
                .cloned()
                .unwrap_or_default())
        })
    }
}

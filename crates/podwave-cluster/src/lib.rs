//! podwave-cluster: the orchestrator control-plane seen by a rollout.
//!
//! A rollout only needs four things from the cluster: read a workload's
//! desired replica count, change it, read how many replicas are ready,
//! and list the running pods behind a selector. [`ClusterClient`]
//! captures exactly that; [`KubeCluster`] implements it against the
//! Kubernetes API for `apps/v1` Deployments.
//!
//! With the `testing` feature, [`testing::FakeCluster`] provides an
//! in-memory implementation that records every request.

pub mod client;
pub mod error;
pub mod kubernetes;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use client::{BoxFuture, ClusterClient, RolloutStatus};
pub use error::{ClusterError, ClusterResult};
pub use kubernetes::{create_client, KubeCluster};

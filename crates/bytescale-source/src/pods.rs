//! Replica counting against the Kubernetes API.
//!
//! A scaled workload may span several deployments; its pods are matched by
//! name prefix (`<deployment>-<hash>-<id>`). Only `Running` pods count.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::Client;
use kube::api::{Api, ListParams};
use tracing::{debug, warn};

use crate::error::{SourceError, SourceResult};

/// Counts the running replicas of a workload.
#[async_trait]
pub trait PodCounter: Send + Sync {
    /// Count running pods in `namespace` whose name starts with any of
    /// `name_prefixes`. An empty prefix list counts every running pod in
    /// the namespace.
    async fn count_pods(&self, namespace: &str, name_prefixes: &[String]) -> SourceResult<u64>;
}

/// [`PodCounter`] backed by the cluster API.
pub struct KubePodCounter {
    client: Result<Client, String>,
}

impl KubePodCounter {
    pub fn new(client: Client) -> Self {
        Self { client: Ok(client) }
    }

    /// Build a client from `KUBECONFIG` or the in-cluster service account.
    ///
    /// When no configuration is found the counter is still returned; every
    /// count then fails with the configuration error.
    pub async fn from_default_config() -> Self {
        match Client::try_default().await {
            Ok(client) => Self::new(client),
            Err(e) => {
                warn!(error = %e, "no kubernetes configuration, pod normalization unavailable");
                Self {
                    client: Err(e.to_string()),
                }
            }
        }
    }

    /// Whether a cluster client was built. The daemon reports this at
    /// startup; counting without one fails per request.
    pub fn is_available(&self) -> bool {
        self.client.is_ok()
    }
}

#[async_trait]
impl PodCounter for KubePodCounter {
    async fn count_pods(&self, namespace: &str, name_prefixes: &[String]) -> SourceResult<u64> {
        let client = self
            .client
            .as_ref()
            .map_err(|e| SourceError::Kube(format!("client unavailable: {e}")))?;

        let api: Api<Pod> = Api::namespaced(client.clone(), namespace);
        let list = api
            .list(&ListParams::default())
            .await
            .map_err(|e| SourceError::Kube(e.to_string()))?;

        debug!(%namespace, pods = list.items.len(), "listed pods");

        let count = count_matching(&list.items, name_prefixes);

        debug!(%namespace, ?name_prefixes, count, "counted running pods");
        Ok(count)
    }
}

/// Count running pods whose name matches one of `prefixes`.
pub fn count_matching(pods: &[Pod], prefixes: &[String]) -> u64 {
    pods.iter()
        .filter(|pod| is_running(pod))
        .filter(|pod| {
            pod.metadata
                .name
                .as_deref()
                .is_some_and(|name| matches_prefixes(name, prefixes))
        })
        .count() as u64
}

fn is_running(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|status| status.phase.as_deref())
        == Some("Running")
}

/// Whether `name` belongs to one of the prefixes. Each pod matches at most
/// once, even when prefixes overlap.
pub fn matches_prefixes(name: &str, prefixes: &[String]) -> bool {
    prefixes.is_empty() || prefixes.iter().any(|p| name.starts_with(p.as_str()))
}

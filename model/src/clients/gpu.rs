use super::crd_client::CrdClient;
use super::error::{self, Result};
use crate::gpu::ClusterPolicy;
use kube::api::PostParams;
use kube::{Api, Client, ResourceExt};
use snafu::ResultExt;

/// Client for the cluster-scoped `ClusterPolicy` custom resource.
#[derive(Clone)]
pub struct ClusterPolicyClient {
    api: Api<ClusterPolicy>,
}

impl ClusterPolicyClient {
    pub fn new(k8s_client: Client) -> Self {
        Self {
            api: Api::all(k8s_client),
        }
    }

    /// Wait predicate: the operator reports the policy `ready`.
    pub async fn is_ready(&self, name: &str) -> bool {
        self.api
            .get_opt(name)
            .await
            .ok()
            .flatten()
            .map(|cluster_policy| cluster_policy.is_ready())
            .unwrap_or(false)
    }

    /// Replace the object with a locally modified copy. The copy must carry
    /// the `resourceVersion` it was read at.
    pub async fn replace(&self, cluster_policy: &ClusterPolicy) -> Result<ClusterPolicy> {
        let name = cluster_policy.name_any();
        Ok(self
            .api
            .replace(&name, &PostParams::default(), cluster_policy)
            .await
            .context(error::KubeApiCallForSnafu {
                operation: "replace",
                name,
            })?)
    }
}

impl CrdClient for ClusterPolicyClient {
    type Crd = ClusterPolicy;

    fn kind(&self) -> &'static str {
        "clusterpolicy"
    }

    fn api(&self) -> &Api<Self::Crd> {
        &self.api
    }

    fn namespace(&self) -> &str {
        "-"
    }
}

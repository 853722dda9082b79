use super::crd_client::CrdClient;
use super::error::Result;
use crate::ocp::{ClusterVersion, CLUSTER_VERSION_NAME};
use kube::{Api, Client};

/// Client for the cluster-scoped `ClusterVersion` singleton.
#[derive(Clone)]
pub struct ClusterVersionClient {
    api: Api<ClusterVersion>,
}

impl ClusterVersionClient {
    pub fn new(k8s_client: Client) -> Self {
        Self {
            api: Api::all(k8s_client),
        }
    }

    /// The platform version string, e.g. `4.14.8`.
    pub async fn platform_version(&self) -> Result<Option<String>> {
        Ok(self
            .get(CLUSTER_VERSION_NAME)
            .await?
            .version()
            .map(str::to_string))
    }
}

impl CrdClient for ClusterVersionClient {
    type Crd = ClusterVersion;

    fn kind(&self) -> &'static str {
        "clusterversion"
    }

    fn api(&self) -> &Api<Self::Crd> {
        &self.api
    }

    fn namespace(&self) -> &str {
        "-"
    }
}

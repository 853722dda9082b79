use super::crd_client::CrdClient;
use crate::nfd::NodeFeatureDiscovery;
use kube::{Api, Client};

/// Client for `NodeFeatureDiscovery` custom resources.
#[derive(Clone)]
pub struct NfdClient {
    api: Api<NodeFeatureDiscovery>,
    namespace: String,
}

impl NfdClient {
    pub fn new(k8s_client: Client, namespace: &str) -> Self {
        Self {
            api: Api::namespaced(k8s_client, namespace),
            namespace: namespace.to_string(),
        }
    }
}

impl CrdClient for NfdClient {
    type Crd = NodeFeatureDiscovery;

    fn kind(&self) -> &'static str {
        "nodefeaturediscovery"
    }

    fn api(&self) -> &Api<Self::Crd> {
        &self.api
    }

    fn namespace(&self) -> &str {
        &self.namespace
    }
}

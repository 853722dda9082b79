use super::error::{self, Result};
use kube::api::{DeleteParams, ListParams, LogParams, ObjectMeta, PostParams};
use kube::{Api, Client, ResourceExt};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Node, Pod};
use snafu::{IntoError, ResultExt};
use std::collections::BTreeMap;

/// Helpers over the plain (non-CRD) Kubernetes objects the suite touches:
/// namespaces, deployments, config maps, pods and nodes.
#[derive(Clone)]
pub struct CoreClient {
    k8s_client: Client,
}

impl CoreClient {
    pub fn new(k8s_client: Client) -> Self {
        Self { k8s_client }
    }

    /// A namespace object carrying the given labels.
    pub fn labeled_namespace(name: &str, labels: BTreeMap<String, String>) -> Namespace {
        Namespace {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                labels: Some(labels),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Create the namespace unless it already exists.
    pub async fn ensure_namespace(&self, namespace: Namespace) -> Result<Namespace> {
        let api: Api<Namespace> = Api::all(self.k8s_client.clone());
        let name = namespace.name_any();
        if let Some(existing) = api.get_opt(&name).await.context(error::KubeApiCallSnafu {
            method: "get",
            what: "namespace",
        })? {
            return Ok(existing);
        }
        Ok(api
            .create(&PostParams::default(), &namespace)
            .await
            .context(error::KubeApiCallSnafu {
                method: "create",
                what: "namespace",
            })?)
    }

    pub async fn delete_namespace(&self, name: &str) -> Result<()> {
        let api: Api<Namespace> = Api::all(self.k8s_client.clone());
        allow_not_found(api.delete(name, &DeleteParams::default()).await, "namespace")
    }

    /// Wait predicate: the deployment object exists.
    pub async fn deployment_exists(&self, namespace: &str, name: &str) -> bool {
        let api: Api<Deployment> = Api::namespaced(self.k8s_client.clone(), namespace);
        matches!(api.get_opt(name).await, Ok(Some(_)))
    }

    /// Wait predicate: every requested replica of the deployment is ready.
    pub async fn deployment_ready(&self, namespace: &str, name: &str) -> bool {
        let api: Api<Deployment> = Api::namespaced(self.k8s_client.clone(), namespace);
        let deployment = match api.get_opt(name).await {
            Ok(Some(deployment)) => deployment,
            _ => return false,
        };
        let requested = deployment
            .spec
            .as_ref()
            .and_then(|spec| spec.replicas)
            .unwrap_or(1);
        let ready = deployment
            .status
            .as_ref()
            .and_then(|status| status.ready_replicas)
            .unwrap_or(0);
        ready >= requested && ready > 0
    }

    pub async fn create_config_map(&self, config_map: ConfigMap) -> Result<ConfigMap> {
        let namespace = config_map.namespace().unwrap_or_default();
        let api: Api<ConfigMap> = Api::namespaced(self.k8s_client.clone(), &namespace);
        Ok(api
            .create(&PostParams::default(), &config_map)
            .await
            .context(error::KubeApiCallSnafu {
                method: "create",
                what: "configmap",
            })?)
    }

    pub async fn delete_config_map(&self, namespace: &str, name: &str) -> Result<()> {
        let api: Api<ConfigMap> = Api::namespaced(self.k8s_client.clone(), namespace);
        allow_not_found(api.delete(name, &DeleteParams::default()).await, "configmap")
    }

    pub async fn create_pod(&self, pod: Pod) -> Result<Pod> {
        let namespace = pod.namespace().unwrap_or_default();
        let api: Api<Pod> = Api::namespaced(self.k8s_client.clone(), &namespace);
        Ok(api
            .create(&PostParams::default(), &pod)
            .await
            .context(error::KubeApiCallSnafu {
                method: "create",
                what: "pod",
            })?)
    }

    pub async fn delete_pod(&self, namespace: &str, name: &str) -> Result<()> {
        let api: Api<Pod> = Api::namespaced(self.k8s_client.clone(), namespace);
        allow_not_found(api.delete(name, &DeleteParams::default()).await, "pod")
    }

    /// Wait predicate: the pod object exists.
    pub async fn pod_exists(&self, namespace: &str, name: &str) -> bool {
        let api: Api<Pod> = Api::namespaced(self.k8s_client.clone(), namespace);
        matches!(api.get_opt(name).await, Ok(Some(_)))
    }

    /// Wait predicate: the pod reports the given phase. A missing pod or a
    /// failed lookup reads as "not yet".
    pub async fn pod_in_phase(&self, namespace: &str, name: &str, phase: &str) -> bool {
        let api: Api<Pod> = Api::namespaced(self.k8s_client.clone(), namespace);
        match api.get_opt(name).await {
            Ok(Some(pod)) => {
                pod.status.and_then(|status| status.phase).as_deref() == Some(phase)
            }
            _ => false,
        }
    }

    /// The name of the first pod matching `selector`, e.g. `app=gpu-burn-app`.
    pub async fn first_pod_name(&self, namespace: &str, selector: &str) -> Result<Option<String>> {
        let api: Api<Pod> = Api::namespaced(self.k8s_client.clone(), namespace);
        Ok(api
            .list(&ListParams::default().labels(selector))
            .await
            .context(error::KubeApiCallSnafu {
                method: "list",
                what: "pod",
            })?
            .items
            .first()
            .map(|pod| pod.name_any()))
    }

    pub async fn pod_logs(&self, namespace: &str, name: &str, container: &str) -> Result<String> {
        let api: Api<Pod> = Api::namespaced(self.k8s_client.clone(), namespace);
        let log_params = LogParams {
            container: Some(container.to_string()),
            ..Default::default()
        };
        Ok(api
            .logs(name, &log_params)
            .await
            .context(error::KubeApiCallForSnafu {
                operation: "get logs",
                name,
            })?)
    }

    /// Delete every pod matching `selector` in `namespace`.
    pub async fn delete_pods_with_label(&self, namespace: &str, selector: &str) -> Result<()> {
        let api: Api<Pod> = Api::namespaced(self.k8s_client.clone(), namespace);
        api.delete_collection(
            &DeleteParams::default(),
            &ListParams::default().labels(selector),
        )
        .await
        .context(error::KubeApiCallSnafu {
            method: "delete_collection",
            what: "pod",
        })?;
        Ok(())
    }

    pub async fn nodes_with_labels(&self, selector: &str) -> Result<Vec<Node>> {
        let api: Api<Node> = Api::all(self.k8s_client.clone());
        Ok(api
            .list(&ListParams::default().labels(selector))
            .await
            .context(error::KubeApiCallSnafu {
                method: "list",
                what: "node",
            })?
            .items)
    }

    /// `true` when at least one node matches `selector`.
    pub async fn any_node_with_labels(&self, selector: &str) -> Result<bool> {
        Ok(!self.nodes_with_labels(selector).await?.is_empty())
    }

    /// `true` when every node matching `node_selector` carries
    /// `label=value`.
    pub async fn all_nodes_labeled(
        &self,
        node_selector: &str,
        label: &str,
        value: &str,
    ) -> Result<bool> {
        let nodes = self.nodes_with_labels(node_selector).await?;
        Ok(!nodes.is_empty()
            && nodes.iter().all(|node| {
                node.labels().get(label).map(String::as_str) == Some(value)
            }))
    }

    /// The CPU architecture of the first node matching `selector`, as
    /// reported by the kubelet (`amd64`, `arm64`, ...).
    pub async fn node_architecture(&self, selector: &str) -> Result<Option<String>> {
        Ok(self
            .nodes_with_labels(selector)
            .await?
            .into_iter()
            .next()
            .and_then(|node| node.status)
            .and_then(|status| status.node_info)
            .map(|info| info.architecture))
    }
}

fn allow_not_found<T>(
    result: std::result::Result<T, kube::Error>,
    what: &str,
) -> Result<()> {
    match result {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(response)) if response.code == 404 => Ok(()),
        Err(source) => Err(error::KubeApiCallSnafu {
            method: "delete",
            what,
        }
        .into_error(source)
        .into()),
    }
}

/*!

The Node Feature Discovery operator's custom resource. Like the GPU
`ClusterPolicy`, the instance is created from the NFD CSV's alm-examples and
the suite never edits it, so the whole spec is carried as-is.

!*/

use crate::error::{self, Result};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use snafu::ResultExt;

pub const NODE_FEATURE_DISCOVERY_KIND: &str = "NodeFeatureDiscovery";

#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
    derive = "Default",
    derive = "PartialEq",
    group = "nfd.openshift.io",
    kind = "NodeFeatureDiscovery",
    namespaced,
    plural = "nodefeaturediscoveries",
    version = "v1"
)]
pub struct NodeFeatureDiscoverySpec {
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl NodeFeatureDiscovery {
    /// Build the CR from an alm-example object, pinned to `namespace`.
    pub fn from_alm_example(example: Value, namespace: &str) -> Result<Self> {
        let mut instance: NodeFeatureDiscovery = serde_json::from_value(example)
            .context(error::AlmExampleDeserializeSnafu {
                kind: NODE_FEATURE_DISCOVERY_KIND,
            })?;
        instance.metadata.namespace = Some(namespace.to_string());
        instance.metadata.resource_version = None;
        instance.metadata.uid = None;
        Ok(instance)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn alm_example_keeps_the_operand_configuration() {
        let instance = NodeFeatureDiscovery::from_alm_example(
            json!({
                "apiVersion": "nfd.openshift.io/v1",
                "kind": "NodeFeatureDiscovery",
                "metadata": {"name": "nfd-instance", "namespace": "openshift-operators"},
                "spec": {
                    "operand": {"image": "registry.redhat.io/openshift4/ose-node-feature-discovery:latest"},
                    "workerConfig": {"configData": "core:\n  sleepInterval: 60s"}
                }
            }),
            "openshift-nfd",
        )
        .unwrap();
        assert_eq!(instance.metadata.namespace.as_deref(), Some("openshift-nfd"));
        let value = serde_json::to_value(&instance).unwrap();
        assert_eq!(
            value["spec"]["operand"]["image"],
            "registry.redhat.io/openshift4/ose-node-feature-discovery:latest"
        );
        assert!(value["spec"]["workerConfig"]["configData"]
            .as_str()
            .unwrap()
            .contains("sleepInterval"));
    }
}

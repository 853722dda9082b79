/*!

The GPU Operator's `ClusterPolicy` custom resource. The suite instantiates it
from the CSV's alm-examples, so the spec keeps every field it does not touch
in a flattened map and only types the handful of paths the upgrade case
rewrites.

!*/

use crate::error::{self, Result};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use snafu::ResultExt;

pub const CLUSTER_POLICY_STATE_READY: &str = "ready";
pub const CLUSTER_POLICY_KIND: &str = "ClusterPolicy";

/// Desired GPU Operator configuration; its readiness gates the driver and
/// device-plugin rollout. Cluster-scoped.
#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
    derive = "Default",
    derive = "PartialEq",
    group = "nvidia.com",
    kind = "ClusterPolicy",
    plural = "clusterpolicies",
    status = "ClusterPolicyStatus",
    version = "v1"
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterPolicySpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daemonsets: Option<DaemonsetsSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<DriverSpec>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DaemonsetsSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rolling_update: Option<RollingUpdateSpec>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RollingUpdateSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_unavailable: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upgrade_policy: Option<DriverUpgradePolicySpec>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverUpgradePolicySpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_upgrade: Option<bool>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterPolicyStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl ClusterPolicy {
    /// Build a `ClusterPolicy` from one of the CSV's alm-example objects,
    /// stripped down to a creatable object.
    pub fn from_alm_example(example: Value) -> Result<Self> {
        let mut cluster_policy: ClusterPolicy = serde_json::from_value(example)
            .context(error::AlmExampleDeserializeSnafu {
                kind: CLUSTER_POLICY_KIND,
            })?;
        cluster_policy.metadata.resource_version = None;
        cluster_policy.metadata.uid = None;
        cluster_policy.status = None;
        Ok(cluster_policy)
    }

    /// The operator has finished rolling out every operand.
    pub fn is_ready(&self) -> bool {
        self.status
            .as_ref()
            .and_then(|status| status.state.as_deref())
            == Some(CLUSTER_POLICY_STATE_READY)
    }

    /// Upgrade preparation: constrain daemonset rollout to one unavailable
    /// pod and let the operator drive driver upgrades.
    pub fn prepare_for_upgrade(&mut self, max_unavailable: &str) {
        let daemonsets = self.spec.daemonsets.get_or_insert_with(Default::default);
        daemonsets
            .rolling_update
            .get_or_insert_with(Default::default)
            .max_unavailable = Some(max_unavailable.to_string());
        let driver = self.spec.driver.get_or_insert_with(Default::default);
        driver
            .upgrade_policy
            .get_or_insert_with(Default::default)
            .auto_upgrade = Some(true);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    fn example() -> Value {
        json!({
            "apiVersion": "nvidia.com/v1",
            "kind": "ClusterPolicy",
            "metadata": {"name": "gpu-cluster-policy"},
            "spec": {
                "operator": {"defaultRuntime": "crio"},
                "driver": {"enabled": true, "useOpenKernelModules": false},
                "devicePlugin": {"enabled": true},
                "daemonsets": {"updateStrategy": "RollingUpdate"}
            }
        })
    }

    #[test]
    fn alm_example_round_trips_without_dropping_unknown_fields() {
        let cluster_policy = ClusterPolicy::from_alm_example(example()).unwrap();
        let value = serde_json::to_value(&cluster_policy).unwrap();
        assert_eq!(value["spec"]["operator"]["defaultRuntime"], "crio");
        assert_eq!(value["spec"]["driver"]["enabled"], true);
        assert_eq!(value["spec"]["devicePlugin"]["enabled"], true);
        assert_eq!(value["spec"]["daemonsets"]["updateStrategy"], "RollingUpdate");
        assert_eq!(value["metadata"]["name"], "gpu-cluster-policy");
    }

    #[test]
    fn upgrade_preparation_fills_missing_paths() {
        let mut cluster_policy = ClusterPolicy::from_alm_example(example()).unwrap();
        cluster_policy.prepare_for_upgrade("1");
        let daemonsets = cluster_policy.spec.daemonsets.as_ref().unwrap();
        assert_eq!(
            daemonsets.rolling_update.as_ref().unwrap().max_unavailable,
            Some("1".to_string())
        );
        let driver = cluster_policy.spec.driver.as_ref().unwrap();
        assert_eq!(
            driver.upgrade_policy.as_ref().unwrap().auto_upgrade,
            Some(true)
        );
        // Untouched daemonset fields survive the rewrite.
        assert_eq!(
            daemonsets.other.get("updateStrategy"),
            Some(&Value::String("RollingUpdate".to_string()))
        );
    }

    #[test]
    fn readiness_requires_the_ready_state() {
        let mut cluster_policy = ClusterPolicy::from_alm_example(example()).unwrap();
        assert!(!cluster_policy.is_ready());
        cluster_policy.status = Some(ClusterPolicyStatus {
            state: Some("notReady".to_string()),
            namespace: None,
        });
        assert!(!cluster_policy.is_ready());
        cluster_policy.status = Some(ClusterPolicyStatus {
            state: Some(CLUSTER_POLICY_STATE_READY.to_string()),
            namespace: Some("nvidia-gpu-operator".to_string()),
        });
        assert!(cluster_policy.is_ready());
    }
}

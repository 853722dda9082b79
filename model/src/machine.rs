/*!

OpenShift `MachineSet` objects, used when the cluster has no GPU node and the
suite is allowed to scale one in. A GPU machineset is always cloned from an
existing worker machineset, so the spec types only `replicas` and keeps the
provider-specific remainder as raw JSON that gets selectively rewritten.

!*/

use crate::constants::MACHINESET_NAME_LABEL;
use crate::error::{self, Result};
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use snafu::OptionExt;

#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
    derive = "Default",
    derive = "PartialEq",
    group = "machine.openshift.io",
    kind = "MachineSet",
    namespaced,
    plural = "machinesets",
    status = "MachineSetStatus",
    version = "v1beta1"
)]
#[serde(rename_all = "camelCase")]
pub struct MachineSetSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineSetStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready_replicas: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_replicas: Option<i32>,
}

impl MachineSet {
    /// At least one machine replica has booted and joined.
    pub fn has_ready_replica(&self) -> bool {
        self.status
            .as_ref()
            .and_then(|status| status.ready_replicas)
            .unwrap_or(0)
            > 0
    }

    /// Clone this machineset into a creatable copy named `name` with
    /// `replicas` machines of `instance_type`. The machineset name label in
    /// the selector and machine template is rewritten to the new name so the
    /// clone selects only its own machines.
    pub fn cloned_with_instance_type(
        &self,
        name: &str,
        instance_type: &str,
        replicas: i32,
    ) -> Result<Self> {
        let mut machine_set = self.clone();
        let source_name = self.name_any();

        machine_set.metadata = Default::default();
        machine_set.metadata.name = Some(name.to_string());
        machine_set.metadata.namespace = self.metadata.namespace.clone();
        machine_set.status = None;
        machine_set.spec.replicas = Some(replicas);

        set_path(
            &mut machine_set.spec.other,
            &["selector", "matchLabels", MACHINESET_NAME_LABEL],
            Value::String(name.to_string()),
            &source_name,
        )?;
        set_path(
            &mut machine_set.spec.other,
            &["template", "metadata", "labels", MACHINESET_NAME_LABEL],
            Value::String(name.to_string()),
            &source_name,
        )?;
        set_path(
            &mut machine_set.spec.other,
            &["template", "spec", "providerSpec", "value", "instanceType"],
            Value::String(instance_type.to_string()),
            &source_name,
        )?;
        Ok(machine_set)
    }
}

/// Replace the value at `path`, requiring every intermediate object to exist
/// already: a machineset without a provider spec is not something the suite
/// can clone.
fn set_path(
    root: &mut Map<String, Value>,
    path: &[&str],
    value: Value,
    machine_set_name: &str,
) -> Result<()> {
    let missing = || error::ProviderSpecPathSnafu {
        name: machine_set_name,
        path: path.join("."),
    };
    let (last, intermediate) = match path.split_last() {
        Some(split) => split,
        None => return Ok(()),
    };
    let mut current = root;
    for key in intermediate {
        current = current
            .get_mut(*key)
            .and_then(Value::as_object_mut)
            .context(missing())?;
    }
    current.insert((*last).to_string(), value);
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    fn worker_machine_set() -> MachineSet {
        let mut machine_set: MachineSet = serde_json::from_value(json!({
            "apiVersion": "machine.openshift.io/v1beta1",
            "kind": "MachineSet",
            "metadata": {
                "name": "ci-cluster-worker-us-east-1a",
                "namespace": "openshift-machine-api",
                "resourceVersion": "12345",
                "uid": "aaaa-bbbb"
            },
            "spec": {
                "replicas": 3,
                "selector": {
                    "matchLabels": {
                        "machine.openshift.io/cluster-api-machineset": "ci-cluster-worker-us-east-1a"
                    }
                },
                "template": {
                    "metadata": {
                        "labels": {
                            "machine.openshift.io/cluster-api-machine-role": "worker",
                            "machine.openshift.io/cluster-api-machineset": "ci-cluster-worker-us-east-1a"
                        }
                    },
                    "spec": {
                        "providerSpec": {
                            "value": {
                                "instanceType": "m6i.xlarge",
                                "placement": {"availabilityZone": "us-east-1a"}
                            }
                        }
                    }
                }
            }
        }))
        .unwrap();
        machine_set.status = Some(MachineSetStatus {
            replicas: Some(3),
            ready_replicas: Some(3),
            available_replicas: Some(3),
        });
        machine_set
    }

    #[test]
    fn clone_rewrites_name_labels_and_instance_type() {
        let clone = worker_machine_set()
            .cloned_with_instance_type("ci-cluster-gpu-us-east-1a", "g4dn.xlarge", 1)
            .unwrap();
        assert_eq!(clone.name_any(), "ci-cluster-gpu-us-east-1a");
        assert_eq!(clone.spec.replicas, Some(1));
        assert!(clone.status.is_none());
        assert!(clone.metadata.resource_version.is_none());

        let value = serde_json::to_value(&clone).unwrap();
        assert_eq!(
            value["spec"]["selector"]["matchLabels"][MACHINESET_NAME_LABEL],
            "ci-cluster-gpu-us-east-1a"
        );
        assert_eq!(
            value["spec"]["template"]["metadata"]["labels"][MACHINESET_NAME_LABEL],
            "ci-cluster-gpu-us-east-1a"
        );
        assert_eq!(
            value["spec"]["template"]["spec"]["providerSpec"]["value"]["instanceType"],
            "g4dn.xlarge"
        );
        // Provider fields the clone does not touch are preserved.
        assert_eq!(
            value["spec"]["template"]["spec"]["providerSpec"]["value"]["placement"]
                ["availabilityZone"],
            "us-east-1a"
        );
    }

    #[test]
    fn clone_refuses_a_machineset_without_a_provider_spec() {
        let mut machine_set = worker_machine_set();
        machine_set.spec.other.remove("template");
        let err = machine_set
            .cloned_with_instance_type("gpu", "g4dn.xlarge", 1)
            .unwrap_err();
        assert!(err.to_string().contains("template"));
    }

    #[test]
    fn readiness_requires_a_ready_replica() {
        let mut machine_set = worker_machine_set();
        assert!(machine_set.has_ready_replica());
        machine_set.status = Some(MachineSetStatus {
            replicas: Some(1),
            ready_replicas: Some(0),
            available_replicas: Some(0),
        });
        assert!(!machine_set.has_ready_replica());
        machine_set.status = None;
        assert!(!machine_set.has_ready_replica());
    }
}

/*!

Object definitions for the Operator Lifecycle Manager APIs the suite drives:
catalog sources, operator groups, subscriptions, cluster service versions and
package manifests. Only the fields the suite reads or writes are typed;
everything else rides along in flattened maps so objects read from the
cluster round-trip unmodified.

!*/

use crate::error::{self, Result};
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use snafu::{OptionExt, ResultExt};

pub const ALM_EXAMPLES_ANNOTATION: &str = "alm-examples";
pub const CSV_PHASE_SUCCEEDED: &str = "Succeeded";
pub const CATALOG_STATE_READY: &str = "READY";
pub const INSTALL_PLAN_APPROVAL_AUTOMATIC: &str = "Automatic";

/// A registry of installable operator packages.
#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
    derive = "Default",
    derive = "PartialEq",
    group = "operators.coreos.com",
    kind = "CatalogSource",
    namespaced,
    plural = "catalogsources",
    status = "CatalogSourceStatus",
    version = "v1alpha1"
)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSourceSpec {
    pub source_type: String,
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSourceStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_state: Option<CatalogConnectionState>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogConnectionState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_observed_state: Option<String>,
}

impl CatalogSource {
    /// A grpc catalog source serving `index_image`.
    pub fn with_index_image(
        name: &str,
        namespace: &str,
        index_image: &str,
        display_name: &str,
        publisher: &str,
    ) -> Self {
        let mut catalog_source = CatalogSource::new(
            name,
            CatalogSourceSpec {
                source_type: "grpc".to_string(),
                image: index_image.to_string(),
                display_name: Some(display_name.to_string()),
                publisher: Some(publisher.to_string()),
            },
        );
        catalog_source.metadata.namespace = Some(namespace.to_string());
        catalog_source
    }

    /// The registry pod has connected and the catalog is serving.
    pub fn is_ready(&self) -> bool {
        self.status
            .as_ref()
            .and_then(|status| status.connection_state.as_ref())
            .and_then(|state| state.last_observed_state.as_deref())
            == Some(CATALOG_STATE_READY)
    }
}

/// Scopes OLM operator installation to a set of target namespaces.
#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
    derive = "Default",
    derive = "PartialEq",
    group = "operators.coreos.com",
    kind = "OperatorGroup",
    namespaced,
    plural = "operatorgroups",
    version = "v1"
)]
#[serde(rename_all = "camelCase")]
pub struct OperatorGroupSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_namespaces: Option<Vec<String>>,
}

impl OperatorGroup {
    /// An operator group targeting its own namespace.
    pub fn own_namespace(name: &str, namespace: &str) -> Self {
        let mut operator_group = OperatorGroup::new(
            name,
            OperatorGroupSpec {
                target_namespaces: Some(vec![namespace.to_string()]),
            },
        );
        operator_group.metadata.namespace = Some(namespace.to_string());
        operator_group
    }
}

/// A request for continuous installation of an operator package from a
/// catalog source and channel.
#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
    derive = "Default",
    derive = "PartialEq",
    group = "operators.coreos.com",
    kind = "Subscription",
    namespaced,
    plural = "subscriptions",
    status = "SubscriptionStatus",
    version = "v1alpha1"
)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionSpec {
    /// The package name.
    pub name: String,
    pub source: String,
    pub source_namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_plan_approval: Option<String>,
    #[serde(
        default,
        rename = "startingCSV",
        skip_serializing_if = "Option::is_none"
    )]
    pub starting_csv: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionStatus {
    #[serde(default, rename = "currentCSV", skip_serializing_if = "Option::is_none")]
    pub current_csv: Option<String>,
    #[serde(
        default,
        rename = "installedCSV",
        skip_serializing_if = "Option::is_none"
    )]
    pub installed_csv: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

/// Metadata describing an installed operator version and its install status.
#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
    derive = "Default",
    derive = "PartialEq",
    group = "operators.coreos.com",
    kind = "ClusterServiceVersion",
    namespaced,
    plural = "clusterserviceversions",
    status = "ClusterServiceVersionStatus",
    version = "v1alpha1"
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterServiceVersionSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterServiceVersionStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ClusterServiceVersion {
    pub fn phase(&self) -> Option<&str> {
        self.status.as_ref().and_then(|status| status.phase.as_deref())
    }

    pub fn succeeded(&self) -> bool {
        self.phase() == Some(CSV_PHASE_SUCCEEDED)
    }

    /// The sample custom resources published in the CSV's `alm-examples`
    /// annotation.
    pub fn alm_examples(&self) -> Result<Vec<Value>> {
        let raw = self
            .annotations()
            .get(ALM_EXAMPLES_ANNOTATION)
            .context(error::AlmExamplesMissingSnafu {
                csv: self.name_any(),
            })?;
        Ok(serde_json::from_str(raw).context(error::AlmExamplesParseSnafu {
            csv: self.name_any(),
        })?)
    }

    /// The first alm-example of the given kind.
    pub fn alm_example_of_kind(&self, kind: &str) -> Result<Value> {
        Ok(self
            .alm_examples()?
            .into_iter()
            .find(|example| example.get("kind").and_then(Value::as_str) == Some(kind))
            .context(error::AlmExampleKindSnafu {
                csv: self.name_any(),
                kind,
            })?)
    }
}

/// An installable package as advertised by a catalog. Read-only for the
/// suite; served by the package server rather than stored as a CRD.
#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
    derive = "Default",
    derive = "PartialEq",
    group = "packages.operators.coreos.com",
    kind = "PackageManifest",
    namespaced,
    plural = "packagemanifests",
    status = "PackageManifestStatus",
    version = "v1"
)]
pub struct PackageManifestSpec {}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageManifestStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_source_namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_channel: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub channels: Vec<PackageChannel>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageChannel {
    pub name: String,
    #[serde(default, rename = "currentCSV", skip_serializing_if = "Option::is_none")]
    pub current_csv: Option<String>,
}

impl PackageManifest {
    pub fn default_channel(&self) -> Option<&str> {
        self.status
            .as_ref()
            .and_then(|status| status.default_channel.as_deref())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn subscription_serializes_olm_field_names() {
        let subscription = Subscription::new(
            "gpu-operator-certified",
            SubscriptionSpec {
                name: "gpu-operator-certified".to_string(),
                source: "certified-operators".to_string(),
                source_namespace: "openshift-marketplace".to_string(),
                channel: Some("v23.9".to_string()),
                install_plan_approval: Some(INSTALL_PLAN_APPROVAL_AUTOMATIC.to_string()),
                starting_csv: Some("gpu-operator-certified.v23.9.0".to_string()),
            },
        );
        let value = serde_json::to_value(&subscription).unwrap();
        let spec = &value["spec"];
        assert_eq!(spec["sourceNamespace"], "openshift-marketplace");
        assert_eq!(spec["installPlanApproval"], "Automatic");
        assert_eq!(spec["startingCSV"], "gpu-operator-certified.v23.9.0");
        assert!(spec.get("starting_csv").is_none());
    }

    #[test]
    fn catalog_source_readiness_tracks_connection_state() {
        let mut catalog = CatalogSource::with_index_image(
            "certified-operators-custom",
            "openshift-marketplace",
            "registry.example.com/custom-index:v1",
            "Custom catalog",
            "e2e",
        );
        assert!(!catalog.is_ready());
        catalog.status = Some(CatalogSourceStatus {
            connection_state: Some(CatalogConnectionState {
                last_observed_state: Some("CONNECTING".to_string()),
            }),
        });
        assert!(!catalog.is_ready());
        catalog.status = Some(CatalogSourceStatus {
            connection_state: Some(CatalogConnectionState {
                last_observed_state: Some(CATALOG_STATE_READY.to_string()),
            }),
        });
        assert!(catalog.is_ready());
    }

    #[test]
    fn alm_example_lookup_finds_the_requested_kind() {
        let mut csv = ClusterServiceVersion::new(
            "gpu-operator-certified.v23.9.0",
            ClusterServiceVersionSpec::default(),
        );
        csv.annotations_mut().insert(
            ALM_EXAMPLES_ANNOTATION.to_string(),
            r#"[
                {"apiVersion":"nvidia.com/v1alpha1","kind":"NVIDIADriver","metadata":{"name":"demo"}},
                {"apiVersion":"nvidia.com/v1","kind":"ClusterPolicy","metadata":{"name":"gpu-cluster-policy"},"spec":{"driver":{"enabled":true}}}
            ]"#
            .to_string(),
        );
        let example = csv.alm_example_of_kind("ClusterPolicy").unwrap();
        assert_eq!(example["metadata"]["name"], "gpu-cluster-policy");
        assert!(csv.alm_example_of_kind("Unknown").is_err());
    }

    #[test]
    fn csv_phase_gates_success() {
        let mut csv = ClusterServiceVersion::new(
            "nfd.v4.14.0",
            ClusterServiceVersionSpec {
                version: Some("4.14.0".to_string()),
                ..Default::default()
            },
        );
        assert!(!csv.succeeded());
        csv.status = Some(ClusterServiceVersionStatus {
            phase: Some("Installing".to_string()),
            ..Default::default()
        });
        assert!(!csv.succeeded());
        csv.status = Some(ClusterServiceVersionStatus {
            phase: Some(CSV_PHASE_SUCCEEDED.to_string()),
            ..Default::default()
        });
        assert!(csv.succeeded());
    }
}

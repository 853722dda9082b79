//! The OpenShift `ClusterVersion` object, read once per run to record the
//! platform version in the report files.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Name of the singleton `ClusterVersion` object.
pub const CLUSTER_VERSION_NAME: &str = "version";

#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
    derive = "Default",
    derive = "PartialEq",
    group = "config.openshift.io",
    kind = "ClusterVersion",
    plural = "clusterversions",
    status = "ClusterVersionStatus",
    version = "v1"
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterVersionSpec {
    #[serde(default, rename = "clusterID", skip_serializing_if = "Option::is_none")]
    pub cluster_id: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterVersionStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desired: Option<ReleaseInfo>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl ClusterVersion {
    pub fn version(&self) -> Option<&str> {
        self.status
            .as_ref()
            .and_then(|status| status.desired.as_ref())
            .and_then(|desired| desired.version.as_deref())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn version_comes_from_the_desired_release() {
        let mut cluster_version =
            ClusterVersion::new(CLUSTER_VERSION_NAME, ClusterVersionSpec::default());
        assert_eq!(cluster_version.version(), None);
        cluster_version.status = Some(ClusterVersionStatus {
            desired: Some(ReleaseInfo {
                version: Some("4.14.8".to_string()),
            }),
        });
        assert_eq!(cluster_version.version(), Some("4.14.8"));
    }
}

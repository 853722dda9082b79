use model::constants::{GPU_CATALOG_SOURCE_DEFAULT, GPU_DEFAULT_BUNDLE_IMAGE};
use serde::Deserialize;
use std::path::PathBuf;

/// The prefix for every environment variable the suite reads.
pub const ENV_PREFIX: &str = "NVIDIAGPU_";

/// Suite configuration, read once from `NVIDIAGPU_*` environment variables
/// at startup and passed by reference into the test cases.
#[derive(Clone, Debug, Deserialize)]
pub struct EnvConfig {
    /// The catalog source to install the GPU operator from.
    ///
    /// # Example
    ///
    /// ```text
    /// NVIDIAGPU_CATALOG_SOURCE=certified-operators
    /// ```
    #[serde(default = "default_catalog_source")]
    pub catalog_source: String,

    /// The subscription channel to install the GPU operator from. Defaults
    /// to the package's default channel.
    #[serde(default)]
    pub subscription_channel: Option<String>,

    /// Whether to delete created cluster objects after each test case.
    #[serde(default = "default_cleanup")]
    pub cleanup: bool,

    /// Deploy the GPU operator from a bundle image instead of a catalog.
    #[serde(default)]
    pub deploy_from_bundle: bool,

    /// The bundle image to deploy when `deploy_from_bundle` is set.
    #[serde(default = "default_bundle_image")]
    pub bundle_image: String,

    /// The channel to switch the GPU operator subscription to. When unset,
    /// the upgrade test case is skipped.
    #[serde(default)]
    pub upgrade_to_channel: Option<String>,

    /// Index image for a custom GPU catalog source, used when the GPU
    /// package is missing from the default catalog.
    #[serde(default)]
    pub gpu_fallback_index_image: Option<String>,

    /// Index image for a custom NFD catalog source, used when the NFD
    /// package is missing from the default catalog.
    #[serde(default)]
    pub nfd_fallback_index_image: Option<String>,

    /// Instance type for a GPU machineset. When unset and the cluster has no
    /// GPU node, the deploy test case is skipped instead of scaling.
    #[serde(default)]
    pub machineset_instance_type: Option<String>,

    /// Directory the version report files are written to.
    #[serde(default = "default_reports_dir")]
    pub reports_dir: PathBuf,
}

impl EnvConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::prefixed(ENV_PREFIX).from_env()
    }

    /// The suite may add a GPU machineset when no GPU node exists.
    pub fn scale_cluster(&self) -> bool {
        self.machineset_instance_type.is_some()
    }

    /// The upgrade test case will run.
    pub fn upgrade_requested(&self) -> bool {
        self.upgrade_to_channel.is_some()
    }
}

fn default_catalog_source() -> String {
    GPU_CATALOG_SOURCE_DEFAULT.to_string()
}

fn default_cleanup() -> bool {
    true
}

fn default_bundle_image() -> String {
    GPU_DEFAULT_BUNDLE_IMAGE.to_string()
}

fn default_reports_dir() -> PathBuf {
    PathBuf::from(".")
}

#[cfg(test)]
mod test {
    use super::*;

    fn from_vars(vars: Vec<(&str, &str)>) -> EnvConfig {
        envy::prefixed(ENV_PREFIX)
            .from_iter(
                vars.into_iter()
                    .map(|(k, v)| (k.to_string(), v.to_string())),
            )
            .unwrap()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = from_vars(Vec::new());
        assert_eq!(config.catalog_source, GPU_CATALOG_SOURCE_DEFAULT);
        assert_eq!(config.subscription_channel, None);
        assert!(config.cleanup);
        assert!(!config.deploy_from_bundle);
        assert_eq!(config.bundle_image, GPU_DEFAULT_BUNDLE_IMAGE);
        assert!(!config.upgrade_requested());
        assert!(!config.scale_cluster());
        assert_eq!(config.reports_dir, PathBuf::from("."));
    }

    #[test]
    fn environment_values_override_defaults() {
        let config = from_vars(vec![
            ("NVIDIAGPU_CATALOG_SOURCE", "my-catalog"),
            ("NVIDIAGPU_SUBSCRIPTION_CHANNEL", "v23.9"),
            ("NVIDIAGPU_CLEANUP", "false"),
            ("NVIDIAGPU_DEPLOY_FROM_BUNDLE", "true"),
            ("NVIDIAGPU_UPGRADE_TO_CHANNEL", "v24.3"),
            ("NVIDIAGPU_MACHINESET_INSTANCE_TYPE", "g4dn.xlarge"),
            ("NVIDIAGPU_REPORTS_DIR", "/tmp/reports"),
        ]);
        assert_eq!(config.catalog_source, "my-catalog");
        assert_eq!(config.subscription_channel.as_deref(), Some("v23.9"));
        assert!(!config.cleanup);
        assert!(config.deploy_from_bundle);
        assert_eq!(config.upgrade_to_channel.as_deref(), Some("v24.3"));
        assert!(config.upgrade_requested());
        assert!(config.scale_cluster());
        assert_eq!(config.reports_dir, PathBuf::from("/tmp/reports"));
    }
}

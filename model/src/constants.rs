// Namespaces
pub const GPU_NAMESPACE: &str = "nvidia-gpu-operator";
pub const NFD_NAMESPACE: &str = "openshift-nfd";
pub const BURN_NAMESPACE: &str = "test-gpu-burn";
pub const MACHINE_API_NAMESPACE: &str = "openshift-machine-api";
pub const MARKETPLACE_NAMESPACE: &str = "openshift-marketplace";
pub const OLM_NAMESPACE: &str = "openshift-operator-lifecycle-manager";

// Operator packages and the catalogs they are expected in
pub const GPU_PACKAGE: &str = "gpu-operator-certified";
pub const NFD_PACKAGE: &str = "nfd";
pub const GPU_CATALOG_SOURCE_DEFAULT: &str = "certified-operators";
pub const NFD_CATALOG_SOURCE_DEFAULT: &str = "redhat-operators";
pub const CUSTOM_CATALOG_SUFFIX: &str = "-custom";

// Object names used by the install steps
pub const GPU_OPERATOR_GROUP: &str = "gpu-operator-group";
pub const GPU_SUBSCRIPTION: &str = "gpu-operator-certified";
pub const GPU_OPERATOR_DEPLOYMENT: &str = "gpu-operator";
pub const CLUSTER_POLICY_NAME: &str = "gpu-cluster-policy";
pub const NFD_OPERATOR_GROUP: &str = "nfd-operator-group";
pub const NFD_SUBSCRIPTION: &str = "nfd";
pub const NFD_OPERATOR_DEPLOYMENT: &str = "nfd-controller-manager";
pub const NFD_CR_NAME: &str = "nfd-instance";

// Burn workload
pub const BURN_POD_NAME: &str = "gpu-burn";
pub const BURN_CONTAINER_NAME: &str = "gpu-burn-ctr";
pub const BURN_CONFIGMAP_NAME: &str = "gpu-burn-entrypoint";
pub const BURN_POD_LABEL: &str = "app=gpu-burn-app";

// Node labels
pub const GPU_NODE_LABEL: &str = "feature.node.kubernetes.io/pci-10de.present";
pub const NFD_OS_RELEASE_LABEL: &str = "feature.node.kubernetes.io/system-os_release.ID";
pub const NFD_OS_RELEASE_VALUE: &str = "rhcos";
pub const WORKER_NODE_LABEL: &str = "node-role.kubernetes.io/worker";
pub const MACHINE_ROLE_LABEL: &str = "machine.openshift.io/cluster-api-machine-role";
pub const MACHINESET_NAME_LABEL: &str = "machine.openshift.io/cluster-api-machineset";

// OLM pod selectors, used by the operator cache workaround
pub const CATALOG_OPERATOR_SELECTOR: &str = "app=catalog-operator";
pub const OLM_OPERATOR_SELECTOR: &str = "app=olm-operator";

// Default bundle image when deploying straight from a bundle
pub const GPU_DEFAULT_BUNDLE_IMAGE: &str =
    "registry.gitlab.com/nvidia/kubernetes/gpu-operator/staging/gpu-operator-bundle:main-latest";

/// The burn workload image for a node architecture, `None` for architectures
/// without a published image.
pub fn burn_image(architecture: &str) -> Option<&'static str> {
    match architecture {
        "amd64" => Some("quay.io/wabouham/gpu_burn_amd64:ubi9"),
        "arm64" => Some("quay.io/wabouham/gpu_burn_arm64:ubi9"),
        _ => None,
    }
}

#[test]
fn burn_image_covers_supported_architectures() {
    assert!(burn_image("amd64").is_some());
    assert!(burn_image("arm64").is_some());
    assert!(burn_image("s390x").is_none());
}

use crate::config::EnvConfig;
use anyhow::{Context, Result};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use model::clients::{
    CatalogSourceClient, ClusterPolicyClient, ClusterVersionClient, CoreClient, CsvClient,
    MachineSetClient, NfdClient, OperatorGroupClient, PackageManifestClient, SubscriptionClient,
};
use model::constants::{MACHINE_API_NAMESPACE, MARKETPLACE_NAMESPACE, NFD_NAMESPACE};
use std::path::Path;

/// Everything a test case needs: the cluster client and the suite
/// configuration. Constructed once per run.
pub struct TestContext {
    pub k8s_client: Client,
    pub config: EnvConfig,
}

impl TestContext {
    pub async fn new(config: EnvConfig, kubeconfig: Option<&Path>) -> Result<Self> {
        let k8s_client = match kubeconfig {
            Some(path) => {
                let kubeconfig = Kubeconfig::read_from(path)
                    .with_context(|| format!("Unable to read kubeconfig '{}'", path.display()))?;
                let config =
                    Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                        .await
                        .context("Unable to load kubeconfig")?;
                config
                    .try_into()
                    .context("Unable to create client from kubeconfig")?
            }
            None => Client::try_default()
                .await
                .context("Unable to create default client")?,
        };
        Ok(Self { k8s_client, config })
    }

    pub fn core(&self) -> CoreClient {
        CoreClient::new(self.k8s_client.clone())
    }

    pub fn catalog_sources(&self) -> CatalogSourceClient {
        CatalogSourceClient::new(self.k8s_client.clone(), MARKETPLACE_NAMESPACE)
    }

    pub fn package_manifests(&self) -> PackageManifestClient {
        PackageManifestClient::new(self.k8s_client.clone(), MARKETPLACE_NAMESPACE)
    }

    pub fn operator_groups(&self, namespace: &str) -> OperatorGroupClient {
        OperatorGroupClient::new(self.k8s_client.clone(), namespace)
    }

    pub fn subscriptions(&self, namespace: &str) -> SubscriptionClient {
        SubscriptionClient::new(self.k8s_client.clone(), namespace)
    }

    pub fn csvs(&self, namespace: &str) -> CsvClient {
        CsvClient::new(self.k8s_client.clone(), namespace)
    }

    pub fn cluster_policies(&self) -> ClusterPolicyClient {
        ClusterPolicyClient::new(self.k8s_client.clone())
    }

    pub fn nfd_instances(&self) -> NfdClient {
        NfdClient::new(self.k8s_client.clone(), NFD_NAMESPACE)
    }

    pub fn machine_sets(&self) -> MachineSetClient {
        MachineSetClient::new(self.k8s_client.clone(), MACHINE_API_NAMESPACE)
    }

    pub fn cluster_versions(&self) -> ClusterVersionClient {
        ClusterVersionClient::new(self.k8s_client.clone())
    }
}

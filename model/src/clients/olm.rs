use super::crd_client::CrdClient;
use super::error::{self, Result};
use crate::olm::{
    CatalogSource, ClusterServiceVersion, OperatorGroup, PackageManifest, Subscription,
};
use kube::api::{ListParams, Patch, PatchParams};
use kube::{Api, Client, ResourceExt};
use snafu::ResultExt;

/// Client for `CatalogSource` objects, usually in `openshift-marketplace`.
#[derive(Clone)]
pub struct CatalogSourceClient {
    api: Api<CatalogSource>,
    namespace: String,
}

impl CatalogSourceClient {
    pub fn new(k8s_client: Client, namespace: &str) -> Self {
        Self {
            api: Api::namespaced(k8s_client, namespace),
            namespace: namespace.to_string(),
        }
    }

    /// Wait predicate: the catalog's registry connection is `READY`.
    pub async fn is_ready(&self, name: &str) -> bool {
        self.api
            .get_opt(name)
            .await
            .ok()
            .flatten()
            .map(|catalog_source| catalog_source.is_ready())
            .unwrap_or(false)
    }
}

impl CrdClient for CatalogSourceClient {
    type Crd = CatalogSource;

    fn kind(&self) -> &'static str {
        "catalogsource"
    }

    fn api(&self) -> &Api<Self::Crd> {
        &self.api
    }

    fn namespace(&self) -> &str {
        &self.namespace
    }
}

/// Client for `OperatorGroup` objects.
#[derive(Clone)]
pub struct OperatorGroupClient {
    api: Api<OperatorGroup>,
    namespace: String,
}

impl OperatorGroupClient {
    pub fn new(k8s_client: Client, namespace: &str) -> Self {
        Self {
            api: Api::namespaced(k8s_client, namespace),
            namespace: namespace.to_string(),
        }
    }
}

impl CrdClient for OperatorGroupClient {
    type Crd = OperatorGroup;

    fn kind(&self) -> &'static str {
        "operatorgroup"
    }

    fn api(&self) -> &Api<Self::Crd> {
        &self.api
    }

    fn namespace(&self) -> &str {
        &self.namespace
    }
}

/// Client for `Subscription` objects.
#[derive(Clone)]
pub struct SubscriptionClient {
    api: Api<Subscription>,
    namespace: String,
}

impl SubscriptionClient {
    pub fn new(k8s_client: Client, namespace: &str) -> Self {
        Self {
            api: Api::namespaced(k8s_client, namespace),
            namespace: namespace.to_string(),
        }
    }

    /// Point the subscription at a different channel, which triggers an
    /// operator upgrade under `Automatic` install plan approval.
    pub async fn set_channel(&self, name: &str, channel: &str) -> Result<Subscription> {
        let patch = serde_json::json!({ "spec": { "channel": channel } });
        Ok(self
            .api
            .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .context(error::KubeApiCallForSnafu {
                operation: "set channel",
                name,
            })?)
    }
}

impl CrdClient for SubscriptionClient {
    type Crd = Subscription;

    fn kind(&self) -> &'static str {
        "subscription"
    }

    fn api(&self) -> &Api<Self::Crd> {
        &self.api
    }

    fn namespace(&self) -> &str {
        &self.namespace
    }
}

/// Client for `ClusterServiceVersion` objects in one namespace.
#[derive(Clone)]
pub struct CsvClient {
    api: Api<ClusterServiceVersion>,
    namespace: String,
}

impl CsvClient {
    pub fn new(k8s_client: Client, namespace: &str) -> Self {
        Self {
            api: Api::namespaced(k8s_client, namespace),
            namespace: namespace.to_string(),
        }
    }

    /// The single CSV expected in this namespace after an operator install.
    pub async fn the_only_csv(&self) -> Result<ClusterServiceVersion> {
        let mut csvs = self.get_all().await?;
        snafu::ensure!(
            csvs.len() == 1,
            error::SingleObjectSnafu {
                what: "clusterserviceversion",
                namespace: self.namespace.clone(),
                count: csvs.len(),
            }
        );
        // Length checked above.
        Ok(csvs.remove(0))
    }

    /// Wait predicate: the named CSV reports the `Succeeded` phase.
    pub async fn succeeded(&self, name: &str) -> bool {
        self.api
            .get_opt(name)
            .await
            .ok()
            .flatten()
            .map(|csv| csv.succeeded())
            .unwrap_or(false)
    }

    /// Delete every CSV whose name starts with `prefix`. Used by the OLM
    /// cache workaround, where the CSV name embeds an unknown version.
    pub async fn delete_with_prefix(&self, prefix: &str) -> Result<()> {
        for csv in self.get_all().await? {
            let name = csv.name_any();
            if name.starts_with(prefix) {
                self.delete(&name).await?;
            }
        }
        Ok(())
    }
}

impl CrdClient for CsvClient {
    type Crd = ClusterServiceVersion;

    fn kind(&self) -> &'static str {
        "clusterserviceversion"
    }

    fn api(&self) -> &Api<Self::Crd> {
        &self.api
    }

    fn namespace(&self) -> &str {
        &self.namespace
    }
}

/// Client for `PackageManifest` objects in the marketplace namespace.
#[derive(Clone)]
pub struct PackageManifestClient {
    api: Api<PackageManifest>,
    namespace: String,
}

impl PackageManifestClient {
    pub fn new(k8s_client: Client, namespace: &str) -> Self {
        Self {
            api: Api::namespaced(k8s_client, namespace),
            namespace: namespace.to_string(),
        }
    }

    /// The manifest for `package` as served by `catalog`. The package server
    /// labels every manifest with its catalog, so the same package name can
    /// exist in several catalogs at once.
    pub async fn by_catalog(
        &self,
        package: &str,
        catalog: &str,
    ) -> Result<Option<PackageManifest>> {
        let list_params = ListParams::default().labels(&format!("catalog={}", catalog));
        Ok(self
            .api
            .list(&list_params)
            .await
            .context(error::KubeApiCallSnafu {
                method: "list",
                what: "packagemanifest",
            })?
            .items
            .into_iter()
            .find(|manifest| manifest.name_any() == package))
    }

    /// Wait predicate: the manifest is present in `catalog`.
    pub async fn found_in_catalog(&self, package: &str, catalog: &str) -> bool {
        matches!(self.by_catalog(package, catalog).await, Ok(Some(_)))
    }
}

impl CrdClient for PackageManifestClient {
    type Crd = PackageManifest;

    fn kind(&self) -> &'static str {
        "packagemanifest"
    }

    fn api(&self) -> &Api<Self::Crd> {
        &self.api
    }

    fn namespace(&self) -> &str {
        &self.namespace
    }
}

use super::crd_client::CrdClient;
use super::error::{self, Result};
use crate::constants::MACHINE_ROLE_LABEL;
use crate::machine::MachineSet;
use kube::api::ListParams;
use kube::{Api, Client};
use snafu::ResultExt;

/// Client for `MachineSet` objects in `openshift-machine-api`.
#[derive(Clone)]
pub struct MachineSetClient {
    api: Api<MachineSet>,
    namespace: String,
}

impl MachineSetClient {
    pub fn new(k8s_client: Client, namespace: &str) -> Self {
        Self {
            api: Api::namespaced(k8s_client, namespace),
            namespace: namespace.to_string(),
        }
    }

    /// The first worker machineset, the template a GPU machineset is cloned
    /// from.
    pub async fn first_worker(&self) -> Result<Option<MachineSet>> {
        let list_params = ListParams::default().labels(&format!("{}=worker", MACHINE_ROLE_LABEL));
        Ok(self
            .api
            .list(&list_params)
            .await
            .context(error::KubeApiCallSnafu {
                method: "list",
                what: "machineset",
            })?
            .items
            .into_iter()
            .next())
    }

    /// Wait predicate: the machineset has at least one ready machine.
    pub async fn has_ready_replica(&self, name: &str) -> bool {
        self.api
            .get_opt(name)
            .await
            .ok()
            .flatten()
            .map(|machine_set| machine_set.has_ready_replica())
            .unwrap_or(false)
    }
}

impl CrdClient for MachineSetClient {
    type Crd = MachineSet;

    fn kind(&self) -> &'static str {
        "machineset"
    }

    fn api(&self) -> &Api<Self::Crd> {
        &self.api
    }

    fn namespace(&self) -> &str {
        &self.namespace
    }
}

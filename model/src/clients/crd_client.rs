use super::error::{self, Result};
use crate::wait::{wait_for, PollPolicy, TimedOut};
use async_trait::async_trait;
use kube::api::{DeleteParams, ListParams, PostParams};
use kube::Api;
use serde::de::DeserializeOwned;
use serde::Serialize;
use snafu::{IntoError, ResultExt};
use std::fmt::Debug;

/// Operations shared by every custom-resource client. Implementors provide
/// the `Api` handle and identity; everything else has a default
/// implementation.
#[async_trait]
pub trait CrdClient: Sized + Sync {
    type Crd: kube::Resource<DynamicType = ()>
        + Serialize
        + DeserializeOwned
        + Debug
        + Clone
        + Send
        + Sync;

    fn kind(&self) -> &'static str;
    fn api(&self) -> &Api<Self::Crd>;
    /// The namespace this client operates in, `"-"` for cluster-scoped
    /// objects. Used in wait and error messages.
    fn namespace(&self) -> &str;

    async fn get(&self, name: &str) -> Result<Self::Crd> {
        Ok(self
            .api()
            .get(name)
            .await
            .context(error::KubeApiCallSnafu {
                method: "get",
                what: self.kind(),
            })?)
    }

    async fn get_opt(&self, name: &str) -> Result<Option<Self::Crd>> {
        Ok(self
            .api()
            .get_opt(name)
            .await
            .context(error::KubeApiCallSnafu {
                method: "get",
                what: self.kind(),
            })?)
    }

    /// `true` when the object can currently be read. Lookup errors read as
    /// absence so this can serve directly as a wait predicate.
    async fn exists(&self, name: &str) -> bool {
        matches!(self.api().get_opt(name).await, Ok(Some(_)))
    }

    async fn get_all(&self) -> Result<Vec<Self::Crd>> {
        Ok(self
            .api()
            .list(&ListParams::default())
            .await
            .context(error::KubeApiCallSnafu {
                method: "list",
                what: self.kind(),
            })?
            .items)
    }

    async fn create(&self, crd: Self::Crd) -> Result<Self::Crd> {
        Ok(self
            .api()
            .create(&PostParams::default(), &crd)
            .await
            .context(error::KubeApiCallSnafu {
                method: "create",
                what: self.kind(),
            })?)
    }

    /// Delete the object. A missing object is not an error so that cleanup
    /// actions stay idempotent.
    async fn delete(&self, name: &str) -> Result<()> {
        match self.api().delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(response)) if response.code == 404 => Ok(()),
            Err(source) => Err(error::KubeApiCallSnafu {
                method: "delete",
                what: self.kind(),
            }
            .into_error(source)
            .into()),
        }
    }

    /// Poll until `get` reports the object gone.
    async fn wait_for_deletion(
        &self,
        name: &str,
        policy: PollPolicy,
    ) -> std::result::Result<(), TimedOut> {
        let condition = format!("{} deletion", self.kind());
        wait_for(&condition, self.namespace(), name, policy, || async {
            matches!(self.api().get_opt(name).await, Ok(None))
        })
        .await
    }
}

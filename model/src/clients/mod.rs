/*!

API clients for the objects the suite drives. Each custom resource gets a
thin typed client over `kube::Api` sharing the [`CrdClient`] operations;
[`CoreClient`] covers the plain Kubernetes objects.

!*/

mod core;
mod crd_client;
pub(crate) mod error;
mod gpu;
mod machine;
mod nfd;
mod ocp;
mod olm;

pub use self::core::CoreClient;
pub use crd_client::CrdClient;
pub use error::{Error, Result};
pub use gpu::ClusterPolicyClient;
pub use machine::MachineSetClient;
pub use nfd::NfdClient;
pub use ocp::ClusterVersionClient;
pub use olm::{
    CatalogSourceClient, CsvClient, OperatorGroupClient, PackageManifestClient,
    SubscriptionClient,
};

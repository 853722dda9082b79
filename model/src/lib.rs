/*!

This library provides the Kubernetes object definitions, API clients, and wait
primitives used by the GPU operator end-to-end suite.

!*/

#![deny(
    clippy::expect_used,
    clippy::get_unwrap,
    clippy::panic,
    clippy::panic_in_result_fn,
    clippy::panicking_unwrap,
    clippy::unwrap_in_result,
    clippy::unwrap_used
)]

pub use cleanup::{CleanupResult, CleanupStack};
pub use error::{Error, Result};
pub use gpu::{
    ClusterPolicy, ClusterPolicySpec, ClusterPolicyStatus, CLUSTER_POLICY_KIND,
    CLUSTER_POLICY_STATE_READY,
};
pub use machine::{MachineSet, MachineSetSpec, MachineSetStatus};
pub use nfd::{NodeFeatureDiscovery, NodeFeatureDiscoverySpec, NODE_FEATURE_DISCOVERY_KIND};
pub use ocp::{ClusterVersion, ClusterVersionSpec};
pub use olm::{
    CatalogSource, CatalogSourceSpec, ClusterServiceVersion, ClusterServiceVersionSpec,
    OperatorGroup, OperatorGroupSpec, PackageManifest, PackageManifestSpec, Subscription,
    SubscriptionSpec, CSV_PHASE_SUCCEEDED, INSTALL_PLAN_APPROVAL_AUTOMATIC,
};
pub use wait::{wait_for, Outcome, PollPolicy, TimedOut};

pub mod cleanup;
pub mod clients;
pub mod constants;
mod error;
mod gpu;
mod machine;
mod nfd;
mod ocp;
mod olm;
pub mod wait;

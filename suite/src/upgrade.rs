/*!

The upgrade case: prepare the `ClusterPolicy` for a rolling driver upgrade,
move the GPU operator subscription to the requested channel, wait for the
operator to converge again, and re-run the burn workload.

!*/

use crate::runner::Verdict;
use crate::{burn, context::TestContext};
use anyhow::{Context, Result};
use kube::ResourceExt;
use log::info;
use model::clients::CrdClient;
use model::constants::{
    burn_image, CLUSTER_POLICY_NAME, GPU_NODE_LABEL, GPU_NAMESPACE, GPU_SUBSCRIPTION,
    WORKER_NODE_LABEL,
};
use model::wait::{wait_for, PollPolicy};
use model::CleanupStack;

const CLUSTER_POLICY_READY_AGAIN: PollPolicy = PollPolicy::from_secs(60, 900);

pub async fn run(context: &TestContext, cleanup: &mut CleanupStack) -> Result<Verdict> {
    let channel = match &context.config.upgrade_to_channel {
        Some(channel) => channel.clone(),
        None => {
            return Ok(Verdict::Skipped(
                "NVIDIAGPU_UPGRADE_TO_CHANNEL is not set".to_string(),
            ))
        }
    };

    let cluster_policies = context.cluster_policies();
    let mut cluster_policy = cluster_policies.get(CLUSTER_POLICY_NAME).await?;
    cluster_policy.prepare_for_upgrade("1");
    let updated = cluster_policies.replace(&cluster_policy).await?;
    let version_before_upgrade = updated
        .resource_version()
        .context("updated ClusterPolicy carries no resourceVersion")?;
    info!(
        "ClusterPolicy prepared for upgrade at resourceVersion '{}'",
        version_before_upgrade
    );

    info!(
        "switching subscription '{}' to channel '{}'",
        GPU_SUBSCRIPTION, channel
    );
    context
        .subscriptions(GPU_NAMESPACE)
        .set_channel(GPU_SUBSCRIPTION, &channel)
        .await?;

    // Ready alone is not enough: the policy is still ready from before the
    // upgrade until the new CSV starts rolling daemonsets. Require the object
    // to have moved past the snapshot we took.
    wait_for(
        "cluster policy ready after upgrade",
        "-",
        CLUSTER_POLICY_NAME,
        CLUSTER_POLICY_READY_AGAIN,
        || async {
            match cluster_policies.get_opt(CLUSTER_POLICY_NAME).await {
                Ok(Some(cluster_policy)) => {
                    cluster_policy.is_ready()
                        && cluster_policy.resource_version().as_deref()
                            != Some(version_before_upgrade.as_str())
                }
                _ => false,
            }
        },
    )
    .await?;

    let after_upgrade = cluster_policies.get(CLUSTER_POLICY_NAME).await?;
    info!(
        "ClusterPolicy is ready again after upgrade at resourceVersion {:?}",
        after_upgrade.resource_version()
    );

    let gpu_selector = format!("{}=,{}=true", WORKER_NODE_LABEL, GPU_NODE_LABEL);
    let architecture = context
        .core()
        .node_architecture(&gpu_selector)
        .await?
        .context("unable to determine the architecture of the GPU worker node")?;
    let image = burn_image(&architecture)
        .with_context(|| format!("no burn image published for architecture '{}'", architecture))?;
    burn::redeploy(context, cleanup, image).await?;
    Ok(Verdict::Passed)
}

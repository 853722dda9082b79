/*!

The deploy case: make sure NFD is present, make sure a GPU node exists
(scaling one in when allowed), install the GPU operator from a catalog or a
bundle, roll out the `ClusterPolicy`, and prove the result with a gpu-burn
run.

!*/

use crate::runner::Verdict;
use crate::{bundle, burn, catalog, nfd, report};
use crate::context::TestContext;
use anyhow::{Context, Result};
use kube::ResourceExt;
use log::info;
use model::clients::{CoreClient, CrdClient};
use model::constants::{
    burn_image, CLUSTER_POLICY_NAME, GPU_NAMESPACE, GPU_NODE_LABEL, GPU_OPERATOR_DEPLOYMENT,
    GPU_OPERATOR_GROUP, GPU_PACKAGE, GPU_SUBSCRIPTION, MACHINE_API_NAMESPACE,
    MARKETPLACE_NAMESPACE, NFD_OS_RELEASE_LABEL, NFD_OS_RELEASE_VALUE, WORKER_NODE_LABEL,
};
use model::wait::{wait_for, PollPolicy};
use model::{
    CleanupStack, ClusterPolicy, OperatorGroup, Subscription, SubscriptionSpec,
    CLUSTER_POLICY_KIND, INSTALL_PLAN_APPROVAL_AUTOMATIC,
};

const NFD_LABELS_PRESENT: PollPolicy = PollPolicy::from_secs(10, 180);
const MACHINESET_READY: PollPolicy = PollPolicy::from_secs(30, 900);
const GPU_NODE_LABELED: PollPolicy = PollPolicy::from_secs(15, 300);
const DEPLOYMENT_CREATED: PollPolicy = PollPolicy::from_secs(30, 360);
const DEPLOYMENT_READY: PollPolicy = PollPolicy::from_secs(30, 240);
const CSV_SUCCEEDED: PollPolicy = PollPolicy::from_secs(60, 300);
const CLUSTER_POLICY_READY: PollPolicy = PollPolicy::from_secs(60, 1200);
const CLUSTER_POLICY_DELETED: PollPolicy = PollPolicy::from_secs(30, 300);

pub async fn run(context: &TestContext, cleanup: &mut CleanupStack) -> Result<Verdict> {
    let core = context.core();

    if let Some(reason) = nfd::ensure_nfd(context, cleanup).await? {
        return Ok(Verdict::Skipped(reason));
    }

    // NFD labeling is what makes every later GPU check meaningful.
    wait_for(
        "NFD labels on all workers",
        "-",
        NFD_OS_RELEASE_LABEL,
        NFD_LABELS_PRESENT,
        || async {
            core.all_nodes_labeled(WORKER_NODE_LABEL, NFD_OS_RELEASE_LABEL, NFD_OS_RELEASE_VALUE)
                .await
                .unwrap_or(false)
        },
    )
    .await?;

    let gpu_selector = format!("{}=,{}=true", WORKER_NODE_LABEL, GPU_NODE_LABEL);
    if !core.any_node_with_labels(&gpu_selector).await? {
        match &context.config.machineset_instance_type {
            Some(instance_type) => {
                scale_in_gpu_machineset(context, cleanup, instance_type, &gpu_selector).await?
            }
            None => {
                return Ok(Verdict::Skipped(
                    "no GPU worker node found and machineset scaling is not configured"
                        .to_string(),
                ))
            }
        }
    }

    let architecture = core
        .node_architecture(&gpu_selector)
        .await?
        .context("unable to determine the architecture of the GPU worker node")?;
    info!("GPU worker node architecture is '{}'", architecture);
    let image = burn_image(&architecture)
        .with_context(|| format!("no burn image published for architecture '{}'", architecture))?;

    let namespace = CoreClient::labeled_namespace(GPU_NAMESPACE, burn::privileged_labels());
    core.ensure_namespace(namespace).await?;
    {
        let core = core.clone();
        cleanup.defer(format!("delete namespace '{}'", GPU_NAMESPACE), move || {
            async move {
                core.delete_namespace(GPU_NAMESPACE).await?;
                Ok(())
            }
        });
    }

    if context.config.deploy_from_bundle {
        bundle::deploy_bundle(&context.config.bundle_image, GPU_NAMESPACE)?;
        cleanup.defer("remove bundle deployment", move || async move {
            bundle::cleanup_bundle(GPU_PACKAGE, GPU_NAMESPACE)?;
            Ok(())
        });
    } else if let Some(reason) = install_from_catalog(context, cleanup).await? {
        return Ok(Verdict::Skipped(reason));
    }

    wait_for(
        "deployment created",
        GPU_NAMESPACE,
        GPU_OPERATOR_DEPLOYMENT,
        DEPLOYMENT_CREATED,
        || core.deployment_exists(GPU_NAMESPACE, GPU_OPERATOR_DEPLOYMENT),
    )
    .await?;
    wait_for(
        "deployment ready",
        GPU_NAMESPACE,
        GPU_OPERATOR_DEPLOYMENT,
        DEPLOYMENT_READY,
        || core.deployment_ready(GPU_NAMESPACE, GPU_OPERATOR_DEPLOYMENT),
    )
    .await?;

    let csvs = context.csvs(GPU_NAMESPACE);
    let csv = csvs.the_only_csv().await?;
    let csv_name = csv.name_any();
    info!("deployed ClusterServiceVersion is '{}'", csv_name);

    let version = csv
        .spec
        .version
        .clone()
        .unwrap_or_else(|| "unknown".to_string());
    let version_report = if context.config.deploy_from_bundle {
        format!("{}(bundle)", version)
    } else {
        version
    };
    report::write_report(
        &context.config.reports_dir,
        report::OPERATOR_VERSION_FILE,
        &version_report,
    )
    .await;

    wait_for("CSV Succeeded", GPU_NAMESPACE, &csv_name, CSV_SUCCEEDED, || {
        csvs.succeeded(&csv_name)
    })
    .await?;
    {
        let csvs = csvs.clone();
        let name = csv_name.clone();
        cleanup.defer(format!("delete CSV '{}'", csv_name), move || async move {
            csvs.delete(&name).await?;
            Ok(())
        });
    }

    let example = csv.alm_example_of_kind(CLUSTER_POLICY_KIND)?;
    let cluster_policy = ClusterPolicy::from_alm_example(example)?;
    let policy_name = cluster_policy.name_any();
    info!("creating ClusterPolicy '{}' from the CSV alm-examples", policy_name);

    let cluster_policies = context.cluster_policies();
    cluster_policies.create(cluster_policy).await?;
    {
        let cluster_policies = cluster_policies.clone();
        let name = policy_name.clone();
        cleanup.defer(
            format!("delete ClusterPolicy '{}'", policy_name),
            move || async move {
                cluster_policies.delete(&name).await?;
                cluster_policies
                    .wait_for_deletion(&name, CLUSTER_POLICY_DELETED)
                    .await?;
                Ok(())
            },
        );
    }

    wait_for(
        "cluster policy ready",
        "-",
        CLUSTER_POLICY_NAME,
        CLUSTER_POLICY_READY,
        || cluster_policies.is_ready(CLUSTER_POLICY_NAME),
    )
    .await?;
    info!("ClusterPolicy is ready, GPU operands are rolled out");

    burn::run_burn(context, cleanup, image).await?;
    Ok(Verdict::Passed)
}

/// Clone the first worker machineset with a GPU instance type and wait for a
/// machine to come up and be labeled.
async fn scale_in_gpu_machineset(
    context: &TestContext,
    cleanup: &mut CleanupStack,
    instance_type: &str,
    gpu_selector: &str,
) -> Result<()> {
    let machine_sets = context.machine_sets();
    let worker = machine_sets
        .first_worker()
        .await?
        .context("no worker machineset found to clone for GPU scaling")?;
    let name = format!("{}-gpu", worker.name_any());
    info!(
        "scaling: creating machineset '{}' with instance type '{}' from '{}'",
        name,
        instance_type,
        worker.name_any()
    );
    let machine_set = worker.cloned_with_instance_type(&name, instance_type, 1)?;
    machine_sets.create(machine_set).await?;
    {
        let machine_sets = machine_sets.clone();
        let name = name.clone();
        cleanup.defer(format!("delete machineset '{}'", name), move || {
            async move {
                machine_sets.delete(&name).await?;
                Ok(())
            }
        });
    }

    wait_for(
        "machineset ready replica",
        MACHINE_API_NAMESPACE,
        &name,
        MACHINESET_READY,
        || machine_sets.has_ready_replica(&name),
    )
    .await?;

    // The new node still has to be picked up by NFD before it counts.
    let core = context.core();
    wait_for(
        "GPU label on the new node",
        "-",
        GPU_NODE_LABEL,
        GPU_NODE_LABELED,
        || async {
            core.any_node_with_labels(gpu_selector)
                .await
                .unwrap_or(false)
        },
    )
    .await?;
    Ok(())
}

/// Create the operator group and subscription that install the GPU operator
/// from a catalog. Returns a skip reason when the package cannot be resolved.
async fn install_from_catalog(
    context: &TestContext,
    cleanup: &mut CleanupStack,
) -> Result<Option<String>> {
    let resolved = match catalog::resolve_package(
        context,
        cleanup,
        GPU_PACKAGE,
        &context.config.catalog_source,
        context.config.gpu_fallback_index_image.as_deref(),
        "Custom GPU catalog",
    )
    .await?
    {
        Some(resolved) => resolved,
        None => {
            return Ok(Some(format!(
                "'{}' packagemanifest not found in the '{}' catalogsource and no fallback catalog is configured",
                GPU_PACKAGE, context.config.catalog_source
            )))
        }
    };

    let operator_groups = context.operator_groups(GPU_NAMESPACE);
    if !operator_groups.exists(GPU_OPERATOR_GROUP).await {
        operator_groups
            .create(OperatorGroup::own_namespace(
                GPU_OPERATOR_GROUP,
                GPU_NAMESPACE,
            ))
            .await?;
    }
    {
        let operator_groups = operator_groups.clone();
        cleanup.defer(
            format!("delete operatorgroup '{}'", GPU_OPERATOR_GROUP),
            move || async move {
                operator_groups.delete(GPU_OPERATOR_GROUP).await?;
                Ok(())
            },
        );
    }

    let channel = context
        .config
        .subscription_channel
        .clone()
        .or(resolved.default_channel);
    info!(
        "creating subscription '{}' on catalogsource '{}', channel {:?}",
        GPU_SUBSCRIPTION, resolved.catalog_source, channel
    );
    let subscriptions = context.subscriptions(GPU_NAMESPACE);
    subscriptions
        .create(Subscription::new(
            GPU_SUBSCRIPTION,
            SubscriptionSpec {
                name: GPU_PACKAGE.to_string(),
                source: resolved.catalog_source,
                source_namespace: MARKETPLACE_NAMESPACE.to_string(),
                channel,
                install_plan_approval: Some(INSTALL_PLAN_APPROVAL_AUTOMATIC.to_string()),
                starting_csv: None,
            },
        ))
        .await?;
    {
        let subscriptions = subscriptions.clone();
        cleanup.defer(
            format!("delete subscription '{}'", GPU_SUBSCRIPTION),
            move || async move {
                subscriptions.delete(GPU_SUBSCRIPTION).await?;
                Ok(())
            },
        );
    }
    Ok(None)
}

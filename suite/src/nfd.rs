use crate::catalog;
use crate::context::TestContext;
use anyhow::{ensure, Context, Result};
use log::{info, warn};
use model::clients::{CoreClient, CrdClient};
use model::constants::{
    CATALOG_OPERATOR_SELECTOR, MARKETPLACE_NAMESPACE, NFD_CATALOG_SOURCE_DEFAULT, NFD_NAMESPACE,
    NFD_OPERATOR_DEPLOYMENT, NFD_OPERATOR_GROUP, NFD_PACKAGE, NFD_SUBSCRIPTION, OLM_NAMESPACE,
    OLM_OPERATOR_SELECTOR,
};
use model::wait::{poll_until, wait_for, Outcome, PollPolicy};
use model::{
    CleanupStack, NodeFeatureDiscovery, OperatorGroup, Subscription, SubscriptionSpec,
    INSTALL_PLAN_APPROVAL_AUTOMATIC, NODE_FEATURE_DISCOVERY_KIND,
};
use kube::ResourceExt;
use std::collections::BTreeMap;

const OPERATOR_DEPLOYMENT_CREATED: PollPolicy = PollPolicy::from_secs(30, 360);
const OPERATOR_DEPLOYMENT_READY: PollPolicy = PollPolicy::from_secs(15, 240);
const CR_DELETED: PollPolicy = PollPolicy::from_secs(30, 300);

/// Make sure NFD operator and its operand are on the cluster, installing
/// them when they are not. Returns a skip reason when the environment cannot
/// provide the NFD package.
pub async fn ensure_nfd(
    context: &TestContext,
    cleanup: &mut CleanupStack,
) -> Result<Option<String>> {
    let core = context.core();
    if core
        .deployment_ready(NFD_NAMESPACE, NFD_OPERATOR_DEPLOYMENT)
        .await
    {
        info!("NFD operator is already installed on this cluster");
        return Ok(None);
    }

    info!("NFD is not installed on this cluster, deploying the operator and its CR");
    let resolved = match catalog::resolve_package(
        context,
        cleanup,
        NFD_PACKAGE,
        NFD_CATALOG_SOURCE_DEFAULT,
        context.config.nfd_fallback_index_image.as_deref(),
        "Custom NFD catalog",
    )
    .await?
    {
        Some(resolved) => resolved,
        None => {
            return Ok(Some(format!(
                "'{}' packagemanifest not found in the '{}' catalogsource and no fallback catalog is configured",
                NFD_PACKAGE, NFD_CATALOG_SOURCE_DEFAULT
            )))
        }
    };

    let namespace = CoreClient::labeled_namespace(
        NFD_NAMESPACE,
        BTreeMap::from([(
            "openshift.io/cluster-monitoring".to_string(),
            "true".to_string(),
        )]),
    );
    core.ensure_namespace(namespace).await?;
    {
        let core = core.clone();
        cleanup.defer(format!("delete namespace '{}'", NFD_NAMESPACE), move || {
            async move {
                core.delete_namespace(NFD_NAMESPACE).await?;
                Ok(())
            }
        });
    }

    let operator_groups = context.operator_groups(NFD_NAMESPACE);
    if !operator_groups.exists(NFD_OPERATOR_GROUP).await {
        operator_groups
            .create(OperatorGroup::own_namespace(
                NFD_OPERATOR_GROUP,
                NFD_NAMESPACE,
            ))
            .await?;
    }
    {
        let operator_groups = operator_groups.clone();
        cleanup.defer(
            format!("delete operatorgroup '{}'", NFD_OPERATOR_GROUP),
            move || async move {
                operator_groups.delete(NFD_OPERATOR_GROUP).await?;
                Ok(())
            },
        );
    }

    {
        let subscriptions = context.subscriptions(NFD_NAMESPACE);
        cleanup.defer(
            format!("delete subscription '{}'", NFD_SUBSCRIPTION),
            move || async move {
                subscriptions.delete(NFD_SUBSCRIPTION).await?;
                Ok(())
            },
        );
        let csvs = context.csvs(NFD_NAMESPACE);
        cleanup.defer("delete NFD CSV", move || async move {
            csvs.delete_with_prefix(NFD_PACKAGE).await?;
            Ok(())
        });
    }

    if !install_operator(context, &resolved).await? {
        // A fresh subscription sometimes never produces a deployment because
        // the OLM registry cache is stale. Drop the subscription, any CSV it
        // produced, and the OLM pods, then try once more.
        warn!("NFD operator deployment did not appear, applying the OLM cache workaround");
        context
            .subscriptions(NFD_NAMESPACE)
            .delete(NFD_SUBSCRIPTION)
            .await?;
        context.csvs(NFD_NAMESPACE).delete_with_prefix(NFD_PACKAGE).await?;
        core.delete_pods_with_label(OLM_NAMESPACE, CATALOG_OPERATOR_SELECTOR)
            .await?;
        core.delete_pods_with_label(OLM_NAMESPACE, OLM_OPERATOR_SELECTOR)
            .await?;
        info!("re-trying the NFD operator deployment");
        ensure!(
            install_operator(context, &resolved).await?,
            "NFD operator deployment did not appear after the OLM cache workaround"
        );
    }

    wait_for(
        "deployment ready",
        NFD_NAMESPACE,
        NFD_OPERATOR_DEPLOYMENT,
        OPERATOR_DEPLOYMENT_READY,
        || core.deployment_ready(NFD_NAMESPACE, NFD_OPERATOR_DEPLOYMENT),
    )
    .await?;

    deploy_cr(context, cleanup).await?;
    Ok(None)
}

/// Create the NFD subscription (unless present) and wait for the operator
/// deployment to appear. `Ok(false)` means the deployment never showed up.
async fn install_operator(
    context: &TestContext,
    resolved: &catalog::ResolvedPackage,
) -> Result<bool> {
    let subscriptions = context.subscriptions(NFD_NAMESPACE);
    if !subscriptions.exists(NFD_SUBSCRIPTION).await {
        info!(
            "creating subscription '{}' on catalogsource '{}', channel {:?}",
            NFD_SUBSCRIPTION, resolved.catalog_source, resolved.default_channel
        );
        subscriptions
            .create(Subscription::new(
                NFD_SUBSCRIPTION,
                SubscriptionSpec {
                    name: NFD_PACKAGE.to_string(),
                    source: resolved.catalog_source.clone(),
                    source_namespace: MARKETPLACE_NAMESPACE.to_string(),
                    channel: resolved.default_channel.clone(),
                    install_plan_approval: Some(INSTALL_PLAN_APPROVAL_AUTOMATIC.to_string()),
                    starting_csv: None,
                },
            ))
            .await?;
    }

    let core = context.core();
    let outcome = poll_until(OPERATOR_DEPLOYMENT_CREATED, || {
        core.deployment_exists(NFD_NAMESPACE, NFD_OPERATOR_DEPLOYMENT)
    })
    .await;
    Ok(outcome == Outcome::Satisfied)
}

/// Instantiate the `NodeFeatureDiscovery` CR from the installed CSV's
/// alm-examples.
async fn deploy_cr(context: &TestContext, cleanup: &mut CleanupStack) -> Result<()> {
    let csvs = context.csvs(NFD_NAMESPACE);
    let csv = csvs
        .get_all()
        .await?
        .into_iter()
        .find(|csv| csv.name_any().starts_with(NFD_PACKAGE))
        .context("no NFD CSV found after operator installation")?;

    let example = csv.alm_example_of_kind(NODE_FEATURE_DISCOVERY_KIND)?;
    let instance = NodeFeatureDiscovery::from_alm_example(example, NFD_NAMESPACE)?;
    let instance_name = instance.name_any();
    info!("creating NodeFeatureDiscovery '{}'", instance_name);

    let nfd_instances = context.nfd_instances();
    nfd_instances.create(instance).await?;
    let label = format!("delete NodeFeatureDiscovery '{}'", instance_name);
    cleanup.defer(
        label,
        move || async move {
            nfd_instances.delete(&instance_name).await?;
            // Deleting the namespace while the CR still has finalizers wedges
            // the whole cleanup, so wait the deletion out.
            nfd_instances
                .wait_for_deletion(&instance_name, CR_DELETED)
                .await?;
            Ok(())
        },
    );
    Ok(())
}

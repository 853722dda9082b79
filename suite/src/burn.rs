/*!

The gpu-burn workload: a pod that hammers every allocatable GPU for five
minutes and prints a per-GPU verdict. Running it to completion is the proof
that the operator actually made GPUs schedulable.

!*/

use crate::context::TestContext;
use anyhow::{ensure, Context, Result};
use k8s_openapi::api::core::v1::{
    Capabilities, ConfigMap, ConfigMapVolumeSource, Container, Pod, PodSecurityContext, PodSpec,
    ResourceRequirements, SeccompProfile, SecurityContext, Toleration, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::api::ObjectMeta;
use log::{debug, info};
use model::clients::CoreClient;
use model::constants::{
    BURN_CONFIGMAP_NAME, BURN_CONTAINER_NAME, BURN_NAMESPACE, BURN_POD_LABEL, BURN_POD_NAME,
    WORKER_NODE_LABEL,
};
use model::wait::{wait_for, PollPolicy};
use model::CleanupStack;
use std::collections::BTreeMap;

const POD_RUNNING: PollPolicy = PollPolicy::from_secs(15, 180);
const POD_SUCCEEDED: PollPolicy = PollPolicy::from_secs(30, 480);
const POD_GONE: PollPolicy = PollPolicy::from_secs(5, 120);

const ENTRYPOINT: &str = "#!/bin/bash\n\
    NUM_GPUS=$(nvidia-smi -L | wc -l)\n\
    if [ $NUM_GPUS -eq 0 ]; then\n\
    \techo \"ERROR: no GPUs visible to nvidia-smi\"\n\
    \texit 1\n\
    fi\n\
    ./gpu_burn 300\n";

// Both markers must appear in the pod logs for the run to count as passed.
const MARKER_GPU_OK: &str = "GPU 0: OK";
const MARKER_FULL_PROGRESS: &str = "100.0%  proc'd:";

/// Create the burn namespace, entrypoint config map and pod, then validate
/// the run.
pub async fn run_burn(
    context: &TestContext,
    cleanup: &mut CleanupStack,
    image: &str,
) -> Result<()> {
    let core = context.core();

    let namespace = CoreClient::labeled_namespace(BURN_NAMESPACE, privileged_labels());
    core.ensure_namespace(namespace).await?;
    {
        let core = core.clone();
        cleanup.defer(format!("delete namespace '{}'", BURN_NAMESPACE), move || {
            async move {
                core.delete_namespace(BURN_NAMESPACE).await?;
                Ok(())
            }
        });
    }

    info!("creating configmap '{}'", BURN_CONFIGMAP_NAME);
    core.create_config_map(entrypoint_config_map()).await?;
    {
        let core = core.clone();
        cleanup.defer(
            format!("delete configmap '{}'", BURN_CONFIGMAP_NAME),
            move || async move {
                core.delete_config_map(BURN_NAMESPACE, BURN_CONFIGMAP_NAME)
                    .await?;
                Ok(())
            },
        );
    }

    deploy_and_validate(context, cleanup, image).await
}

/// Delete a completed burn pod and run a fresh one. Used after the operator
/// upgrade to prove GPUs are still schedulable.
pub async fn redeploy(context: &TestContext, cleanup: &mut CleanupStack, image: &str) -> Result<()> {
    let core = context.core();
    info!("deleting the previously completed burn pod");
    core.delete_pod(BURN_NAMESPACE, BURN_POD_NAME).await?;
    wait_for(
        "pod deletion",
        BURN_NAMESPACE,
        BURN_POD_NAME,
        POD_GONE,
        || async { !core.pod_exists(BURN_NAMESPACE, BURN_POD_NAME).await },
    )
    .await?;
    deploy_and_validate(context, cleanup, image).await
}

async fn deploy_and_validate(
    context: &TestContext,
    cleanup: &mut CleanupStack,
    image: &str,
) -> Result<()> {
    let core = context.core();
    info!(
        "creating pod '{}' with image '{}' in namespace '{}'",
        BURN_POD_NAME, image, BURN_NAMESPACE
    );
    core.create_pod(burn_pod(image)).await?;
    {
        let core = core.clone();
        cleanup.defer(format!("delete pod '{}'", BURN_POD_NAME), move || {
            async move {
                core.delete_pod(BURN_NAMESPACE, BURN_POD_NAME).await?;
                Ok(())
            }
        });
    }

    // Confirm the pod was scheduled and labeled as expected before waiting
    // out the whole burn.
    let pod_name = core
        .first_pod_name(BURN_NAMESPACE, BURN_POD_LABEL)
        .await?
        .with_context(|| format!("no pod with label '{}' was created", BURN_POD_LABEL))?;
    debug!("burn pod '{}' found by label", pod_name);

    wait_for(
        "pod Running",
        BURN_NAMESPACE,
        BURN_POD_NAME,
        POD_RUNNING,
        || async {
            core.pod_in_phase(BURN_NAMESPACE, BURN_POD_NAME, "Running").await
                || core.pod_in_phase(BURN_NAMESPACE, BURN_POD_NAME, "Succeeded").await
        },
    )
    .await?;
    info!("burn pod is running, waiting for it to complete");

    wait_for(
        "pod Succeeded",
        BURN_NAMESPACE,
        BURN_POD_NAME,
        POD_SUCCEEDED,
        || core.pod_in_phase(BURN_NAMESPACE, BURN_POD_NAME, "Succeeded"),
    )
    .await?;

    let logs = core
        .pod_logs(BURN_NAMESPACE, BURN_POD_NAME, BURN_CONTAINER_NAME)
        .await?;
    debug!("gpu-burn logs:\n{}", logs);
    ensure!(
        burn_succeeded(&logs),
        "gpu-burn logs of pod '{}' do not show a successful run",
        BURN_POD_NAME
    );
    info!("gpu-burn completed successfully");
    Ok(())
}

/// The burn counts as passed only when the first GPU reports OK and the
/// workload reached 100% progress.
pub fn burn_succeeded(logs: &str) -> bool {
    logs.contains(MARKER_GPU_OK) && logs.contains(MARKER_FULL_PROGRESS)
}

pub(crate) fn privileged_labels() -> BTreeMap<String, String> {
    BTreeMap::from([
        (
            "openshift.io/cluster-monitoring".to_string(),
            "true".to_string(),
        ),
        (
            "pod-security.kubernetes.io/enforce".to_string(),
            "privileged".to_string(),
        ),
    ])
}

fn entrypoint_config_map() -> ConfigMap {
    ConfigMap {
        metadata: ObjectMeta {
            name: Some(BURN_CONFIGMAP_NAME.to_string()),
            namespace: Some(BURN_NAMESPACE.to_string()),
            ..Default::default()
        },
        data: Some(BTreeMap::from([(
            "entrypoint.sh".to_string(),
            ENTRYPOINT.to_string(),
        )])),
        ..Default::default()
    }
}

fn burn_pod(image: &str) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some(BURN_POD_NAME.to_string()),
            namespace: Some(BURN_NAMESPACE.to_string()),
            labels: Some(BTreeMap::from([(
                "app".to_string(),
                "gpu-burn-app".to_string(),
            )])),
            ..Default::default()
        },
        spec: Some(PodSpec {
            restart_policy: Some("Never".to_string()),
            security_context: Some(PodSecurityContext {
                run_as_non_root: Some(true),
                seccomp_profile: Some(SeccompProfile {
                    type_: "RuntimeDefault".to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            tolerations: Some(vec![
                Toleration {
                    operator: Some("Exists".to_string()),
                    ..Default::default()
                },
                Toleration {
                    key: Some("nvidia.com/gpu".to_string()),
                    effect: Some("NoSchedule".to_string()),
                    operator: Some("Exists".to_string()),
                    ..Default::default()
                },
            ]),
            containers: vec![Container {
                name: BURN_CONTAINER_NAME.to_string(),
                image: Some(image.to_string()),
                image_pull_policy: Some("IfNotPresent".to_string()),
                security_context: Some(SecurityContext {
                    allow_privilege_escalation: Some(false),
                    capabilities: Some(Capabilities {
                        drop: Some(vec!["ALL".to_string()]),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                command: Some(vec!["/bin/entrypoint.sh".to_string()]),
                resources: Some(ResourceRequirements {
                    limits: Some(BTreeMap::from([(
                        "nvidia.com/gpu".to_string(),
                        Quantity("1".to_string()),
                    )])),
                    ..Default::default()
                }),
                volume_mounts: Some(vec![VolumeMount {
                    name: "entrypoint".to_string(),
                    mount_path: "/bin/entrypoint.sh".to_string(),
                    read_only: Some(true),
                    sub_path: Some("entrypoint.sh".to_string()),
                    ..Default::default()
                }]),
                ..Default::default()
            }],
            volumes: Some(vec![Volume {
                name: "entrypoint".to_string(),
                config_map: Some(ConfigMapVolumeSource {
                    name: Some(BURN_CONFIGMAP_NAME.to_string()),
                    default_mode: Some(0o777),
                    ..Default::default()
                }),
                ..Default::default()
            }]),
            node_selector: Some(BTreeMap::from([
                ("nvidia.com/gpu.present".to_string(), "true".to_string()),
                (WORKER_NODE_LABEL.to_string(), String::new()),
            ])),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const PASSING_LOGS: &str = "\
        Burning for 300 seconds.\n\
        100.0%  proc'd: 43000 (9000 Gflop/s)   errors: 0   temps: 78 C\n\
        Killing processes.. done\n\
        Tested 1 GPUs:\n\
        \tGPU 0: OK\n";

    #[test]
    fn burn_validation_requires_both_markers() {
        assert!(burn_succeeded(PASSING_LOGS));
        assert!(!burn_succeeded("GPU 0: OK"));
        assert!(!burn_succeeded("100.0%  proc'd: 43000"));
        assert!(!burn_succeeded("GPU 0: FAULTY\n100.0%  proc'd: 43000"));
        assert!(!burn_succeeded(""));
    }

    #[test]
    fn burn_pod_requests_one_gpu_and_mounts_the_entrypoint() {
        let pod = burn_pod("quay.io/wabouham/gpu_burn_amd64:ubi9");
        let spec = pod.spec.as_ref().unwrap();
        let container = &spec.containers[0];
        assert_eq!(container.name, BURN_CONTAINER_NAME);
        assert_eq!(
            container
                .resources
                .as_ref()
                .unwrap()
                .limits
                .as_ref()
                .unwrap()
                .get("nvidia.com/gpu"),
            Some(&Quantity("1".to_string()))
        );
        assert_eq!(
            container.volume_mounts.as_ref().unwrap()[0].mount_path,
            "/bin/entrypoint.sh"
        );
        let volume = &spec.volumes.as_ref().unwrap()[0];
        assert_eq!(
            volume.config_map.as_ref().unwrap().name.as_deref(),
            Some(BURN_CONFIGMAP_NAME)
        );
        // The pod must only land on GPU-labeled workers.
        let node_selector = spec.node_selector.as_ref().unwrap();
        assert_eq!(
            node_selector.get("nvidia.com/gpu.present"),
            Some(&"true".to_string())
        );
        assert!(node_selector.contains_key(WORKER_NODE_LABEL));
    }

    #[test]
    fn entrypoint_config_map_carries_the_script() {
        let config_map = entrypoint_config_map();
        let data = config_map.data.as_ref().unwrap();
        let script = data.get("entrypoint.sh").unwrap();
        assert!(script.starts_with("#!/bin/bash"));
        assert!(script.contains("gpu_burn 300"));
    }
}

//! Bundle-based installation, used when the operator under test has not been
//! published to any catalog yet. Shells out to `operator-sdk`, which builds
//! the registry pod and subscription for the bundle image.

use anyhow::{ensure, Context, Result};
use log::info;
use std::process::Command;

/// Deploy `bundle_image` into `namespace` with `operator-sdk run bundle`.
pub fn deploy_bundle(bundle_image: &str, namespace: &str) -> Result<()> {
    info!(
        "deploying bundle '{}' into namespace '{}'",
        bundle_image, namespace
    );
    let output = Command::new("operator-sdk")
        .arg("run")
        .arg("bundle")
        .arg(bundle_image)
        .arg("--namespace")
        .arg(namespace)
        .arg("--install-mode")
        .arg("OwnNamespace")
        .arg("--timeout")
        .arg("5m")
        .output()
        .context("unable to execute 'operator-sdk'")?;
    ensure!(
        output.status.success(),
        "'operator-sdk run bundle' failed with exit status '{}'\n\n{}\n\n{}",
        output.status.code().unwrap_or(1),
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr),
    );
    Ok(())
}

/// Remove everything `operator-sdk run bundle` created for `package`.
pub fn cleanup_bundle(package: &str, namespace: &str) -> Result<()> {
    info!(
        "removing bundle deployment of '{}' from namespace '{}'",
        package, namespace
    );
    let output = Command::new("operator-sdk")
        .arg("cleanup")
        .arg(package)
        .arg("--namespace")
        .arg(namespace)
        .output()
        .context("unable to execute 'operator-sdk'")?;
    ensure!(
        output.status.success(),
        "'operator-sdk cleanup' failed with exit status '{}'\n\n{}\n\n{}",
        output.status.code().unwrap_or(1),
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr),
    );
    Ok(())
}

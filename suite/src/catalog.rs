use crate::context::TestContext;
use anyhow::{Context, Result};
use log::info;
use model::clients::CrdClient;
use model::constants::{CUSTOM_CATALOG_SUFFIX, MARKETPLACE_NAMESPACE};
use model::wait::{wait_for, PollPolicy};
use model::{CatalogSource, CleanupStack};

const CATALOG_READY: PollPolicy = PollPolicy::from_secs(30, 240);
const MANIFEST_AVAILABLE: PollPolicy = PollPolicy::from_secs(30, 300);

/// Where a package was located and which channel to subscribe to by default.
pub struct ResolvedPackage {
    pub catalog_source: String,
    pub default_channel: Option<String>,
}

/// Locate `package` in `default_catalog`. When it is absent and
/// `fallback_index_image` is configured, stand up a custom catalog source
/// serving that index and look again. `Ok(None)` means the package cannot be
/// resolved in this environment and the caller should skip.
pub async fn resolve_package(
    context: &TestContext,
    cleanup: &mut CleanupStack,
    package: &str,
    default_catalog: &str,
    fallback_index_image: Option<&str>,
    display_name: &str,
) -> Result<Option<ResolvedPackage>> {
    let manifests = context.package_manifests();
    if let Some(manifest) = manifests.by_catalog(package, default_catalog).await? {
        let default_channel = manifest.default_channel().map(str::to_string);
        info!(
            "packagemanifest '{}' found in catalog '{}', default channel {:?}",
            package, default_catalog, default_channel
        );
        return Ok(Some(ResolvedPackage {
            catalog_source: default_catalog.to_string(),
            default_channel,
        }));
    }

    let index_image = match fallback_index_image {
        Some(index_image) => index_image,
        None => return Ok(None),
    };

    let custom_catalog = format!("{}{}", default_catalog, CUSTOM_CATALOG_SUFFIX);
    info!(
        "packagemanifest '{}' not found in catalog '{}', creating custom catalogsource '{}' with index image '{}'",
        package, default_catalog, custom_catalog, index_image
    );

    let catalog_sources = context.catalog_sources();
    catalog_sources
        .create(CatalogSource::with_index_image(
            &custom_catalog,
            MARKETPLACE_NAMESPACE,
            index_image,
            display_name,
            "gputest",
        ))
        .await
        .with_context(|| format!("creating custom catalogsource '{}'", custom_catalog))?;
    {
        let catalog_sources = catalog_sources.clone();
        let name = custom_catalog.clone();
        cleanup.defer(format!("delete catalogsource '{}'", custom_catalog), {
            move || async move {
                catalog_sources.delete(&name).await?;
                Ok(())
            }
        });
    }

    wait_for(
        "catalogsource READY",
        MARKETPLACE_NAMESPACE,
        &custom_catalog,
        CATALOG_READY,
        || catalog_sources.is_ready(&custom_catalog),
    )
    .await?;

    wait_for(
        "packagemanifest served",
        MARKETPLACE_NAMESPACE,
        package,
        MANIFEST_AVAILABLE,
        || manifests.found_in_catalog(package, &custom_catalog),
    )
    .await?;

    let manifest = manifests
        .by_catalog(package, &custom_catalog)
        .await?
        .with_context(|| {
            format!(
                "packagemanifest '{}' disappeared from catalog '{}' after becoming available",
                package, custom_catalog
            )
        })?;
    Ok(Some(ResolvedPackage {
        catalog_source: custom_catalog,
        default_channel: manifest.default_channel().map(str::to_string),
    }))
}

//! Parsing adapter for `pveam`, the host appliance/template manager.

use anyhow::Result;
use tracing::{debug, warn};

use crate::error::ProvisionError;

use super::runner::CommandRunner;

/// Refresh the remote template catalog. Best-effort: a failed refresh is
/// reported as a warning and the cached catalog is used as-is.
pub async fn refresh_catalog(runner: &dyn CommandRunner) -> Result<()> {
    let output = runner.run("pveam", &["update"]).await?;
    if !output.success() {
        warn!(
            stderr = %output.stderr.trim(),
            "template catalog refresh failed, continuing with cached catalog"
        );
    }
    Ok(())
}

/// Template identifiers in the `system` section of the catalog whose name
/// contains `family` (e.g. `debian-13`), in catalog order.
pub async fn available_templates(
    runner: &dyn CommandRunner,
    family: &str,
) -> Result<Vec<String>> {
    let output = runner
        .run("pveam", &["available", "--section", "system"])
        .await?;
    if !output.success() {
        return Err(ProvisionError::Selection(format!(
            "pveam available failed: {}",
            output.stderr.trim()
        ))
        .into());
    }
    Ok(parse_available(&output.stdout, family))
}

/// Whether `template` is already present on `storage`.
pub async fn is_downloaded(
    runner: &dyn CommandRunner,
    storage: &str,
    template: &str,
) -> Result<bool> {
    let output = runner.run("pveam", &["list", storage]).await?;
    if !output.success() {
        return Err(ProvisionError::Selection(format!(
            "pveam list {} failed: {}",
            storage,
            output.stderr.trim()
        ))
        .into());
    }
    Ok(output.stdout.contains(template))
}

/// Blocking download of `template` onto `storage`. Failure is fatal for
/// the pipeline; nothing host-visible exists yet at this point.
pub async fn download(
    runner: &dyn CommandRunner,
    storage: &str,
    template: &str,
) -> Result<()> {
    debug!(storage, template, "downloading template");
    let output = runner
        .run("pveam", &["download", storage, template])
        .await?;
    if !output.success() {
        return Err(ProvisionError::Transfer(format!(
            "pveam download {} {} failed: {}",
            storage,
            template,
            output.stderr.trim()
        ))
        .into());
    }
    Ok(())
}

/// Catalog lines look like
/// `system          debian-13-standard_13.1-1_amd64.tar.zst`;
/// the identifier is the second token.
fn parse_available(text: &str, family: &str) -> Vec<String> {
    text.lines()
        .filter(|line| line.contains(family))
        .filter_map(|line| line.split_whitespace().nth(1))
        .map(str::to_string)
        .collect()
}

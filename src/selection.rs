//! Storage and template selection with fallback policy.

use anyhow::Result;
use tracing::{info, warn};

use crate::error::ProvisionError;
use crate::pve::{storage, template, CommandRunner};

/// Primary OS family to provision, and the one fallback tried when the
/// catalog does not carry it.
pub const PRIMARY_FAMILY: &str = "debian-13";
pub const FALLBACK_FAMILY: &str = "debian-12";

/// Content capability tags the host uses for the two storage roles.
const ROOTFS_CONTENT: &str = "rootdir";
const TEMPLATE_CONTENT: &str = "vztmpl";

/// Well-known backend names tried in order when no storage advertises
/// container-root support. Real hosts are heterogeneous; a plain dir
/// storage often works even when its content tags are not configured.
const ROOTFS_NAME_FALLBACK: &[&str] = &["local-lvm", "local-zfs", "local"];

/// Backends and template chosen for this run. Computed once, then read-only.
#[derive(Debug, Clone)]
pub struct ResourceSelection {
    pub rootfs_storage: String,
    pub template_storage: String,
    pub template: String,
    pub fallback_used: bool,
}

impl ResourceSelection {
    /// Volume id handed to `pct create`.
    pub fn template_volid(&self) -> String {
        format!("{}:vztmpl/{}", self.template_storage, self.template)
    }
}

/// Pick one backend per storage role, in the host's listed order. Never
/// mutates host state.
pub async fn select_storage(runner: &dyn CommandRunner) -> Result<(String, String)> {
    let rootfs_storage = match storage::storages_with_content(runner, ROOTFS_CONTENT)
        .await?
        .into_iter()
        .next()
    {
        Some(name) => name,
        None => pick_rootfs_by_name(runner).await?,
    };

    let template_storage = storage::storages_with_content(runner, TEMPLATE_CONTENT)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| {
            ProvisionError::Selection(
                "no storage backend supports container templates (vztmpl)".to_string(),
            )
        })?;

    info!(rootfs = %rootfs_storage, templates = %template_storage, "storage selected");
    Ok((rootfs_storage, template_storage))
}

/// Second tier of the storage strategy: match well-known names against the
/// unfiltered inventory before giving up.
async fn pick_rootfs_by_name(runner: &dyn CommandRunner) -> Result<String> {
    let all = storage::all_storages(runner).await?;
    for candidate in ROOTFS_NAME_FALLBACK {
        if all.iter().any(|name| name == candidate) {
            warn!(
                storage = candidate,
                "no backend advertises rootdir content, falling back by name"
            );
            return Ok(candidate.to_string());
        }
    }
    Err(ProvisionError::Selection(
        "no storage backend supports container root filesystems".to_string(),
    )
    .into())
}

/// Pick the template: refresh the catalog (best-effort), then search the
/// primary family, then exactly one fallback family. First catalog match
/// wins; catalog order is the tie-break.
pub async fn select_template(runner: &dyn CommandRunner) -> Result<(String, bool)> {
    template::refresh_catalog(runner).await?;

    if let Some(name) = template::available_templates(runner, PRIMARY_FAMILY)
        .await?
        .into_iter()
        .next()
    {
        info!(template = %name, "template selected");
        return Ok((name, false));
    }

    warn!(
        primary = PRIMARY_FAMILY,
        fallback = FALLBACK_FAMILY,
        "primary OS family not in catalog, trying fallback"
    );

    if let Some(name) = template::available_templates(runner, FALLBACK_FAMILY)
        .await?
        .into_iter()
        .next()
    {
        info!(template = %name, "fallback template selected");
        return Ok((name, true));
    }

    Err(ProvisionError::Selection(format!(
        "no {} or {} template in the catalog",
        PRIMARY_FAMILY, FALLBACK_FAMILY
    ))
    .into())
}

/// Full resource selection for a run.
pub async fn select_resources(runner: &dyn CommandRunner) -> Result<ResourceSelection> {
    let (rootfs_storage, template_storage) = select_storage(runner).await?;
    let (template, fallback_used) = select_template(runner).await?;
    Ok(ResourceSelection {
        rootfs_storage,
        template_storage,
        template,
        fallback_used,
    })
}

//! Template provisioning: make sure the selected OS image exists on the
//! template storage before any container references it.

use anyhow::Result;
use tracing::info;

use crate::pve::{self, CommandRunner};
use crate::selection::ResourceSelection;

/// Idempotent: checks presence first and only downloads when the artifact
/// is absent, so a rerun with the template in place issues no transfer.
pub async fn ensure_template(
    runner: &dyn CommandRunner,
    selection: &ResourceSelection,
) -> Result<()> {
    if pve::template::is_downloaded(runner, &selection.template_storage, &selection.template)
        .await?
    {
        info!(template = %selection.template, "template already present");
        return Ok(());
    }

    info!(
        template = %selection.template,
        storage = %selection.template_storage,
        "downloading template, this can take a while"
    );
    pve::template::download(runner, &selection.template_storage, &selection.template).await?;
    info!(template = %selection.template, "template downloaded");
    Ok(())
}

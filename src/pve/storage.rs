//! Parsing adapter for `pvesm`, the host storage manager.
//!
//! `pvesm status` prints a table; the first column is the backend name and
//! the first row is a header. The pipeline only ever needs the names.

use anyhow::{bail, Result};

use super::runner::CommandRunner;

/// Storage backends advertising a given content capability
/// (`rootdir` for container root filesystems, `vztmpl` for templates),
/// in the host's listed order.
pub async fn storages_with_content(
    runner: &dyn CommandRunner,
    content: &str,
) -> Result<Vec<String>> {
    let output = runner
        .run("pvesm", &["status", "-content", content])
        .await?;
    if !output.success() {
        bail!("pvesm status -content {} failed: {}", content, output.stderr.trim());
    }
    Ok(parse_storage_table(&output.stdout))
}

/// All storage backends regardless of declared content, for the static
/// name fallback.
pub async fn all_storages(runner: &dyn CommandRunner) -> Result<Vec<String>> {
    let output = runner.run("pvesm", &["status"]).await?;
    if !output.success() {
        bail!("pvesm status failed: {}", output.stderr.trim());
    }
    Ok(parse_storage_table(&output.stdout))
}

fn parse_storage_table(text: &str) -> Vec<String> {
    text.lines()
        .skip(1) // header row
        .filter_map(|line| line.split_whitespace().next())
        .map(str::to_string)
        .collect()
}

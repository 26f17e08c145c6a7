//! Host capability probe. Runs before anything else; the pipeline cannot
//! proceed on the wrong host type or without root.

use anyhow::Result;
use tracing::info;

use crate::error::ProvisionError;
use crate::pve::CommandRunner;

/// Facts gathered about the execution environment.
#[derive(Debug, Clone)]
pub struct HostInfo {
    /// `pve-manager` version token, e.g. `8.2.4`.
    pub pve_version: String,
}

pub fn running_as_root() -> bool {
    nix::unistd::Uid::effective().is_root()
}

/// Verify this is a Proxmox VE host and we hold enough privilege to drive
/// it. `euid_is_root` is injected so tests can exercise both branches.
pub async fn verify_host_environment(
    runner: &dyn CommandRunner,
    euid_is_root: bool,
) -> Result<HostInfo> {
    if !euid_is_root {
        return Err(ProvisionError::Environment(
            "must run as root on the Proxmox host".to_string(),
        )
        .into());
    }

    let output = match runner.run("pveversion", &[]).await {
        Ok(output) if output.success() => output,
        Ok(output) => {
            return Err(ProvisionError::Environment(format!(
                "pveversion failed: {}",
                output.stderr.trim()
            ))
            .into())
        }
        Err(_) => {
            return Err(ProvisionError::Environment(
                "pveversion not found; this host does not look like Proxmox VE".to_string(),
            )
            .into())
        }
    };

    let pve_version = parse_pve_version(&output.stdout).ok_or_else(|| {
        ProvisionError::Environment(format!(
            "could not parse pveversion output: {:?}",
            output.stdout.trim()
        ))
    })?;

    info!(version = %pve_version, "Proxmox VE host detected");
    Ok(HostInfo { pve_version })
}

/// First line carrying `pve-manager/<version>/...`; the version is the
/// token between the slashes.
fn parse_pve_version(text: &str) -> Option<String> {
    text.lines()
        .find(|line| line.contains("pve-manager/"))
        .and_then(|line| line.split('/').nth(1))
        .map(str::to_string)
}

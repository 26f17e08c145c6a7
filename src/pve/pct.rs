//! Parsing adapter for `pct` (container primitives) and the cluster-wide
//! id allocator (`pvesh get /cluster/nextid`).

use anyhow::Result;

use crate::error::ProvisionError;

use super::runner::{CmdOutput, CommandRunner};

/// Observed container state, parsed out of `pct status` free text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CtState {
    Running,
    Stopped,
    Unknown,
}

/// Structured parameter set for the single `pct create` call.
#[derive(Debug, Clone)]
pub struct CreateSpec {
    pub vmid: u32,
    /// Template volume id, `<storage>:vztmpl/<template>`.
    pub template_volid: String,
    pub hostname: String,
    pub password: String,
    pub ostype: String,
    pub cores: u32,
    pub memory_mb: u32,
    pub swap_mb: u32,
    /// Root filesystem spec, `<storage>:<size-gb>`.
    pub rootfs: String,
    /// Network interface spec, `name=eth0,bridge=<bridge>,ip=dhcp`.
    pub net0: String,
    pub unprivileged: &'static str,
    pub features: &'static str,
}

impl CreateSpec {
    /// Argument vector for `pct`. The container is created stopped and
    /// without autostart; starting is its own observable stage.
    pub fn to_args(&self) -> Vec<String> {
        vec![
            "create".to_string(),
            self.vmid.to_string(),
            self.template_volid.clone(),
            "--hostname".to_string(),
            self.hostname.clone(),
            "--password".to_string(),
            self.password.clone(),
            "--ostype".to_string(),
            self.ostype.clone(),
            "--cores".to_string(),
            self.cores.to_string(),
            "--memory".to_string(),
            self.memory_mb.to_string(),
            "--swap".to_string(),
            self.swap_mb.to_string(),
            "--rootfs".to_string(),
            self.rootfs.clone(),
            "--net0".to_string(),
            self.net0.clone(),
            "--unprivileged".to_string(),
            self.unprivileged.to_string(),
            "--features".to_string(),
            self.features.to_string(),
            "--onboot".to_string(),
            "0".to_string(),
            "--start".to_string(),
            "0".to_string(),
        ]
    }
}

/// Next free container id from the cluster. Output is a bare integer.
pub async fn next_free_vmid(runner: &dyn CommandRunner) -> Result<u32> {
    let output = runner.run("pvesh", &["get", "/cluster/nextid"]).await?;
    if !output.success() {
        return Err(ProvisionError::Lifecycle(format!(
            "querying next free container id failed: {}",
            output.stderr.trim()
        ))
        .into());
    }
    let id = output.stdout.trim().parse::<u32>().map_err(|_| {
        ProvisionError::Lifecycle(format!(
            "unexpected next-id output: {:?}",
            output.stdout.trim()
        ))
    })?;
    Ok(id)
}

/// Whether a container id is already taken. A successful status query
/// means something answers to that id.
pub async fn vmid_in_use(runner: &dyn CommandRunner, vmid: u32) -> Result<bool> {
    let output = runner.run("pct", &["status", &vmid.to_string()]).await?;
    Ok(output.success())
}

pub async fn create(runner: &dyn CommandRunner, spec: &CreateSpec) -> Result<()> {
    let args = spec.to_args();
    let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
    let output = runner.run("pct", &arg_refs).await?;
    if !output.success() {
        // The host's own refusal (including a duplicate-id conflict after
        // our pre-check) is authoritative.
        return Err(ProvisionError::Lifecycle(format!(
            "pct create {} failed: {}",
            spec.vmid,
            output.stderr.trim()
        ))
        .into());
    }
    Ok(())
}

pub async fn start(runner: &dyn CommandRunner, vmid: u32) -> Result<()> {
    let output = runner.run("pct", &["start", &vmid.to_string()]).await?;
    if !output.success() {
        return Err(ProvisionError::Lifecycle(format!(
            "pct start {} failed: {}",
            vmid,
            output.stderr.trim()
        ))
        .into());
    }
    Ok(())
}

/// Parse `pct status <vmid>`; errors degrade to `Unknown` so status polls
/// stay non-fatal.
pub async fn status(runner: &dyn CommandRunner, vmid: u32) -> CtState {
    match runner.run("pct", &["status", &vmid.to_string()]).await {
        Ok(output) if output.success() => parse_status(&output.stdout),
        _ => CtState::Unknown,
    }
}

/// Run a command inside the container, capturing combined output.
pub async fn exec(
    runner: &dyn CommandRunner,
    vmid: u32,
    command: &[&str],
) -> Result<CmdOutput> {
    let vmid = vmid.to_string();
    let mut args = vec!["exec", vmid.as_str(), "--"];
    args.extend_from_slice(command);
    runner.run("pct", &args).await
}

/// Run a command inside the container with stdio inherited, for flows
/// where the operator has to read output while the command blocks.
pub async fn exec_streamed(
    runner: &dyn CommandRunner,
    vmid: u32,
    command: &[&str],
) -> Result<CmdOutput> {
    let vmid = vmid.to_string();
    let mut args = vec!["exec", vmid.as_str(), "--"];
    args.extend_from_slice(command);
    runner.run_streamed("pct", &args).await
}

fn parse_status(text: &str) -> CtState {
    if text.contains("running") {
        CtState::Running
    } else if text.contains("stopped") {
        CtState::Stopped
    } else {
        CtState::Unknown
    }
}

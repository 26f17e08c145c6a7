//! Container lifecycle: id allocation, creation, device overrides, start
//! and network readiness.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use regex::Regex;
use tokio::io::AsyncWriteExt;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::ProvisionError;
use crate::pve::pct::{self, CreateSpec, CtState};
use crate::pve::CommandRunner;
use crate::retry::{poll_until, Polled, RetryPolicy};
use crate::selection::ResourceSelection;
use crate::types::{ProvisioningRequest, OSTYPE};

/// Where the host keeps per-container config files.
const DEFAULT_CONFIG_DIR: &str = "/etc/pve/lxc";

/// Delay between `pct start` returning and the single status check;
/// startup legitimately lags the command.
const START_SETTLE: Duration = Duration::from_secs(3);

/// Bounded poll for the container's first DHCP lease.
const ADDRESS_POLL: RetryPolicy = RetryPolicy::new(15, Duration::from_secs(2));

/// Raw passthrough directives for the VPN tunnel device. Unprivileged
/// containers cannot open /dev/net/tun without them.
const TUN_DIRECTIVES: &str = "\
lxc.cgroup2.devices.allow: c 10:200 rwm
lxc.mount.entry: /dev/net/tun dev/net/tun none bind,create=file
";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CtStatus {
    Created,
    Starting,
    Running,
    NetworkPending,
    NetworkReady,
    Failed,
}

/// Handle to the container this run created. Owned by the lifecycle
/// manager; other stages only ever read the id. The pipeline never
/// destroys a container; teardown is an explicit operator action.
#[derive(Debug, Clone)]
pub struct ContainerHandle {
    pub vmid: u32,
    pub status: CtStatus,
}

pub struct LifecycleManager<'a> {
    runner: &'a dyn CommandRunner,
    config_dir: PathBuf,
    start_settle: Duration,
    address_poll: RetryPolicy,
}

impl<'a> LifecycleManager<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self {
            runner,
            config_dir: PathBuf::from(DEFAULT_CONFIG_DIR),
            start_settle: START_SETTLE,
            address_poll: ADDRESS_POLL,
        }
    }

    /// Point at a different container config directory (tests).
    pub fn with_config_dir(mut self, dir: PathBuf) -> Self {
        self.config_dir = dir;
        self
    }

    /// Override the polling timings (tests run with zero delay).
    pub fn with_timings(mut self, start_settle: Duration, address_poll: RetryPolicy) -> Self {
        self.start_settle = start_settle;
        self.address_poll = address_poll;
        self
    }

    /// Resolve the container id: a pinned id must be free, otherwise ask
    /// the host for the next free one. The check-then-create race is
    /// accepted; `pct create` failing on a duplicate is authoritative.
    pub async fn allocate_identifier(&self, requested: Option<u32>) -> Result<u32> {
        match requested {
            Some(vmid) => {
                if pct::vmid_in_use(self.runner, vmid).await? {
                    return Err(ProvisionError::Validation(format!(
                        "container id {} is already in use",
                        vmid
                    ))
                    .into());
                }
                Ok(vmid)
            }
            None => {
                let vmid = pct::next_free_vmid(self.runner).await?;
                info!(vmid, "allocated container id");
                Ok(vmid)
            }
        }
    }

    /// One `pct create` call carrying the whole parameter set. The
    /// container comes up stopped and without autostart; starting is a
    /// separate, observable stage.
    pub async fn create(
        &self,
        vmid: u32,
        request: &ProvisioningRequest,
        selection: &ResourceSelection,
    ) -> Result<ContainerHandle> {
        let spec = build_create_spec(vmid, request, selection);
        info!(vmid, template = %spec.template_volid, "creating container");
        pct::create(self.runner, &spec).await?;
        Ok(ContainerHandle {
            vmid,
            status: CtStatus::Created,
        })
    }

    /// Append the TUN passthrough directives to the container config.
    /// Unprivileged containers only; a plain textual append, applied
    /// exactly once (a rerun finds the directives and leaves the file
    /// alone).
    pub async fn apply_device_overrides(
        &self,
        handle: &ContainerHandle,
        request: &ProvisioningRequest,
    ) -> Result<()> {
        if !request.privilege.needs_tun_passthrough() {
            info!(vmid = handle.vmid, "privileged container, no device overrides needed");
            return Ok(());
        }

        let conf_path = self.config_dir.join(format!("{}.conf", handle.vmid));
        let existing = tokio::fs::read_to_string(&conf_path)
            .await
            .with_context(|| format!("reading {}", conf_path.display()))?;
        if existing.contains("dev/net/tun") {
            info!(vmid = handle.vmid, "device overrides already present");
            return Ok(());
        }

        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .open(&conf_path)
            .await
            .with_context(|| format!("opening {}", conf_path.display()))?;
        let mut block = String::new();
        if !existing.ends_with('\n') && !existing.is_empty() {
            block.push('\n');
        }
        block.push_str(TUN_DIRECTIVES);
        file.write_all(block.as_bytes())
            .await
            .with_context(|| format!("appending to {}", conf_path.display()))?;

        info!(vmid = handle.vmid, "TUN device passthrough configured");
        Ok(())
    }

    /// Start the container, give it a moment to settle, then check the
    /// status once. A mismatch is a warning, not a failure; startup may
    /// legitimately lag the status query.
    pub async fn start(&self, handle: &mut ContainerHandle) -> Result<()> {
        handle.status = CtStatus::Starting;
        if let Err(e) = pct::start(self.runner, handle.vmid).await {
            handle.status = CtStatus::Failed;
            return Err(e);
        }

        sleep(self.start_settle).await;
        match pct::status(self.runner, handle.vmid).await {
            CtState::Running => {
                info!(vmid = handle.vmid, "container is running");
            }
            state => {
                warn!(
                    vmid = handle.vmid,
                    ?state,
                    "container not reported running yet, continuing"
                );
            }
        }
        handle.status = CtStatus::Running;
        Ok(())
    }

    /// Poll the container's primary interface for a non-loopback address.
    /// Exhausting the attempts yields `Pending`, never an error; the
    /// operator can check again once DHCP settles.
    pub async fn poll_network_address(&self, handle: &mut ContainerHandle) -> Polled<String> {
        handle.status = CtStatus::NetworkPending;
        let runner = self.runner;
        let vmid = handle.vmid;
        let result = poll_until(self.address_poll, move |_| async move {
            let output = pct::exec(runner, vmid, &["ip", "-4", "-o", "addr", "show", "dev", "eth0"])
                .await
                .ok()?;
            if !output.success() {
                return None;
            }
            parse_interface_address(&output.stdout)
        })
        .await;

        match &result {
            Polled::Ready(ip) => {
                handle.status = CtStatus::NetworkReady;
                info!(vmid = handle.vmid, ip = %ip, "container network is up");
            }
            Polled::Pending => {
                warn!(
                    vmid = handle.vmid,
                    "container did not get an address in time, continuing without one"
                );
            }
        }
        result
    }
}

fn build_create_spec(
    vmid: u32,
    request: &ProvisioningRequest,
    selection: &ResourceSelection,
) -> CreateSpec {
    CreateSpec {
        vmid,
        template_volid: selection.template_volid(),
        hostname: request.hostname.clone(),
        password: request.password.clone(),
        ostype: OSTYPE.to_string(),
        cores: request.cores,
        memory_mb: request.memory_mb,
        swap_mb: request.swap_mb,
        rootfs: format!("{}:{}", selection.rootfs_storage, request.disk_gb),
        net0: format!("name=eth0,bridge={},ip=dhcp", request.bridge),
        unprivileged: request.privilege.unprivileged_flag(),
        features: request.privilege.feature_flags(),
    }
}

/// First non-loopback IPv4 address in `ip -o addr` output.
fn parse_interface_address(text: &str) -> Option<String> {
    let pattern = Regex::new(r"inet (\d+\.\d+\.\d+\.\d+)").ok()?;
    let result = pattern
        .captures_iter(text)
        .map(|c| c[1].to_string())
        .find(|ip| !ip.starts_with("127."));
    result
}

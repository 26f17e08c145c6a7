//! In-container payload: base package update, VPN client install, and the
//! authenticate/connect sequence.

use std::time::Duration;

use anyhow::Result;
use regex::Regex;
use tracing::{info, warn};

use crate::error::ProvisionError;
use crate::lifecycle::ContainerHandle;
use crate::pve::pct;
use crate::pve::CommandRunner;
use crate::retry::{poll_until, Polled, RetryPolicy};
use crate::types::{AuthMethod, ConnectionResult, ProvisioningRequest};

/// Bounded poll for the client to report an established connection.
const STATUS_POLL: RetryPolicy = RetryPolicy::new(12, Duration::from_secs(5));

const APT_BOOTSTRAP: &str = "export DEBIAN_FRONTEND=noninteractive; \
apt-get -y update && apt-get -y dist-upgrade && apt-get -y install curl ca-certificates";

const CLIENT_INSTALL: &str = "curl -fsSL https://pkgs.netbird.io/install.sh | sh";

pub struct PayloadInstaller<'a> {
    runner: &'a dyn CommandRunner,
    status_poll: RetryPolicy,
}

impl<'a> PayloadInstaller<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self {
            runner,
            status_poll: STATUS_POLL,
        }
    }

    pub fn with_status_poll(mut self, policy: RetryPolicy) -> Self {
        self.status_poll = policy;
        self
    }

    /// Update the base system and install the VPN client. Any non-zero
    /// exit aborts the pipeline; the container stays allocated for the
    /// operator to inspect, nothing is rolled back.
    pub async fn run_update_and_install(&self, handle: &ContainerHandle) -> Result<()> {
        info!(vmid = handle.vmid, "updating base system inside the container");
        self.exec_checked(handle, APT_BOOTSTRAP, "base system update")
            .await?;

        info!(vmid = handle.vmid, "installing the NetBird client");
        self.exec_checked(handle, CLIENT_INSTALL, "NetBird client install")
            .await?;
        Ok(())
    }

    /// Join the overlay network and wait (bounded) for the client to
    /// report a connection. Exhausting the poll is a degraded result,
    /// not a failure.
    pub async fn authenticate_and_connect(
        &self,
        handle: &ContainerHandle,
        request: &ProvisioningRequest,
    ) -> Result<ConnectionResult> {
        match &request.auth {
            AuthMethod::SetupKey { key } => {
                info!(vmid = handle.vmid, "joining the network with a setup key");
                let output = pct::exec(
                    self.runner,
                    handle.vmid,
                    &["netbird", "up", "--setup-key", key],
                )
                .await?;
                if !output.success() {
                    return Err(ProvisionError::Install(format!(
                        "netbird up failed: {}",
                        output.combined().trim()
                    ))
                    .into());
                }
            }
            AuthMethod::Sso => {
                // The login command prints a URL the operator has to open
                // while it blocks, so its output must stream straight
                // through instead of being captured.
                info!(vmid = handle.vmid, "starting interactive SSO login");
                println!("Complete the login in your browser when the URL appears below.");
                let output =
                    pct::exec_streamed(self.runner, handle.vmid, &["netbird", "login"]).await?;
                if !output.success() {
                    return Err(ProvisionError::Install(
                        "netbird login did not complete".to_string(),
                    )
                    .into());
                }

                let output = pct::exec(self.runner, handle.vmid, &["netbird", "up"]).await?;
                if !output.success() {
                    return Err(ProvisionError::Install(format!(
                        "netbird up failed: {}",
                        output.combined().trim()
                    ))
                    .into());
                }
            }
        }

        Ok(self.poll_connection(handle).await)
    }

    async fn exec_checked(
        &self,
        handle: &ContainerHandle,
        script: &str,
        what: &str,
    ) -> Result<()> {
        let output = pct::exec(self.runner, handle.vmid, &["bash", "-c", script]).await?;
        if !output.success() {
            return Err(ProvisionError::Install(format!(
                "{} exited non-zero: {}",
                what,
                output.combined().trim()
            ))
            .into());
        }
        Ok(())
    }

    /// Best-effort from the provisioner's point of view: the overlay may
    /// take longer than our attempts, and that is fine.
    async fn poll_connection(&self, handle: &ContainerHandle) -> ConnectionResult {
        let runner = self.runner;
        let vmid = handle.vmid;
        let polled = poll_until(self.status_poll, move |_| async move {
            let output = pct::exec(runner, vmid, &["netbird", "status"]).await.ok()?;
            let text = output.combined();
            if !is_connected(&text) {
                return None;
            }
            Some((extract_overlay_address(&text), extract_fqdn(&text), text))
        })
        .await;

        match polled {
            Polled::Ready((ip, fqdn, raw_status)) => {
                if let Some(ip) = &ip {
                    info!(vmid, ip = %ip, "VPN connection established");
                }
                ConnectionResult {
                    ip: ip.map_or(Polled::Pending, Polled::Ready),
                    fqdn: fqdn.map_or(Polled::Pending, Polled::Ready),
                    raw_status,
                }
            }
            Polled::Pending => {
                warn!(
                    vmid,
                    "client did not report a connection in time; it may still come up"
                );
                ConnectionResult::pending(String::new())
            }
        }
    }
}

fn is_connected(status_text: &str) -> bool {
    status_text.contains("Management: Connected")
}

fn extract_overlay_address(status_text: &str) -> Option<String> {
    let pattern = Regex::new(r"NetBird IP:\s*([0-9.]+)").ok()?;
    pattern
        .captures(status_text)
        .map(|c| c[1].to_string())
}

fn extract_fqdn(status_text: &str) -> Option<String> {
    let pattern = Regex::new(r"FQDN:\s*(\S+)").ok()?;
    pattern
        .captures(status_text)
        .map(|c| c[1].to_string())
}

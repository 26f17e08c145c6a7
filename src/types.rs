use serde::{Deserialize, Serialize};

use crate::retry::Polled;

/// Sizing defaults for a freshly provisioned container.
pub const DEFAULT_CORES: u32 = 1;
pub const DEFAULT_MEMORY_MB: u32 = 512;
pub const DEFAULT_SWAP_MB: u32 = 512;
pub const DEFAULT_DISK_GB: u32 = 4;
pub const DEFAULT_BRIDGE: &str = "vmbr0";

/// OS type tag passed to the host on create.
pub const OSTYPE: &str = "debian";

/// Container isolation mode. Each variant carries its host-side effects as
/// data: the feature flags requested at create time and whether the TUN
/// device passthrough has to be written into the container config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrivilegeMode {
    Unprivileged,
    Privileged,
}

impl PrivilegeMode {
    pub fn from_flag(privileged: bool) -> Self {
        if privileged {
            PrivilegeMode::Privileged
        } else {
            PrivilegeMode::Unprivileged
        }
    }

    /// Feature flags for `pct create --features`. The VPN client needs
    /// nesting and, in unprivileged containers, kernel keyring access;
    /// privileged containers get keyctl from the host policy already and
    /// must not request it.
    pub fn feature_flags(&self) -> &'static str {
        match self {
            PrivilegeMode::Unprivileged => "nesting=1,keyctl=1",
            PrivilegeMode::Privileged => "nesting=1",
        }
    }

    /// Value for the `--unprivileged` create flag.
    pub fn unprivileged_flag(&self) -> &'static str {
        match self {
            PrivilegeMode::Unprivileged => "1",
            PrivilegeMode::Privileged => "0",
        }
    }

    /// Unprivileged containers need explicit /dev/net/tun passthrough;
    /// privileged ones already see host devices.
    pub fn needs_tun_passthrough(&self) -> bool {
        matches!(self, PrivilegeMode::Unprivileged)
    }
}

/// How the node authenticates against the overlay network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMethod {
    /// Pre-shared key, joined non-interactively.
    SetupKey { key: String },
    /// Interactive SSO login; the login URL streams to the operator.
    Sso,
}

impl AuthMethod {
    pub fn label(&self) -> &'static str {
        match self {
            AuthMethod::SetupKey { .. } => "setup key",
            AuthMethod::Sso => "SSO login",
        }
    }
}

/// Everything the pipeline needs to know before touching the host.
/// Built once by the input collector and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct ProvisioningRequest {
    pub hostname: String,
    pub password: String,
    pub cores: u32,
    pub memory_mb: u32,
    pub swap_mb: u32,
    pub disk_gb: u32,
    pub bridge: String,
    /// Pinned container id; `None` asks the host for the next free one.
    pub vmid: Option<u32>,
    pub privilege: PrivilegeMode,
    pub auth: AuthMethod,
}

/// What the VPN client reported once the payload ran. Pending fields mean
/// the bounded status poll ran out before the client connected; the
/// pipeline still completes with a degraded summary.
#[derive(Debug, Clone)]
pub struct ConnectionResult {
    pub ip: Polled<String>,
    pub fqdn: Polled<String>,
    pub raw_status: String,
}

impl ConnectionResult {
    pub fn pending(raw_status: String) -> Self {
        Self {
            ip: Polled::Pending,
            fqdn: Polled::Pending,
            raw_status,
        }
    }
}

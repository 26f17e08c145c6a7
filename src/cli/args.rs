use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "nblxc", version, about = "NetBird VPN container provisioner for Proxmox VE")]
pub struct Cli {
    /// Base directory for nblxc data (provisioning records)
    #[arg(long, global = true)]
    pub base_dir: Option<String>,

    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Provision a container and install the NetBird client in it
    Create(CreateArgs),
    /// List containers provisioned by this tool
    Ls,
    /// Check host requirements and show status
    Preflight,
}

/// Every value can be supplied up front; anything missing is prompted for.
#[derive(Args, Debug, Default)]
pub struct CreateArgs {
    /// Container hostname
    #[arg(long)]
    pub hostname: Option<String>,

    /// Root password (min 5 characters; prompted for when omitted)
    #[arg(long)]
    pub password: Option<String>,

    /// CPU cores
    #[arg(long)]
    pub cores: Option<u32>,

    /// Memory (MiB)
    #[arg(long)]
    pub memory: Option<u32>,

    /// Swap (MiB)
    #[arg(long)]
    pub swap: Option<u32>,

    /// Root disk size (GiB)
    #[arg(long)]
    pub disk: Option<u32>,

    /// Network bridge
    #[arg(long)]
    pub bridge: Option<String>,

    /// Pin a specific container id instead of taking the next free one
    #[arg(long)]
    pub vmid: Option<u32>,

    /// Create a privileged container
    #[arg(long)]
    pub privileged: bool,

    /// NetBird setup key for non-interactive join
    #[arg(long)]
    pub setup_key: Option<String>,

    /// Use interactive SSO login instead of a setup key
    #[arg(long, conflicts_with = "setup_key")]
    pub sso: bool,

    /// Prompt for sizing, bridge, id and isolation instead of defaults
    #[arg(long)]
    pub advanced: bool,

    /// Skip the final confirmation
    #[arg(long, short = 'y')]
    pub yes: bool,
}

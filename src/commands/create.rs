//! The provisioning pipeline: one strictly ordered pass, fail-fast, no
//! rollback of host resources on failure.

use anyhow::Result;
use tracing::{info, warn};

use crate::cli::CreateArgs;
use crate::input::{self, PromptSource, TerminalPrompt};
use crate::lifecycle::{ContainerHandle, LifecycleManager};
use crate::paths;
use crate::payload::PayloadInstaller;
use crate::probe;
use crate::pve::{CommandRunner, HostRunner};
use crate::retry::Polled;
use crate::selection;
use crate::state::{ProvisionRecord, RecordStore};
use crate::template;
use crate::types::{ConnectionResult, ProvisioningRequest};

/// Everything the pipeline needs from its surroundings, bundled so tests
/// can swap in a mock host, scripted prompts and relaxed timings.
pub struct PipelineEnv<'a> {
    pub runner: &'a dyn CommandRunner,
    pub euid_is_root: bool,
    pub lifecycle: LifecycleManager<'a>,
    pub payload: PayloadInstaller<'a>,
    pub record_store: Option<RecordStore>,
}

#[derive(Debug)]
pub enum CreateOutcome {
    /// Operator declined the confirmation gate; nothing was created.
    Cancelled,
    Provisioned {
        vmid: u32,
        connection: ConnectionResult,
    },
}

pub async fn cmd_create(args: CreateArgs) -> Result<()> {
    let runner = HostRunner;
    let env = PipelineEnv {
        runner: &runner,
        euid_is_root: probe::running_as_root(),
        lifecycle: LifecycleManager::new(&runner),
        payload: PayloadInstaller::new(&runner),
        record_store: Some(RecordStore::new(paths::record_dir())),
    };
    let mut prompts = TerminalPrompt;

    match run_create(&env, &mut prompts, &args).await? {
        CreateOutcome::Cancelled => {
            println!("Aborted; nothing was created.");
            Ok(())
        }
        CreateOutcome::Provisioned { .. } => Ok(()),
    }
}

/// Stage order is the contract: probe, select, fetch, collect, allocate,
/// create, overrides, start, address, install, connect. Each stage only
/// sees the value objects the previous stages produced.
pub async fn run_create(
    env: &PipelineEnv<'_>,
    prompts: &mut dyn PromptSource,
    args: &CreateArgs,
) -> Result<CreateOutcome> {
    let host = probe::verify_host_environment(env.runner, env.euid_is_root).await?;
    info!(pve_version = %host.pve_version, "host environment verified");

    let selection = selection::select_resources(env.runner).await?;
    template::ensure_template(env.runner, &selection).await?;

    let request = match input::collect(args, prompts)? {
        Some(request) => request,
        None => return Ok(CreateOutcome::Cancelled),
    };

    let vmid = env.lifecycle.allocate_identifier(request.vmid).await?;
    let mut handle = env.lifecycle.create(vmid, &request, &selection).await?;
    env.lifecycle
        .apply_device_overrides(&handle, &request)
        .await?;
    env.lifecycle.start(&mut handle).await?;
    let local_ip = env.lifecycle.poll_network_address(&mut handle).await;

    env.payload.run_update_and_install(&handle).await?;
    let connection = env
        .payload
        .authenticate_and_connect(&handle, &request)
        .await?;

    print_result(&request, &handle, &local_ip, &connection);

    if let Some(store) = &env.record_store {
        let record = ProvisionRecord::new(vmid, &request, &selection, &connection);
        if let Err(e) = write_record(store, &record).await {
            warn!(error = %e, "could not write provisioning record");
        }
    }

    Ok(CreateOutcome::Provisioned { vmid, connection })
}

async fn write_record(store: &RecordStore, record: &ProvisionRecord) -> Result<()> {
    store.init().await?;
    store.save(record).await
}

fn print_result(
    request: &ProvisioningRequest,
    handle: &ContainerHandle,
    local_ip: &Polled<String>,
    connection: &ConnectionResult,
) {
    println!();
    println!("Container {} ({}) is provisioned.", handle.vmid, request.hostname);
    match local_ip {
        Polled::Ready(ip) => println!("  Local address:   {}", ip),
        Polled::Pending => println!("  Local address:   pending (DHCP had not answered yet)"),
    }
    match connection.ip.as_ref() {
        Polled::Ready(ip) => println!("  NetBird address: {}", ip),
        Polled::Pending => {
            println!("  NetBird address: pending");
            println!(
                "  The client may still be connecting; check with: pct exec {} -- netbird status",
                handle.vmid
            );
        }
    }
    if let Polled::Ready(fqdn) = connection.fqdn.as_ref() {
        println!("  NetBird FQDN:    {}", fqdn);
    }
    println!();
}

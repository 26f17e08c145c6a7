// End-to-end pipeline tests against a mocked host and scripted prompts.

mod common;

use anyhow::Result;
use std::time::Duration;

use common::{MockHost, ScriptedPrompt};
use nblxc::cli::CreateArgs;
use nblxc::commands::{run_create, CreateOutcome};
use nblxc::error::ProvisionError;
use nblxc::lifecycle::{ContainerHandle, CtStatus, LifecycleManager};
use nblxc::payload::PayloadInstaller;
use nblxc::pve::CmdOutput;
use nblxc::retry::{Polled, RetryPolicy};
use nblxc::selection;
use nblxc::template;
use nblxc::types::{AuthMethod, PrivilegeMode, ProvisioningRequest};

fn happy_host() -> MockHost {
    MockHost::new()
        .respond("pveversion", CmdOutput::ok(common::PVEVERSION))
        .respond(
            "pvesm status -content rootdir",
            CmdOutput::ok(common::STORAGE_ROOTDIR),
        )
        .respond(
            "pvesm status -content vztmpl",
            CmdOutput::ok(common::STORAGE_VZTMPL),
        )
        .respond("pveam available", CmdOutput::ok(common::CATALOG_FULL))
        .respond("pveam list local", CmdOutput::ok(""))
        .respond("pvesh get /cluster/nextid", CmdOutput::ok("105\n"))
        .respond("pct status 105", CmdOutput::ok("status: running\n"))
        .respond(
            "ip -4 -o addr show dev eth0",
            CmdOutput::ok(common::ETH0_WITH_LEASE),
        )
        .respond("netbird status", CmdOutput::ok(common::NETBIRD_CONNECTED))
}

fn seed_container_config(dir: &std::path::Path, vmid: u32) {
    // pct create writes the config file on a real host; the mock does not.
    std::fs::write(
        dir.join(format!("{}.conf", vmid)),
        "arch: amd64\nostype: debian\n",
    )
    .unwrap();
}

/// Interactive answers driving a setup-key run with all defaults.
const SETUP_KEY_ANSWERS: &[&str] = &[
    "netbird", // hostname
    "abcde",   // password
    "abcde",   // confirmation
    "",        // join with setup key? (default yes)
    "XYZ",     // the key
    "y",       // confirm the key
    "",        // final gate (default yes)
];

#[tokio::test]
async fn test_scenario_setup_key_happy_path() -> Result<()> {
    let host = happy_host();
    let config_dir = tempfile::tempdir()?;
    seed_container_config(config_dir.path(), 105);

    let env = common::test_env(&host, config_dir.path());
    let mut prompts = ScriptedPrompt::new(SETUP_KEY_ANSWERS);
    let args = CreateArgs::default();

    let outcome = run_create(&env, &mut prompts, &args).await?;
    let (vmid, connection) = match outcome {
        CreateOutcome::Provisioned { vmid, connection } => (vmid, connection),
        other => panic!("expected Provisioned, got {:?}", other),
    };

    assert_eq!(vmid, 105);
    assert_eq!(connection.ip, Polled::Ready("100.92.140.7".to_string()));
    assert_eq!(
        connection.fqdn,
        Polled::Ready("netbird.netbird.cloud".to_string())
    );

    // One create call with the full parameter set and unprivileged flags.
    let create = host.find_call("pct create 105").expect("create was issued");
    assert!(create.contains("local:vztmpl/debian-13-standard_13.1-1_amd64.tar.zst"));
    assert!(create.contains("--hostname netbird"));
    assert!(create.contains("--cores 1"));
    assert!(create.contains("--memory 512"));
    assert!(create.contains("--rootfs local-lvm:4"));
    assert!(create.contains("--net0 name=eth0,bridge=vmbr0,ip=dhcp"));
    assert!(create.contains("--unprivileged 1"));
    assert!(create.contains("--features nesting=1,keyctl=1"));
    assert!(create.contains("--start 0"));

    // Template was absent, so exactly one download.
    assert_eq!(host.count_calls("pveam download local debian-13-standard"), 1);

    // Joined with the key collected interactively.
    assert_eq!(host.count_calls("netbird up --setup-key XYZ"), 1);

    // TUN passthrough appended to the container config.
    let conf = std::fs::read_to_string(config_dir.path().join("105.conf"))?;
    assert!(conf.contains("lxc.cgroup2.devices.allow: c 10:200 rwm"));
    assert!(conf.contains("lxc.mount.entry: /dev/net/tun dev/net/tun none bind,create=file"));

    Ok(())
}

#[tokio::test]
async fn test_scenario_template_fallback() -> Result<()> {
    let host = MockHost::new()
        .respond("pveversion", CmdOutput::ok(common::PVEVERSION))
        .respond(
            "pvesm status -content rootdir",
            CmdOutput::ok(common::STORAGE_ROOTDIR),
        )
        .respond(
            "pvesm status -content vztmpl",
            CmdOutput::ok(common::STORAGE_VZTMPL),
        )
        .respond("pveam available", CmdOutput::ok(common::CATALOG_NO_PRIMARY))
        .respond("pveam list local", CmdOutput::ok(""))
        .respond("pvesh get /cluster/nextid", CmdOutput::ok("105\n"))
        .respond("pct status 105", CmdOutput::ok("status: running\n"))
        .respond(
            "ip -4 -o addr show dev eth0",
            CmdOutput::ok(common::ETH0_WITH_LEASE),
        )
        .respond("netbird status", CmdOutput::ok(common::NETBIRD_CONNECTED));
    let config_dir = tempfile::tempdir()?;
    seed_container_config(config_dir.path(), 105);

    let env = common::test_env(&host, config_dir.path());
    let mut prompts = ScriptedPrompt::new(SETUP_KEY_ANSWERS);
    let args = CreateArgs::default();

    let outcome = run_create(&env, &mut prompts, &args).await?;
    assert!(matches!(outcome, CreateOutcome::Provisioned { vmid: 105, .. }));

    // The rest of the pipeline ran unchanged, against the fallback image.
    let create = host.find_call("pct create 105").expect("create was issued");
    assert!(create.contains("local:vztmpl/debian-12-standard_12.7-1_amd64.tar.zst"));
    assert_eq!(host.count_calls("pveam download local debian-12-standard"), 1);

    Ok(())
}

#[tokio::test]
async fn test_scenario_operator_declines_gate() -> Result<()> {
    let host = happy_host();
    let config_dir = tempfile::tempdir()?;

    let env = common::test_env(&host, config_dir.path());
    let mut answers: Vec<&str> = SETUP_KEY_ANSWERS.to_vec();
    *answers.last_mut().unwrap() = "n";
    let mut prompts = ScriptedPrompt::new(&answers);
    let args = CreateArgs::default();

    let outcome = run_create(&env, &mut prompts, &args).await?;
    assert!(matches!(outcome, CreateOutcome::Cancelled));

    // Declining is a clean exit: no container was ever created or started.
    assert_eq!(host.count_calls("pct create"), 0);
    assert_eq!(host.count_calls("pct start"), 0);

    Ok(())
}

#[tokio::test]
async fn test_privileged_container_flags_and_no_overrides() -> Result<()> {
    let host = happy_host();
    let config_dir = tempfile::tempdir()?;
    // No config file seeded: privileged containers must not need one.

    let env = common::test_env(&host, config_dir.path());
    let mut prompts = ScriptedPrompt::new(&[]);
    let args = CreateArgs {
        hostname: Some("netbird".to_string()),
        password: Some("abcde".to_string()),
        privileged: true,
        setup_key: Some("XYZ".to_string()),
        yes: true,
        ..Default::default()
    };

    let outcome = run_create(&env, &mut prompts, &args).await?;
    assert!(matches!(outcome, CreateOutcome::Provisioned { .. }));

    let create = host.find_call("pct create 105").expect("create was issued");
    assert!(create.contains("--unprivileged 0"));
    assert!(create.contains("--features nesting=1"));
    assert!(!create.contains("keyctl"));

    Ok(())
}

#[tokio::test]
async fn test_not_root_is_environment_error() -> Result<()> {
    let host = happy_host();
    let config_dir = tempfile::tempdir()?;

    let mut env = common::test_env(&host, config_dir.path());
    env.euid_is_root = false;
    let mut prompts = ScriptedPrompt::new(&[]);

    let err = run_create(&env, &mut prompts, &CreateArgs::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ProvisionError>(),
        Some(ProvisionError::Environment(_))
    ));
    // Pre-flight failed, so the host was never queried beyond it.
    assert_eq!(host.count_calls("pvesm"), 0);

    Ok(())
}

#[tokio::test]
async fn test_ensure_template_is_idempotent() -> Result<()> {
    let template_name = "debian-13-standard_13.1-1_amd64.tar.zst";
    let host = MockHost::new().respond_seq(
        "pveam list local",
        vec![
            CmdOutput::ok(""),
            CmdOutput::ok(format!("local:vztmpl/{} 200MB\n", template_name)),
        ],
    );

    let selection = selection::ResourceSelection {
        rootfs_storage: "local-lvm".to_string(),
        template_storage: "local".to_string(),
        template: template_name.to_string(),
        fallback_used: false,
    };

    template::ensure_template(&host, &selection).await?;
    template::ensure_template(&host, &selection).await?;

    // Second call saw the artifact and did not transfer again.
    assert_eq!(host.count_calls("pveam download"), 1);

    Ok(())
}

#[tokio::test]
async fn test_select_template_fails_when_no_family_available() -> Result<()> {
    let host = MockHost::new().respond(
        "pveam available",
        CmdOutput::ok("system          ubuntu-24.04-standard_24.04-2_amd64.tar.zst\n"),
    );

    let err = selection::select_template(&host).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ProvisionError>(),
        Some(ProvisionError::Selection(_))
    ));
    Ok(())
}

#[tokio::test]
async fn test_select_storage_static_name_fallback() -> Result<()> {
    let host = MockHost::new()
        .respond(
            "pvesm status -content rootdir",
            CmdOutput::ok("Name Type Status\n"),
        )
        .respond(
            "pvesm status -content vztmpl",
            CmdOutput::ok(common::STORAGE_VZTMPL),
        )
        .respond(
            "pvesm status",
            CmdOutput::ok("Name Type Status\nlocal dir active\n"),
        );

    let (rootfs, templates) = selection::select_storage(&host).await?;
    assert_eq!(rootfs, "local");
    assert_eq!(templates, "local");
    Ok(())
}

#[tokio::test]
async fn test_select_storage_fails_without_any_candidate() -> Result<()> {
    let host = MockHost::new()
        .respond(
            "pvesm status -content rootdir",
            CmdOutput::ok("Name Type Status\n"),
        )
        .respond(
            "pvesm status",
            CmdOutput::ok("Name Type Status\nceph-pool rbd active\n"),
        );

    let err = selection::select_storage(&host).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ProvisionError>(),
        Some(ProvisionError::Selection(_))
    ));
    Ok(())
}

#[tokio::test]
async fn test_allocate_rejects_pinned_id_in_use() -> Result<()> {
    let host = MockHost::new().respond("pct status 4242", CmdOutput::ok("status: stopped\n"));
    let lifecycle = LifecycleManager::new(&host);

    let err = lifecycle.allocate_identifier(Some(4242)).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ProvisionError>(),
        Some(ProvisionError::Validation(_))
    ));
    Ok(())
}

#[tokio::test]
async fn test_allocate_accepts_free_pinned_id() -> Result<()> {
    let host = MockHost::new().respond(
        "pct status 4242",
        CmdOutput::err(2, "Configuration file 'nodes/pve/lxc/4242.conf' does not exist"),
    );
    let lifecycle = LifecycleManager::new(&host);

    assert_eq!(lifecycle.allocate_identifier(Some(4242)).await?, 4242);
    // The pinned path never asks the cluster for an id.
    assert_eq!(host.count_calls("nextid"), 0);
    Ok(())
}

#[tokio::test]
async fn test_network_poll_exhaustion_is_pending() -> Result<()> {
    // Default mock answers succeed with empty output: no lease, ever.
    let host = MockHost::new();
    let lifecycle = LifecycleManager::new(&host)
        .with_timings(Duration::ZERO, RetryPolicy::new(4, Duration::ZERO));
    let mut handle = ContainerHandle {
        vmid: 7,
        status: CtStatus::Running,
    };

    let polled = lifecycle.poll_network_address(&mut handle).await;
    assert!(polled.is_pending());
    assert_eq!(host.count_calls("ip -4 -o addr"), 4);
    assert_eq!(handle.status, CtStatus::NetworkPending);
    Ok(())
}

#[tokio::test]
async fn test_connection_poll_exhaustion_is_pending_not_error() -> Result<()> {
    let host = MockHost::new().respond(
        "netbird status",
        CmdOutput::ok("Management: Disconnected\n"),
    );
    let payload =
        PayloadInstaller::new(&host).with_status_poll(RetryPolicy::new(5, Duration::ZERO));
    let handle = ContainerHandle {
        vmid: 7,
        status: CtStatus::NetworkReady,
    };
    let request = sso_request();

    let connection = payload.authenticate_and_connect(&handle, &request).await?;
    assert!(connection.ip.is_pending());
    assert!(connection.fqdn.is_pending());
    assert_eq!(host.count_calls("netbird status"), 5);
    Ok(())
}

#[tokio::test]
async fn test_start_state_mismatch_is_a_warning_not_failure() -> Result<()> {
    let host = MockHost::new().respond("pct status 7", CmdOutput::ok("status: stopped\n"));
    let lifecycle = LifecycleManager::new(&host)
        .with_timings(Duration::ZERO, RetryPolicy::new(1, Duration::ZERO));
    let mut handle = ContainerHandle {
        vmid: 7,
        status: CtStatus::Created,
    };

    lifecycle.start(&mut handle).await?;
    assert_eq!(handle.status, CtStatus::Running);
    Ok(())
}

#[tokio::test]
async fn test_install_failure_is_fatal_and_leaves_container() -> Result<()> {
    let host = MockHost::new().respond("apt-get", CmdOutput::err(100, "E: Unable to fetch"));
    let payload = PayloadInstaller::new(&host);
    let handle = ContainerHandle {
        vmid: 9,
        status: CtStatus::NetworkReady,
    };

    let err = payload.run_update_and_install(&handle).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ProvisionError>(),
        Some(ProvisionError::Install(_))
    ));
    Ok(())
}

fn sso_request() -> ProvisioningRequest {
    ProvisioningRequest {
        hostname: "netbird".to_string(),
        password: "abcde".to_string(),
        cores: 1,
        memory_mb: 512,
        swap_mb: 512,
        disk_gb: 4,
        bridge: "vmbr0".to_string(),
        vmid: None,
        privilege: PrivilegeMode::Unprivileged,
        auth: AuthMethod::Sso,
    }
}

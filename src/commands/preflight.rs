use anyhow::Result;
use tokio::process::Command;

use crate::probe;

/// Report what the provisioning pipeline will need from this host.
/// Read-only; nothing here mutates state.
pub async fn cmd_preflight() -> Result<()> {
    println!("Checking nblxc requirements...\n");

    let mut all_ok = true;

    all_ok &= check_root();

    // Proxmox management tooling
    all_ok &= check_command("pveversion", &[], "Proxmox VE").await;
    all_ok &= check_command("pct", &["help"], "pct (containers)").await;
    all_ok &= check_command("pvesm", &["help"], "pvesm (storage)").await;
    all_ok &= check_command("pveam", &["help"], "pveam (templates)").await;
    all_ok &= check_command("pvesh", &["--help"], "pvesh (cluster API)").await;

    // TUN passthrough source device
    all_ok &= check_tun().await;

    println!();
    if all_ok {
        println!("All checks passed. Run: nblxc create");
    } else {
        println!("Some checks failed; this host cannot provision a NetBird container yet.");
    }

    Ok(())
}

fn check_root() -> bool {
    print!("  root privilege ... ");
    if probe::running_as_root() {
        println!("ok");
        true
    } else {
        println!("missing (run with sudo or as root)");
        false
    }
}

async fn check_command(cmd: &str, args: &[&str], name: &str) -> bool {
    print!("  {} ... ", name);

    match Command::new(cmd).args(args).output().await {
        Ok(output) if output.status.success() => {
            let text = String::from_utf8_lossy(&output.stdout);
            let first_line = text.lines().next().unwrap_or("installed");
            println!("ok {}", first_line.trim());
            true
        }
        _ => {
            println!("not found");
            false
        }
    }
}

async fn check_tun() -> bool {
    print!("  /dev/net/tun ... ");

    if tokio::fs::metadata("/dev/net/tun").await.is_ok() {
        println!("ok");
        true
    } else {
        println!("missing (modprobe tun)");
        false
    }
}

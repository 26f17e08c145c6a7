use anyhow::Result;

use crate::paths;
use crate::state::RecordStore;

/// Table of containers this tool has provisioned, from the local records.
pub async fn cmd_ls() -> Result<()> {
    let store = RecordStore::new(paths::record_dir());
    let records = store.list().await?;

    if records.is_empty() {
        println!("No provisioning records.");
        return Ok(());
    }

    println!(
        "{:<8} {:<20} {:<16} {:<28} {:<20}",
        "VMID", "HOSTNAME", "NETBIRD_IP", "FQDN", "CREATED"
    );
    println!("{}", "-".repeat(96));

    for record in records {
        println!(
            "{:<8} {:<20} {:<16} {:<28} {:<20}",
            record.vmid,
            record.hostname,
            record.netbird_ip.as_deref().unwrap_or("-"),
            record.fqdn.as_deref().unwrap_or("-"),
            record.created_at.format("%Y-%m-%d %H:%M"),
        );
    }

    Ok(())
}

use anyhow::{Context, Result};
use std::path::PathBuf;
use tokio::fs;

use super::types::ProvisionRecord;

/// Persists provisioning records as one JSON file per container.
pub struct RecordStore {
    record_dir: PathBuf,
}

impl RecordStore {
    pub fn new(record_dir: PathBuf) -> Self {
        Self { record_dir }
    }

    pub async fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.record_dir)
            .await
            .context("creating record directory")?;
        Ok(())
    }

    pub async fn save(&self, record: &ProvisionRecord) -> Result<()> {
        let path = self.record_dir.join(format!("{}.json", record.vmid));
        let json = serde_json::to_string_pretty(record)?;
        fs::write(&path, json)
            .await
            .context("writing provisioning record")?;
        Ok(())
    }

    pub async fn load(&self, vmid: u32) -> Result<ProvisionRecord> {
        let path = self.record_dir.join(format!("{}.json", vmid));
        let json = fs::read_to_string(&path)
            .await
            .context("reading provisioning record")?;
        serde_json::from_str(&json).context("parsing provisioning record")
    }

    /// All records, oldest first. Unparseable files are skipped rather
    /// than failing the listing.
    pub async fn list(&self) -> Result<Vec<ProvisionRecord>> {
        let mut records = Vec::new();

        if !self.record_dir.exists() {
            return Ok(records);
        }

        let mut entries = fs::read_dir(&self.record_dir)
            .await
            .context("reading record directory")?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some("json") {
                if let Ok(json) = fs::read_to_string(&path).await {
                    if let Ok(record) = serde_json::from_str::<ProvisionRecord>(&json) {
                        records.push(record);
                    }
                }
            }
        }

        records.sort_by_key(|r| r.created_at);
        Ok(records)
    }
}

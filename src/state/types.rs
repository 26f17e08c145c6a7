use serde::{Deserialize, Serialize};

use crate::selection::ResourceSelection;
use crate::types::{ConnectionResult, PrivilegeMode, ProvisioningRequest};

/// Durable summary of one provisioning run, written after the pipeline
/// finishes. Purely informational; the host's own config is the source of
/// truth for the container itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionRecord {
    pub vmid: u32,
    pub hostname: String,
    pub template: String,
    pub rootfs_storage: String,
    pub privilege: PrivilegeMode,
    /// Overlay address / name, absent when the status poll ran out.
    pub netbird_ip: Option<String>,
    pub fqdn: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl ProvisionRecord {
    pub fn new(
        vmid: u32,
        request: &ProvisioningRequest,
        selection: &ResourceSelection,
        connection: &ConnectionResult,
    ) -> Self {
        Self {
            vmid,
            hostname: request.hostname.clone(),
            template: selection.template.clone(),
            rootfs_storage: selection.rootfs_storage.clone(),
            privilege: request.privilege,
            netbird_ip: connection.ip.clone().ready(),
            fqdn: connection.fqdn.clone().ready(),
            created_at: chrono::Utc::now(),
        }
    }
}

use std::path::PathBuf;
use std::sync::OnceLock;

static BASE_DIR: OnceLock<PathBuf> = OnceLock::new();

const DEFAULT_BASE_DIR: &str = "/var/lib/nblxc";

/// Set the base directory once at startup, before any path access.
pub fn init_base_dir(override_dir: Option<&str>) {
    let dir = override_dir
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_BASE_DIR));
    let _ = BASE_DIR.set(dir);
}

/// Base directory for all nblxc data.
pub fn base_dir() -> PathBuf {
    BASE_DIR
        .get()
        .cloned()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_BASE_DIR))
}

/// Directory for provisioning records.
pub fn record_dir() -> PathBuf {
    base_dir().join("records")
}

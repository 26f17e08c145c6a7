use thiserror::Error;

/// Fatal failure categories for the provisioning pipeline.
///
/// Every variant aborts the run; recoverable conditions (bad interactive
/// input, catalog refresh failure, polling exhaustion) never surface here.
/// The pipeline reports errors through anyhow, with one of these at the
/// root so callers and tests can recover the category via `downcast_ref`.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// Wrong host type or insufficient privilege. Pre-flight only.
    #[error("environment check failed: {0}")]
    Environment(String),

    /// No usable storage backend or OS template.
    #[error("resource selection failed: {0}")]
    Selection(String),

    /// Invalid user-supplied configuration.
    #[error("invalid input: {0}")]
    Validation(String),

    /// Template download did not complete.
    #[error("template transfer failed: {0}")]
    Transfer(String),

    /// Container create/start failed on the host.
    #[error("container lifecycle operation failed: {0}")]
    Lifecycle(String),

    /// An in-container command exited non-zero. The container stays
    /// allocated; cleanup is left to the operator.
    #[error("payload install failed: {0}")]
    Install(String),
}

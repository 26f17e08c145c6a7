use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

/// Captured result of one external command.
#[derive(Debug, Clone, Default)]
pub struct CmdOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CmdOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn err(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// stdout and stderr concatenated, for tools that write status text to
    /// either stream.
    pub fn combined(&self) -> String {
        let mut text = self.stdout.clone();
        if !self.stderr.is_empty() {
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str(&self.stderr);
        }
        text
    }
}

/// Seam between the pipeline and the host tooling. The real implementation
/// spawns processes; tests feed canned output instead.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run to completion, capturing stdout/stderr.
    async fn run(&self, program: &str, args: &[&str]) -> Result<CmdOutput>;

    /// Run with stdio inherited so output streams straight to the
    /// operator's terminal (interactive login URLs). Captures nothing.
    async fn run_streamed(&self, program: &str, args: &[&str]) -> Result<CmdOutput>;
}

/// Runs commands on the local Proxmox host.
pub struct HostRunner;

#[async_trait]
impl CommandRunner for HostRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<CmdOutput> {
        debug!(program, ?args, "running host command");

        let output = Command::new(program)
            .args(args)
            .output()
            .await
            .with_context(|| format!("spawning {}", program))?;

        let result = CmdOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        debug!(program, code = ?result.code, "host command finished");
        Ok(result)
    }

    async fn run_streamed(&self, program: &str, args: &[&str]) -> Result<CmdOutput> {
        debug!(program, ?args, "running host command with inherited stdio");

        let status = Command::new(program)
            .args(args)
            .status()
            .await
            .with_context(|| format!("spawning {}", program))?;

        Ok(CmdOutput {
            code: status.code(),
            stdout: String::new(),
            stderr: String::new(),
        })
    }
}

// Common test utilities for nblxc integration tests
#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use nblxc::commands::PipelineEnv;
use nblxc::input::PromptSource;
use nblxc::lifecycle::LifecycleManager;
use nblxc::payload::PayloadInstaller;
use nblxc::pve::{CmdOutput, CommandRunner};
use nblxc::retry::RetryPolicy;

/// Host-side stand-in: answers commands from canned rules and records
/// every invocation so tests can assert on what the pipeline actually ran.
pub struct MockHost {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<String>>,
}

struct Rule {
    needle: String,
    /// Consumed front to back; the last response repeats forever.
    responses: VecDeque<CmdOutput>,
}

impl MockHost {
    pub fn new() -> Self {
        Self {
            rules: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Commands whose line contains `needle` get `output`, every time.
    /// Rules are tried in registration order; anything unmatched succeeds
    /// with empty output.
    pub fn respond(self, needle: &str, output: CmdOutput) -> Self {
        self.rules.lock().unwrap().push(Rule {
            needle: needle.to_string(),
            responses: VecDeque::from(vec![output]),
        });
        self
    }

    /// Sequential responses for repeated matches; the final one repeats.
    pub fn respond_seq(self, needle: &str, outputs: Vec<CmdOutput>) -> Self {
        assert!(!outputs.is_empty());
        self.rules.lock().unwrap().push(Rule {
            needle: needle.to_string(),
            responses: VecDeque::from(outputs),
        });
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count_calls(&self, needle: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|line| line.contains(needle))
            .count()
    }

    pub fn find_call(&self, needle: &str) -> Option<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .find(|line| line.contains(needle))
            .cloned()
    }

    fn lookup(&self, line: &str) -> CmdOutput {
        let mut rules = self.rules.lock().unwrap();
        for rule in rules.iter_mut() {
            if line.contains(&rule.needle) {
                return if rule.responses.len() > 1 {
                    rule.responses.pop_front().unwrap()
                } else {
                    rule.responses.front().unwrap().clone()
                };
            }
        }
        CmdOutput::ok("")
    }
}

#[async_trait]
impl CommandRunner for MockHost {
    async fn run(&self, program: &str, args: &[&str]) -> Result<CmdOutput> {
        let line = format!("{} {}", program, args.join(" "));
        self.calls.lock().unwrap().push(line.clone());
        Ok(self.lookup(&line))
    }

    async fn run_streamed(&self, program: &str, args: &[&str]) -> Result<CmdOutput> {
        self.run(program, args).await
    }
}

/// Scripted stand-in for the interactive terminal.
pub struct ScriptedPrompt {
    answers: VecDeque<String>,
}

impl ScriptedPrompt {
    pub fn new(answers: &[&str]) -> Self {
        Self {
            answers: answers.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl PromptSource for ScriptedPrompt {
    fn prompt(&mut self, message: &str) -> Result<String> {
        self.answers
            .pop_front()
            .ok_or_else(|| anyhow!("ran out of scripted answers at prompt {:?}", message))
    }
}

/// Pipeline environment against the mock host: no real privileges needed,
/// zero-delay polling, container configs under a temp directory, no
/// record persistence.
pub fn test_env<'a>(runner: &'a MockHost, config_dir: &Path) -> PipelineEnv<'a> {
    PipelineEnv {
        runner,
        euid_is_root: true,
        lifecycle: LifecycleManager::new(runner)
            .with_config_dir(config_dir.to_path_buf())
            .with_timings(Duration::ZERO, RetryPolicy::new(3, Duration::ZERO)),
        payload: PayloadInstaller::new(runner).with_status_poll(RetryPolicy::new(3, Duration::ZERO)),
        record_store: None,
    }
}

pub const PVEVERSION: &str =
    "pve-manager/8.2.4/faa83925c9641325 (running kernel: 6.8.12-1-pve)\n";

pub const STORAGE_ROOTDIR: &str = "\
Name             Type     Status           Total            Used       Available        %
local-lvm     lvmthin     active       147804160        28281554       119522605   19.13%
";

pub const STORAGE_VZTMPL: &str = "\
Name             Type     Status           Total            Used       Available        %
local             dir     active        98497780        12752020        80696424   12.95%
";

pub const CATALOG_FULL: &str = "\
system          debian-12-standard_12.7-1_amd64.tar.zst
system          debian-13-standard_13.1-1_amd64.tar.zst
system          ubuntu-24.04-standard_24.04-2_amd64.tar.zst
";

pub const CATALOG_NO_PRIMARY: &str = "\
system          debian-12-standard_12.7-1_amd64.tar.zst
system          ubuntu-24.04-standard_24.04-2_amd64.tar.zst
";

pub const NETBIRD_CONNECTED: &str = "\
Daemon version: 0.36.5
Management: Connected
Signal: Connected
FQDN: netbird.netbird.cloud
NetBird IP: 100.92.140.7/16
Interface type: Kernel
";

pub const ETH0_WITH_LEASE: &str = "\
2: eth0    inet 192.168.1.57/24 brd 192.168.1.255 scope global dynamic eth0\\       valid_lft 86388sec preferred_lft 86388sec
";

//! Interactive input collection and validation.
//!
//! Prompting goes through [`PromptSource`] so tests can feed scripted
//! answers; nothing in here ever talks to the host. Values supplied on the
//! command line skip their prompt but get the same validation, with
//! non-interactive semantics: a bad flag value is fatal instead of
//! re-prompted.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};

use crate::cli::CreateArgs;
use crate::error::ProvisionError;
use crate::types::{
    AuthMethod, PrivilegeMode, ProvisioningRequest, DEFAULT_BRIDGE, DEFAULT_CORES,
    DEFAULT_DISK_GB, DEFAULT_MEMORY_MB, DEFAULT_SWAP_MB,
};

const MIN_PASSWORD_LEN: usize = 5;

/// Where interactive answers come from.
pub trait PromptSource {
    fn prompt(&mut self, message: &str) -> Result<String>;

    /// Secrets take the same path by default; a fancier terminal source
    /// could suppress echo.
    fn prompt_secret(&mut self, message: &str) -> Result<String> {
        self.prompt(message)
    }
}

/// Reads answers from the controlling terminal. Prompts go to stderr so
/// piped stdout stays clean.
pub struct TerminalPrompt;

impl PromptSource for TerminalPrompt {
    fn prompt(&mut self, message: &str) -> Result<String> {
        eprint!("{}", message);
        io::stderr().flush().ok();

        let mut line = String::new();
        io::stdin()
            .lock()
            .read_line(&mut line)
            .context("reading from stdin")?;
        Ok(line.trim().to_string())
    }
}

/// RFC-1123 single label: 1-63 chars, alphanumeric plus interior hyphens.
pub fn validate_hostname(name: &str) -> Result<()> {
    fn invalid(name: &str, reason: &str) -> anyhow::Error {
        ProvisionError::Validation(format!("hostname {:?}: {}", name, reason)).into()
    }

    if name.is_empty() {
        return Err(invalid(name, "must not be empty"));
    }
    if name.len() > 63 {
        return Err(invalid(name, "must be 63 characters or less"));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(invalid(name, "only letters, digits and hyphens are allowed"));
    }
    if name.starts_with('-') || name.ends_with('-') {
        return Err(invalid(name, "must not start or end with a hyphen"));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<()> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(ProvisionError::Validation(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        ))
        .into());
    }
    Ok(())
}

/// Positive-integer parse for sizing fields. Malformed values are fatal;
/// sizing mistakes should stop the run, not silently re-prompt.
fn parse_sizing(field: &str, value: &str) -> Result<u32> {
    match value.trim().parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ProvisionError::Validation(format!(
            "{} must be a positive integer, got {:?}",
            field, value
        ))
        .into()),
    }
}

fn check_sizing_flag(field: &str, value: Option<u32>, default: u32) -> Result<u32> {
    match value {
        Some(0) => Err(ProvisionError::Validation(format!(
            "{} must be a positive integer",
            field
        ))
        .into()),
        Some(n) => Ok(n),
        None => Ok(default),
    }
}

fn collect_hostname(args: &CreateArgs, prompts: &mut dyn PromptSource) -> Result<String> {
    if let Some(hostname) = &args.hostname {
        validate_hostname(hostname)?;
        return Ok(hostname.clone());
    }
    loop {
        let entered = prompts.prompt("Container hostname: ")?;
        match validate_hostname(&entered) {
            Ok(()) => return Ok(entered),
            Err(e) => eprintln!("{:#}", e),
        }
    }
}

/// Two matching entries are required before the password is accepted; any
/// number of mismatches only re-prompts. Bad confirmation is recoverable,
/// not fatal.
fn collect_password(args: &CreateArgs, prompts: &mut dyn PromptSource) -> Result<String> {
    if let Some(password) = &args.password {
        validate_password(password)?;
        return Ok(password.clone());
    }
    loop {
        let first = prompts.prompt_secret("Root password (min 5 characters): ")?;
        if let Err(e) = validate_password(&first) {
            eprintln!("{:#}", e);
            continue;
        }
        let second = prompts.prompt_secret("Confirm root password: ")?;
        if first == second {
            return Ok(first);
        }
        eprintln!("Passwords do not match, try again.");
    }
}

fn prompt_sizing(
    prompts: &mut dyn PromptSource,
    field: &str,
    label: &str,
    default: u32,
) -> Result<u32> {
    let entered = prompts.prompt(&format!("{} [{}]: ", label, default))?;
    if entered.is_empty() {
        return Ok(default);
    }
    parse_sizing(field, &entered)
}

fn collect_auth(args: &CreateArgs, prompts: &mut dyn PromptSource) -> Result<AuthMethod> {
    if let Some(key) = &args.setup_key {
        if key.is_empty() {
            return Err(
                ProvisionError::Validation("setup key must not be empty".to_string()).into(),
            );
        }
        return Ok(AuthMethod::SetupKey { key: key.clone() });
    }
    if args.sso {
        return Ok(AuthMethod::Sso);
    }

    if !confirm(prompts, "Join the network with a setup key?", true)? {
        return Ok(AuthMethod::Sso);
    }
    loop {
        let key = prompts.prompt_secret("Setup key: ")?;
        if key.is_empty() {
            eprintln!("Setup key must not be empty.");
            continue;
        }
        // The key goes straight into a join command; make the operator
        // look at it once before it is used.
        if confirm(prompts, &format!("Use setup key {:?}?", key), true)? {
            return Ok(AuthMethod::SetupKey { key });
        }
    }
}

fn confirm(prompts: &mut dyn PromptSource, message: &str, default_yes: bool) -> Result<bool> {
    let suffix = if default_yes { "[Y/n]" } else { "[y/N]" };
    let answer = prompts.prompt(&format!("{} {} ", message, suffix))?;
    Ok(match answer.to_lowercase().as_str() {
        "" => default_yes,
        "y" | "yes" => true,
        _ => false,
    })
}

/// Build the full request, then show a summary and hold at the final gate.
/// Returns `Ok(None)` when the operator declines: a clean cancellation,
/// nothing has been created.
pub fn collect(
    args: &CreateArgs,
    prompts: &mut dyn PromptSource,
) -> Result<Option<ProvisioningRequest>> {
    let hostname = collect_hostname(args, prompts)?;
    let password = collect_password(args, prompts)?;

    let mut cores = check_sizing_flag("cores", args.cores, DEFAULT_CORES)?;
    let mut memory_mb = check_sizing_flag("memory", args.memory, DEFAULT_MEMORY_MB)?;
    let mut swap_mb = check_sizing_flag("swap", args.swap, DEFAULT_SWAP_MB)?;
    let mut disk_gb = check_sizing_flag("disk", args.disk, DEFAULT_DISK_GB)?;
    let mut bridge = args
        .bridge
        .clone()
        .unwrap_or_else(|| DEFAULT_BRIDGE.to_string());
    let mut vmid = args.vmid;
    let mut privilege = PrivilegeMode::from_flag(args.privileged);

    if args.advanced {
        cores = prompt_sizing(prompts, "cores", "CPU cores", cores)?;
        memory_mb = prompt_sizing(prompts, "memory", "Memory (MiB)", memory_mb)?;
        swap_mb = prompt_sizing(prompts, "swap", "Swap (MiB)", swap_mb)?;
        disk_gb = prompt_sizing(prompts, "disk", "Disk (GiB)", disk_gb)?;

        let entered = prompts.prompt(&format!("Network bridge [{}]: ", bridge))?;
        if !entered.is_empty() {
            bridge = entered;
        }

        let entered = prompts.prompt("Container ID (empty = next free): ")?;
        if !entered.is_empty() {
            vmid = Some(parse_sizing("container id", &entered)?);
        }

        if confirm(prompts, "Create a privileged container?", false)? {
            privilege = PrivilegeMode::Privileged;
        }
    }

    let auth = collect_auth(args, prompts)?;

    let request = ProvisioningRequest {
        hostname,
        password,
        cores,
        memory_mb,
        swap_mb,
        disk_gb,
        bridge,
        vmid,
        privilege,
        auth,
    };

    print_summary(&request);
    if !args.yes && !confirm(prompts, "Proceed with provisioning?", true)? {
        return Ok(None);
    }
    Ok(Some(request))
}

fn print_summary(request: &ProvisioningRequest) {
    println!();
    println!("  Hostname:   {}", request.hostname);
    println!(
        "  Container:  {}",
        request
            .vmid
            .map(|id| id.to_string())
            .unwrap_or_else(|| "next free id".to_string())
    );
    println!(
        "  Sizing:     {} core(s), {} MiB RAM, {} MiB swap, {} GiB disk",
        request.cores, request.memory_mb, request.swap_mb, request.disk_gb
    );
    println!("  Network:    bridge {} (DHCP)", request.bridge);
    println!("  Isolation:  {:?}", request.privilege);
    println!("  Auth:       {}", request.auth.label());
    println!();
}

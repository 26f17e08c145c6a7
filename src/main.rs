use anyhow::Result;
use clap::Parser;
use nblxc::cli::Commands;
use nblxc::{cli, commands, paths};
use tracing::error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    // Base directory comes from the CLI and must be set before any path access
    paths::init_base_dir(cli.base_dir.as_deref());

    // Only use colors when stdout is a TTY (not when piped to a file)
    let use_color = atty::is(atty::Stream::Stdout);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_target(false)
        .with_ansi(use_color)
        .init();

    let result = match cli.cmd {
        Commands::Create(args) => commands::cmd_create(args).await,
        Commands::Ls => commands::cmd_ls().await,
        Commands::Preflight => commands::cmd_preflight().await,
    };

    if let Err(e) = &result {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }

    result
}

//! Shopcheck CLI - Main Entry Point

use clap::{Parser, Subcommand};

use shopcheck_cli::commands::{config, profile, run, serve};
use shopcheck_cli::output::{self, print_error};

/// Shopcheck - browser-driven storefront journey checks
#[derive(Parser)]
#[command(name = "shopcheck")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run journeys against a storefront
    Run(run::RunArgs),

    /// Serve the HTTP API
    Serve(serve::ServeArgs),

    /// Storefront profiles
    #[command(subcommand)]
    Profile(profile::ProfileCommands),

    /// Service configuration
    #[command(subcommand)]
    Config(config::ConfigCommands),

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run(args) => match run::execute(args, cli.format).await {
            Ok(true) => {}
            Ok(false) => std::process::exit(1),
            Err(e) => {
                print_error(&format!("{:#}", e));
                std::process::exit(2);
            }
        },
        Commands::Serve(args) => serve::execute(args).await?,
        Commands::Profile(cmd) => profile::execute(cmd, cli.format)?,
        Commands::Config(cmd) => config::execute(cmd, cli.format)?,
        Commands::Version => {
            println!("Shopcheck CLI v{}", shopcheck_common::VERSION);
        }
    }

    Ok(())
}

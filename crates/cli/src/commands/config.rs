//! Service Configuration Commands

use anyhow::{bail, Result};
use clap::Subcommand;
use std::path::PathBuf;

use shopcheck_common::ServiceConfig;

use crate::output::{print_success, OutputFormat};

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration (file plus environment overrides)
    Show {
        #[arg(long, env = "SHOPCHECK_CONFIG", default_value = "shopcheck.toml")]
        path: PathBuf,
    },

    /// Write a default configuration file
    Init {
        #[arg(long, env = "SHOPCHECK_CONFIG", default_value = "shopcheck.toml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

pub fn execute(cmd: ConfigCommands, format: OutputFormat) -> Result<()> {
    match cmd {
        ConfigCommands::Show { path } => {
            let config = ServiceConfig::load(&path)?.apply_env()?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&config)?),
                _ => print!("{}", toml::to_string_pretty(&config)?),
            }
        }

        ConfigCommands::Init { path, force } => {
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            ServiceConfig::default().save(&path)?;
            print_success(&format!("Wrote {}", path.display()));
        }
    }
    Ok(())
}

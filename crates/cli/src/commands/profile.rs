//! Storefront Profile Commands

use anyhow::Result;
use clap::Subcommand;
use std::path::PathBuf;

use shopcheck_e2e::StorefrontProfile;

use crate::output::{print_success, OutputFormat};

#[derive(Subcommand)]
pub enum ProfileCommands {
    /// Print a profile (the built-in one when no path is given)
    Show {
        /// Profile file (YAML)
        path: Option<PathBuf>,
    },

    /// Validate a profile file
    Check {
        /// Profile file (YAML)
        path: PathBuf,
    },
}

pub fn execute(cmd: ProfileCommands, format: OutputFormat) -> Result<()> {
    match cmd {
        ProfileCommands::Show { path } => {
            let profile = StorefrontProfile::load(path.as_deref())?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&profile)?),
                _ => print!("{}", profile.to_yaml()?),
            }
        }

        ProfileCommands::Check { path } => {
            let profile = StorefrontProfile::from_file(&path)?;
            print_success(&format!(
                "Profile '{}' is valid (wait {} ms, poll {} ms)",
                profile.name, profile.timeouts.wait_ms, profile.timeouts.poll_ms
            ));
        }
    }
    Ok(())
}

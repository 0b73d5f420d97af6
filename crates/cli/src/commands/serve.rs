//! Serve Command

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use shopcheck_common::{RunDefaults, ServiceConfig};

#[derive(Args)]
pub struct ServeArgs {
    /// Service configuration file
    #[arg(long, env = "SHOPCHECK_CONFIG", default_value = "shopcheck.toml")]
    pub config: PathBuf,

    /// Bind address; overrides the configured one
    #[arg(long)]
    pub listen: Option<String>,
}

pub async fn execute(args: ServeArgs) -> Result<()> {
    let mut config = ServiceConfig::load(&args.config)?.apply_env()?;
    if let Some(listen) = args.listen {
        config.listen = listen;
    }
    shopcheck_web::serve(config, RunDefaults::from_env()).await
}

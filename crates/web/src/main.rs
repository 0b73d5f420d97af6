use std::path::PathBuf;

use shopcheck_common::{RunDefaults, ServiceConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config_path = std::env::var("SHOPCHECK_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("shopcheck.toml"));
    let config = ServiceConfig::load(&config_path)?.apply_env()?;

    shopcheck_web::serve(config, RunDefaults::from_env()).await
}

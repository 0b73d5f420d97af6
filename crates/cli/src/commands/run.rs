//! Run Command

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use std::path::{Path, PathBuf};
use tracing::info;

use shopcheck_common::{Journey, RunDefaults, RunReport, RunRequestInput, ServiceConfig};
use shopcheck_e2e::{DriverConfig, DriverProcess, JourneyRunner, StorefrontProfile, WebDriverFactory};

use crate::output::{print_info, print_report, OutputFormat};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Storefront home page
    #[arg(long, env = "BASE_URL")]
    pub url: Option<String>,

    /// Account email
    #[arg(long, env = "EMAIL")]
    pub username: Option<String>,

    /// Account password
    #[arg(long, env = "PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Product page to add to the cart
    #[arg(long, env = "PRODUCT_URL")]
    pub product_url: Option<String>,

    /// Journey to run (repeatable; default: all)
    #[arg(short, long = "journey")]
    pub journeys: Vec<Journey>,

    /// Service configuration file
    #[arg(long, env = "SHOPCHECK_CONFIG", default_value = "shopcheck.toml")]
    pub config: PathBuf,

    /// Storefront profile (YAML); overrides the configured one
    #[arg(long)]
    pub profile: Option<PathBuf>,

    /// WebDriver endpoint; overrides the configured one
    #[arg(long)]
    pub webdriver_url: Option<String>,

    /// Spawn this chromedriver binary for the run
    #[arg(long)]
    pub spawn_driver: Option<PathBuf>,

    /// Run the browser without a window
    #[arg(long)]
    pub headless: bool,

    /// Write diagnostic screenshots into this directory
    #[arg(long)]
    pub screenshots_dir: Option<PathBuf>,
}

impl RunArgs {
    fn input(&self) -> RunRequestInput {
        RunRequestInput {
            url: self.url.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            product_url: self.product_url.clone(),
            journeys: (!self.journeys.is_empty()).then(|| self.journeys.clone()),
        }
    }
}

/// Run the selected journeys. Returns whether every journey passed.
pub async fn execute(args: RunArgs, format: OutputFormat) -> Result<bool> {
    // Environment fallbacks are already applied by clap
    let request = args.input().resolve(&RunDefaults::default())?;

    let mut config = ServiceConfig::load(&args.config)?.apply_env()?;
    if let Some(url) = &args.webdriver_url {
        config.webdriver.url = url.clone();
    }
    if args.headless {
        config.webdriver.headless = true;
    }

    let profile_path = args.profile.clone().or(config.profile_path.clone());
    let profile = StorefrontProfile::load(profile_path.as_deref())
        .with_context(|| format!("loading profile {:?}", profile_path))?;

    let driver = match &args.spawn_driver {
        Some(binary_path) => Some(
            DriverProcess::spawn(DriverConfig {
                binary_path: binary_path.clone(),
                ..Default::default()
            })
            .await?,
        ),
        None => None,
    };

    let mut factory = WebDriverFactory::new(config.webdriver.clone());
    if let Some(driver) = &driver {
        factory = factory.with_url(driver.url());
    }

    info!(
        "Running {} journey(s) against {}",
        request.journeys.len(),
        request.target_url
    );
    let runner = JourneyRunner::new(factory, profile);
    let report = runner.run(&request).await?;
    drop(driver);

    let saved = match &args.screenshots_dir {
        Some(dir) => save_screenshots(&report, dir)?,
        None => Vec::new(),
    };
    let saved_names: Vec<(Journey, String)> = saved
        .iter()
        .map(|(journey, path)| (*journey, path.display().to_string()))
        .collect();

    print_report(&report, &saved_names, format);
    if !saved.is_empty() {
        if let OutputFormat::Table = format {
            print_info(&format!("{} screenshot(s) saved", saved.len()));
        }
    }

    Ok(report.all_succeeded())
}

/// Write every diagnostic screenshot in `report` to `dir` as
/// `<timestamp>-<journey>-<digest>.png`.
pub fn save_screenshots(report: &RunReport, dir: &Path) -> Result<Vec<(Journey, PathBuf)>> {
    let stamp = Utc::now().format("%Y%m%dT%H%M%SZ").to_string();
    let mut saved = Vec::new();

    for (journey, outcome) in report.iter() {
        let Some(screenshot) = &outcome.screenshot else {
            continue;
        };
        if saved.is_empty() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating {}", dir.display()))?;
        }
        let digest = screenshot.sha256();
        let path = dir.join(format!("{}-{}-{}.png", stamp, journey, &digest[..12]));
        std::fs::write(&path, screenshot.as_bytes())
            .with_context(|| format!("writing {}", path.display()))?;
        saved.push((*journey, path));
    }
    Ok(saved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shopcheck_common::{Screenshot, StepOutcome};

    #[test]
    fn test_save_screenshots_only_for_failures() {
        let mut report = RunReport::new();
        report.insert(Journey::Login, StepOutcome::success("Login successful"));
        report.insert(
            Journey::Checkout,
            StepOutcome::failed(
                "no available slot found",
                Some(Screenshot::from_png(b"\x89PNG fake".to_vec())),
            ),
        );

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("shots");
        let saved = save_screenshots(&report, &out).unwrap();

        assert_eq!(saved.len(), 1);
        let (journey, path) = &saved[0];
        assert_eq!(*journey, Journey::Checkout);
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.contains("-checkout-"));
        assert!(name.ends_with(".png"));
        assert_eq!(std::fs::read(path).unwrap(), b"\x89PNG fake");
    }

    #[test]
    fn test_no_screenshots_creates_nothing() {
        let mut report = RunReport::new();
        report.insert(Journey::Login, StepOutcome::success("Login successful"));

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("shots");
        assert!(save_screenshots(&report, &out).unwrap().is_empty());
        assert!(!out.exists());
    }

    #[test]
    fn test_input_keeps_journey_selection() {
        let args = RunArgs {
            url: Some("https://shop.test".into()),
            username: None,
            password: None,
            product_url: None,
            journeys: vec![Journey::Checkout],
            config: PathBuf::from("shopcheck.toml"),
            profile: None,
            webdriver_url: None,
            spawn_driver: None,
            headless: false,
            screenshots_dir: None,
        };
        let input = args.input();
        assert_eq!(input.journeys, Some(vec![Journey::Checkout]));
        assert_eq!(input.url.as_deref(), Some("https://shop.test"));
    }
}

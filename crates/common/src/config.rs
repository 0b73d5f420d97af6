//! Service and run configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Default values for run parameters, read from the environment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunDefaults {
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub product_url: Option<String>,
}

impl RunDefaults {
    /// Read `BASE_URL`, `EMAIL`, `PASSWORD` and `PRODUCT_URL`
    pub fn from_env() -> Self {
        let defaults = Self::from_lookup(|key| std::env::var(key).ok());
        info!(
            "Loaded run defaults: url={:?} username={:?} password={} product_url={:?}",
            defaults.url,
            defaults.username,
            if defaults.password.is_some() { "<set>" } else { "<unset>" },
            defaults.product_url
        );
        defaults
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            url: get("BASE_URL"),
            username: get("EMAIL"),
            password: get("PASSWORD"),
            product_url: get("PRODUCT_URL"),
        }
    }
}

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP listen address
    pub listen: String,

    /// Origins allowed by CORS
    pub cors_origins: Vec<String>,

    /// Upper bound on runs executing at the same time
    pub max_concurrent_runs: usize,

    /// Storefront profile YAML; built-in profile when unset
    pub profile_path: Option<PathBuf>,

    /// Browser session settings
    pub webdriver: WebDriverSettings,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8000".to_string(),
            cors_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:5500".to_string(),
            ],
            max_concurrent_runs: 2,
            profile_path: None,
            webdriver: WebDriverSettings::default(),
        }
    }
}

/// WebDriver connection and browser launch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebDriverSettings {
    /// WebDriver endpoint (chromedriver)
    pub url: String,

    /// Run the browser without a window
    pub headless: bool,

    /// Extra browser command-line arguments
    pub browser_args: Vec<String>,

    /// Window size as (width, height)
    pub window: Option<(u32, u32)>,
}

impl Default for WebDriverSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:9515".to_string(),
            headless: false,
            browser_args: vec![
                "--no-sandbox".to_string(),
                "--disable-dev-shm-usage".to_string(),
            ],
            window: Some((1280, 900)),
        }
    }
}

impl ServiceConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            debug!("Loaded config from {}", path.display());
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply `SHOPCHECK_*` environment overrides
    pub fn apply_env(self) -> Result<Self> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(listen) = lookup("SHOPCHECK_LISTEN") {
            self.listen = listen;
        }
        if let Some(url) = lookup("SHOPCHECK_WEBDRIVER_URL") {
            self.webdriver.url = url;
        }
        if let Some(headless) = lookup("SHOPCHECK_HEADLESS") {
            self.webdriver.headless = parse_flag(&headless).ok_or_else(|| {
                Error::InvalidConfig(format!("SHOPCHECK_HEADLESS: not a boolean: {}", headless))
            })?;
        }
        if let Some(profile) = lookup("SHOPCHECK_PROFILE") {
            self.profile_path = Some(PathBuf::from(profile));
        }
        if let Some(origins) = lookup("SHOPCHECK_CORS_ORIGINS") {
            self.cors_origins = origins
                .split(',')
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .collect();
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_runs == 0 {
            return Err(Error::InvalidConfig(
                "max_concurrent_runs must be at least 1".to_string(),
            ));
        }
        if self.webdriver.url.trim().is_empty() {
            return Err(Error::InvalidConfig("webdriver.url is empty".to_string()));
        }
        Ok(())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_run_defaults_ignore_blank_values() {
        let env: HashMap<&str, &str> = [("BASE_URL", "https://shop.example"), ("EMAIL", " ")]
            .into_iter()
            .collect();
        let defaults = RunDefaults::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(defaults.url.as_deref(), Some("https://shop.example"));
        assert!(defaults.username.is_none());
        assert!(defaults.product_url.is_none());
    }

    #[test]
    fn test_config_roundtrip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/shopcheck.toml");

        let mut config = ServiceConfig::default();
        config.max_concurrent_runs = 4;
        config.webdriver.headless = true;
        config.save(&path).unwrap();

        let loaded = ServiceConfig::load(&path).unwrap();
        assert_eq!(loaded.max_concurrent_runs, 4);
        assert!(loaded.webdriver.headless);
        assert_eq!(loaded.cors_origins.len(), 2);
    }

    #[test]
    fn test_missing_file_yields_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServiceConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.listen, "0.0.0.0:8000");
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("SHOPCHECK_HEADLESS", "yes"),
            ("SHOPCHECK_WEBDRIVER_URL", "http://grid:4444"),
            ("SHOPCHECK_CORS_ORIGINS", "http://a, ,http://b"),
        ]
        .into_iter()
        .collect();
        let config = ServiceConfig::default()
            .apply_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert!(config.webdriver.headless);
        assert_eq!(config.webdriver.url, "http://grid:4444");
        assert_eq!(config.cors_origins, vec!["http://a", "http://b"]);
    }

    #[test]
    fn test_invalid_headless_flag_rejected() {
        let result = ServiceConfig::default()
            .apply_overrides(|k| (k == "SHOPCHECK_HEADLESS").then(|| "maybe".to_string()));
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }
}

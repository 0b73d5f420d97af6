//! Core types for Shopcheck

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};

use crate::config::RunDefaults;
use crate::error::{Error, Result};

/// One of the end-to-end user journeys a run can exercise
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Journey {
    Login,
    AddToCart,
    Checkout,
}

impl Journey {
    pub const ALL: [Journey; 3] = [Journey::Login, Journey::AddToCart, Journey::Checkout];

    pub fn as_str(&self) -> &'static str {
        match self {
            Journey::Login => "login",
            Journey::AddToCart => "add_to_cart",
            Journey::Checkout => "checkout",
        }
    }
}

impl std::fmt::Display for Journey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Journey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "login" => Ok(Journey::Login),
            "add_to_cart" | "cart" => Ok(Journey::AddToCart),
            "checkout" => Ok(Journey::Checkout),
            other => Err(Error::InvalidConfig(format!("unknown journey: {}", other))),
        }
    }
}

/// Storefront account credentials
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A validated run request. Construct through [`RunRequestInput::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub target_url: String,
    pub credentials: Credentials,
    pub product_url: String,
    pub journeys: BTreeSet<Journey>,
}

impl RunRequest {
    pub fn includes(&self, journey: Journey) -> bool {
        self.journeys.contains(&journey)
    }
}

/// Run parameters as supplied by a caller; any field may be absent and is
/// then taken from the configured defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunRequestInput {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub product_url: Option<String>,
    /// Subset of journeys to run; all journeys when absent
    #[serde(default)]
    pub journeys: Option<Vec<Journey>>,
}

impl RunRequestInput {
    /// Overlay this input on `defaults` and validate the result.
    ///
    /// Every missing parameter is reported at once, in declaration order.
    pub fn resolve(self, defaults: &RunDefaults) -> Result<RunRequest> {
        let url = pick(self.url, &defaults.url);
        let username = pick(self.username, &defaults.username);
        let password = pick(self.password, &defaults.password);
        let product_url = pick(self.product_url, &defaults.product_url);

        let missing: Vec<String> = [
            ("url", url.is_none()),
            ("username", username.is_none()),
            ("password", password.is_none()),
            ("product_url", product_url.is_none()),
        ]
        .into_iter()
        .filter(|(_, absent)| *absent)
        .map(|(name, _)| name.to_string())
        .collect();

        let (Some(target_url), Some(username), Some(password), Some(product_url)) =
            (url, username, password, product_url)
        else {
            return Err(Error::MissingParameters(missing));
        };

        let journeys: BTreeSet<Journey> = match self.journeys {
            Some(selected) => selected.into_iter().collect(),
            None => Journey::ALL.into_iter().collect(),
        };
        if journeys.is_empty() {
            return Err(Error::NoJourneys);
        }

        Ok(RunRequest {
            target_url,
            credentials: Credentials { username, password },
            product_url,
            journeys,
        })
    }
}

fn pick(value: Option<String>, fallback: &Option<String>) -> Option<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .or_else(|| fallback.clone().filter(|v| !v.trim().is_empty()))
}

/// PNG image bytes, carried as base64 on the wire
#[derive(Clone, PartialEq, Eq)]
pub struct Screenshot(Vec<u8>);

impl Screenshot {
    pub fn from_png(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.0)
    }

    pub fn from_base64(encoded: &str) -> Result<Self> {
        STANDARD
            .decode(encoded)
            .map(Self)
            .map_err(|e| Error::InvalidConfig(format!("invalid base64 screenshot: {}", e)))
    }

    /// Hex SHA-256 of the image bytes
    pub fn sha256(&self) -> String {
        hex::encode(Sha256::digest(&self.0))
    }
}

impl std::fmt::Debug for Screenshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Screenshot({} bytes)", self.0.len())
    }
}

impl Serialize for Screenshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for Screenshot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        Screenshot::from_base64(&encoded).map_err(serde::de::Error::custom)
    }
}

/// Step status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Success,
    Failed,
}

impl std::fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutcomeStatus::Success => write!(f, "success"),
            OutcomeStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Terminal value of every executed step and every journey
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub status: OutcomeStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<Screenshot>,
    #[serde(default)]
    pub duration_ms: u64,
}

impl StepOutcome {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: OutcomeStatus::Success,
            message: message.into(),
            screenshot: None,
            duration_ms: 0,
        }
    }

    pub fn failed(message: impl Into<String>, screenshot: Option<Screenshot>) -> Self {
        Self {
            status: OutcomeStatus::Failed,
            message: message.into(),
            screenshot,
            duration_ms: 0,
        }
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }
}

/// Per-journey outcomes of one run, keyed by journey name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunReport(BTreeMap<Journey, StepOutcome>);

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, journey: Journey, outcome: StepOutcome) {
        self.0.insert(journey, outcome);
    }

    pub fn get(&self, journey: Journey) -> Option<&StepOutcome> {
        self.0.get(&journey)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Journey, &StepOutcome)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn all_succeeded(&self) -> bool {
        !self.0.is_empty() && self.0.values().all(StepOutcome::is_success)
    }
}

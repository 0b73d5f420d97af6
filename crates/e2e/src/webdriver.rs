//! WebDriver backend over fantoccini

use async_trait::async_trait;
use fantoccini::elements::Element;
use fantoccini::error::{CmdError, ErrorStatus};
use fantoccini::wd::Capabilities;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::json;
use tracing::{debug, info, warn};

use shopcheck_common::WebDriverSettings;

use crate::browser::{BrowserSession, Selector, SessionFactory};
use crate::error::{E2eError, E2eResult};

/// Opens a Chrome session on a WebDriver endpoint per run
#[derive(Debug, Clone)]
pub struct WebDriverFactory {
    settings: WebDriverSettings,
}

impl WebDriverFactory {
    pub fn new(settings: WebDriverSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &WebDriverSettings {
        &self.settings
    }

    /// Point at a different endpoint, e.g. a freshly spawned driver
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.settings.url = url.into();
        self
    }

    fn capabilities(&self) -> Capabilities {
        let mut args = self.settings.browser_args.clone();
        if self.settings.headless && !args.iter().any(|a| a.starts_with("--headless")) {
            args.push("--headless=new".to_string());
        }

        let mut caps = Capabilities::new();
        caps.insert("browserName".to_string(), json!("chrome"));
        caps.insert("goog:chromeOptions".to_string(), json!({ "args": args }));
        caps
    }
}

#[async_trait]
impl SessionFactory for WebDriverFactory {
    type Session = WebDriverSession;

    async fn open(&self) -> E2eResult<WebDriverSession> {
        debug!("Connecting to WebDriver at {}", self.settings.url);
        let mut builder = ClientBuilder::native();
        builder.capabilities(self.capabilities());
        let client = builder
            .connect(&self.settings.url)
            .await
            .map_err(|e| E2eError::SessionStart(e.to_string()))?;

        if let Some((width, height)) = self.settings.window {
            if let Err(e) = client.set_window_size(width, height).await {
                warn!("Could not set window size to {}x{}: {}", width, height, e);
            }
        }

        info!("Browser session opened on {}", self.settings.url);
        Ok(WebDriverSession { client })
    }
}

/// One WebDriver browser session
pub struct WebDriverSession {
    client: Client,
}

impl WebDriverSession {
    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl BrowserSession for WebDriverSession {
    type Element = Element;

    async fn navigate(&self, url: &str) -> E2eResult<()> {
        self.client.goto(url).await.map_err(|e| map_cmd(e, url))
    }

    async fn find_all(&self, selector: &Selector) -> E2eResult<Vec<Element>> {
        self.client
            .find_all(Locator::Css(selector.as_str()))
            .await
            .map_err(|e| map_cmd(e, selector.as_str()))
    }

    async fn find_all_within(&self, scope: &Element, selector: &Selector) -> E2eResult<Vec<Element>> {
        scope
            .find_all(Locator::Css(selector.as_str()))
            .await
            .map_err(|e| map_cmd(e, selector.as_str()))
    }

    async fn click(&self, element: &Element) -> E2eResult<()> {
        element.click().await.map_err(|e| map_cmd(e, "click"))
    }

    async fn type_text(&self, element: &Element, text: &str) -> E2eResult<()> {
        element.send_keys(text).await.map_err(|e| map_cmd(e, "type"))
    }

    async fn attribute(&self, element: &Element, name: &str) -> E2eResult<Option<String>> {
        element.attr(name).await.map_err(|e| map_cmd(e, name))
    }

    async fn is_enabled(&self, element: &Element) -> E2eResult<bool> {
        element.is_enabled().await.map_err(|e| map_cmd(e, "is_enabled"))
    }

    async fn is_displayed(&self, element: &Element) -> E2eResult<bool> {
        element.is_displayed().await.map_err(|e| map_cmd(e, "is_displayed"))
    }

    async fn screenshot(&self) -> E2eResult<Vec<u8>> {
        self.client
            .screenshot()
            .await
            .map_err(|e| E2eError::Screenshot(e.to_string()))
    }

    async fn close(&self) -> E2eResult<()> {
        self.client
            .clone()
            .close()
            .await
            .map_err(|e| E2eError::Browser(e.to_string()))?;
        debug!("Browser session closed");
        Ok(())
    }
}

/// Classify a WebDriver command failure by its W3C status, falling back to
/// the message text for drivers that report errors out of band
fn map_cmd(err: CmdError, context: &str) -> E2eError {
    if err.is_no_such_element() {
        return E2eError::ElementNotFound(context.to_string());
    }
    let message = err.to_string();
    if err.is_stale_element_reference() {
        return E2eError::StaleElement(format!("{}: {}", context, message));
    }
    let intercepted =
        matches!(&err, CmdError::Standard(w) if w.error == ErrorStatus::ElementClickIntercepted);
    if intercepted || err.is_element_not_interactable() {
        return E2eError::Interaction(format!("{}: {}", context, message));
    }
    classify(context, &message)
}

fn classify(context: &str, message: &str) -> E2eError {
    let lower = message.to_lowercase();
    if lower.contains("stale element") {
        E2eError::StaleElement(format!("{}: {}", context, message))
    } else if lower.contains("intercepted") || lower.contains("not interactable") {
        E2eError::Interaction(format!("{}: {}", context, message))
    } else {
        E2eError::Browser(format!("{}: {}", context, message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities_add_headless_once() {
        let mut settings = WebDriverSettings::default();
        settings.headless = true;
        let caps = WebDriverFactory::new(settings).capabilities();

        assert_eq!(caps["browserName"], "chrome");
        let args: Vec<String> =
            serde_json::from_value(caps["goog:chromeOptions"]["args"].clone()).unwrap();
        assert_eq!(args, vec!["--no-sandbox", "--disable-dev-shm-usage", "--headless=new"]);

        let mut settings = WebDriverSettings::default();
        settings.headless = true;
        settings.browser_args.push("--headless".into());
        let caps = WebDriverFactory::new(settings).capabilities();
        let args = caps["goog:chromeOptions"]["args"].as_array().unwrap();
        assert_eq!(args.iter().filter(|a| a.as_str().unwrap().starts_with("--headless")).count(), 1);
    }

    #[test]
    fn test_headed_by_default() {
        let caps = WebDriverFactory::new(WebDriverSettings::default()).capabilities();
        let args = caps["goog:chromeOptions"]["args"].as_array().unwrap();
        assert!(!args.iter().any(|a| a.as_str().unwrap().contains("headless")));
    }

    #[test]
    fn test_error_classification() {
        assert!(matches!(
            classify("click", "stale element reference: element is not attached"),
            E2eError::StaleElement(_)
        ));
        assert!(matches!(
            classify("click", "element click intercepted: Other element would receive the click"),
            E2eError::Interaction(_)
        ));
        assert!(matches!(
            classify("type", "element not interactable"),
            E2eError::Interaction(_)
        ));
        assert!(matches!(
            classify("goto", "invalid session id"),
            E2eError::Browser(_)
        ));
    }

    fn standard(status: ErrorStatus, message: &'static str) -> CmdError {
        CmdError::Standard(fantoccini::error::WebDriver::new(status, message))
    }

    #[test]
    fn test_status_classification() {
        let err = map_cmd(
            standard(
                ErrorStatus::StaleElementReference,
                "The element with the reference abc is not attached to the page document",
            ),
            "click",
        );
        assert!(matches!(err, E2eError::StaleElement(_)));
        assert!(err.is_transient());

        let err = map_cmd(
            standard(
                ErrorStatus::ElementClickIntercepted,
                "Element <button> is not clickable at point (10, 10). Other element would receive the click",
            ),
            "click",
        );
        assert!(matches!(err, E2eError::Interaction(_)));

        let err = map_cmd(standard(ErrorStatus::ElementNotInteractable, "hidden"), "type");
        assert!(matches!(err, E2eError::Interaction(_)));

        let err = map_cmd(standard(ErrorStatus::NoSuchElement, "no such element"), "find");
        assert!(matches!(err, E2eError::ElementNotFound(_)));
        assert!(err.is_transient());

        let err = map_cmd(standard(ErrorStatus::InvalidSessionId, "session gone"), "goto");
        assert!(matches!(err, E2eError::Browser(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_with_url_overrides_endpoint() {
        let factory = WebDriverFactory::new(WebDriverSettings::default()).with_url("http://127.0.0.1:4444");
        assert_eq!(factory.settings().url, "http://127.0.0.1:4444");
    }
}

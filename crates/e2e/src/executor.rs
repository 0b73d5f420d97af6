//! Step execution
//!
//! Each interaction is `locate -> wait until ready -> act`. Anything acted
//! upon passes the interactable wait first, even when a presence wait has
//! already succeeded.

use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info};

use shopcheck_common::StepOutcome;

use crate::browser::{BrowserSession, Selector};
use crate::diagnostic;
use crate::error::E2eResult;
use crate::wait::{self, Condition, WaitPolicy};

pub struct StepExecutor<'a, S: BrowserSession> {
    session: &'a S,
    policy: WaitPolicy,
    settle: Duration,
}

impl<'a, S: BrowserSession> StepExecutor<'a, S> {
    pub fn new(session: &'a S, policy: WaitPolicy, settle: Duration) -> Self {
        Self {
            session,
            policy,
            settle,
        }
    }

    pub fn session(&self) -> &'a S {
        self.session
    }

    pub fn policy(&self) -> &WaitPolicy {
        &self.policy
    }

    pub async fn navigate(&self, url: &str) -> E2eResult<()> {
        info!("Navigating to {}", url);
        self.session.navigate(url).await
    }

    /// Wait for `selector` to exist
    pub async fn present(&self, selector: &Selector) -> E2eResult<S::Element> {
        wait::wait_for(self.session, selector, Condition::Present, &self.policy).await
    }

    /// Wait for `selector` to accept input
    pub async fn interactable(&self, selector: &Selector) -> E2eResult<S::Element> {
        wait::wait_for(self.session, selector, Condition::Interactable, &self.policy).await
    }

    pub async fn click(&self, selector: &Selector) -> E2eResult<()> {
        let element = self.interactable(selector).await?;
        self.session.click(&element).await?;
        debug!("Clicked {}", selector);
        Ok(())
    }

    /// Click an element located earlier
    pub async fn click_element(&self, element: &S::Element, description: &str) -> E2eResult<()> {
        wait::wait_for_element(
            self.session,
            element,
            description,
            Condition::Interactable,
            &self.policy,
        )
        .await?;
        self.session.click(element).await?;
        debug!("Clicked {}", description);
        Ok(())
    }

    /// Type into a field. The text itself is never logged.
    pub async fn type_into(&self, selector: &Selector, text: &str) -> E2eResult<()> {
        let element = self.present(selector).await?;
        wait::wait_for_element(
            self.session,
            &element,
            selector.as_str(),
            Condition::Interactable,
            &self.policy,
        )
        .await?;
        self.session.type_text(&element, text).await?;
        debug!("Typed {} character(s) into {}", text.chars().count(), selector);
        Ok(())
    }

    /// Pause for UI work that has no observable completion condition
    pub async fn settle(&self) {
        if !self.settle.is_zero() {
            tokio::time::sleep(self.settle).await;
        }
    }

    /// Journey-step boundary: turn a step result into an outcome, capturing a
    /// diagnostic on failure.
    pub async fn conclude(
        &self,
        step: &str,
        started: Instant,
        result: E2eResult<String>,
    ) -> StepOutcome {
        let duration_ms = started.elapsed().as_millis() as u64;
        match result {
            Ok(message) => {
                info!("{} passed ({} ms): {}", step, duration_ms, message);
                StepOutcome::success(message).with_duration(duration_ms)
            }
            Err(e) => {
                error!("{} failed ({} ms): {}", step, duration_ms, e);
                let screenshot = diagnostic::capture(self.session).await;
                StepOutcome::failed(e.to_string(), screenshot).with_duration(duration_ms)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::E2eError;
    use crate::testing::{FakeBrowser, FakeDom, FakeElement, FakeEvent, FakeFault};
    use shopcheck_common::OutcomeStatus;

    fn executor(browser: &FakeBrowser) -> StepExecutor<'_, FakeBrowser> {
        StepExecutor::new(
            browser,
            WaitPolicy::new(Duration::from_millis(500), Duration::from_millis(50)),
            Duration::from_millis(10),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_click_waits_until_enabled_control_appears() {
        let mut dom = FakeDom::new();
        dom.add_root("#go", FakeElement::new("go").appears_after(2));
        let browser = FakeBrowser::new(dom);

        executor(&browser).click(&"#go".into()).await.unwrap();
        assert_eq!(browser.clicks(), vec!["go"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_type_into_requires_interactable_field() {
        let mut dom = FakeDom::new();
        dom.add_root("#field", FakeElement::new("field").disabled());
        let browser = FakeBrowser::new(dom);

        let err = executor(&browser)
            .type_into(&"#field".into(), "secret")
            .await
            .unwrap_err();
        assert!(matches!(err, E2eError::Timeout { .. }));
        assert!(browser.typed().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_conclude_failure_attaches_screenshot() {
        let mut dom = FakeDom::new();
        dom.add_root("#go", FakeElement::new("go").click_fault(FakeFault::Intercepted));
        let browser = FakeBrowser::new(dom);
        let exec = executor(&browser);

        let started = Instant::now();
        let result = exec.click(&"#go".into()).await.map(|_| "clicked".to_string());
        let outcome = exec.conclude("click-go", started, result).await;

        assert_eq!(outcome.status, OutcomeStatus::Failed);
        assert!(outcome.message.contains("intercepted"));
        assert!(outcome.screenshot.is_some());
        assert_eq!(browser.events(), vec![FakeEvent::Screenshot]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_conclude_keeps_error_when_capture_fails() {
        let mut dom = FakeDom::new();
        dom.fail_screenshots();
        let browser = FakeBrowser::new(dom);
        let exec = executor(&browser);

        let outcome = exec
            .conclude(
                "step",
                Instant::now(),
                Err(E2eError::ElementNotFound("#gone".into())),
            )
            .await;
        assert_eq!(outcome.status, OutcomeStatus::Failed);
        assert_eq!(outcome.message, "Element not found: #gone");
        assert!(outcome.screenshot.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_conclude_success_has_no_screenshot() {
        let browser = FakeBrowser::new(FakeDom::new());
        let outcome = executor(&browser)
            .conclude("step", Instant::now(), Ok("fine".into()))
            .await;
        assert!(outcome.is_success());
        assert!(outcome.screenshot.is_none());
        assert!(browser.events().is_empty());
    }
}

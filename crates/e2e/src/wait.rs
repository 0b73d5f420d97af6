//! Condition waits
//!
//! Every wait polls the page at a fixed interval until its condition holds or
//! the deadline passes. The interval never drops below [`MIN_POLL_INTERVAL`].

use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::trace;

use crate::browser::{BrowserSession, Selector};
use crate::error::{E2eError, E2eResult};

/// Floor for the polling interval
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// What a located element must satisfy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    /// Exists in the DOM
    Present,
    /// Exists, is displayed, and is enabled
    Interactable,
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Condition::Present => write!(f, "present"),
            Condition::Interactable => write!(f, "interactable"),
        }
    }
}

/// Deadline and polling cadence for a wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl WaitPolicy {
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval,
        }
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }

    /// Effective interval, clamped to the floor
    pub fn interval(&self) -> Duration {
        self.poll_interval.max(MIN_POLL_INTERVAL)
    }
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            poll_interval: Duration::from_millis(250),
        }
    }
}

/// Wait until the first element matching `selector` satisfies `condition`.
pub async fn wait_for<S: BrowserSession>(
    session: &S,
    selector: &Selector,
    condition: Condition,
    policy: &WaitPolicy,
) -> E2eResult<S::Element> {
    let what = format!("'{}' to be {}", selector, condition);
    poll_until(policy, &what, E2eError::is_transient, || async move {
        let Some(element) = session.find_all(selector).await?.into_iter().next() else {
            return Ok(None);
        };
        if satisfies(session, &element, condition).await? {
            Ok(Some(element))
        } else {
            Ok(None)
        }
    })
    .await
}

/// Wait until an already located element satisfies `condition`.
///
/// A stale reference fails immediately; the element will not come back.
pub async fn wait_for_element<S: BrowserSession>(
    session: &S,
    element: &S::Element,
    description: &str,
    condition: Condition,
    policy: &WaitPolicy,
) -> E2eResult<()> {
    let what = format!("{} to be {}", description, condition);
    poll_until(policy, &what, |_| false, || async move {
        Ok(satisfies(session, element, condition).await?.then_some(()))
    })
    .await
}

/// Like [`wait_for`], but a condition that never occurs is `Ok(None)`.
pub async fn probe_optional<S: BrowserSession>(
    session: &S,
    selector: &Selector,
    condition: Condition,
    policy: &WaitPolicy,
) -> E2eResult<Option<S::Element>> {
    match wait_for(session, selector, condition, policy).await {
        Ok(element) => Ok(Some(element)),
        Err(E2eError::Timeout { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

async fn satisfies<S: BrowserSession>(
    session: &S,
    element: &S::Element,
    condition: Condition,
) -> E2eResult<bool> {
    match condition {
        Condition::Present => Ok(true),
        Condition::Interactable => {
            Ok(session.is_displayed(element).await? && session.is_enabled(element).await?)
        }
    }
}

/// Core polling loop. `probe` is always evaluated at least once; errors for
/// which `retry` holds are treated as "not yet".
pub async fn poll_until<T, R, F, Fut>(
    policy: &WaitPolicy,
    what: &str,
    retry: R,
    mut probe: F,
) -> E2eResult<T>
where
    R: Fn(&E2eError) -> bool,
    F: FnMut() -> Fut,
    Fut: Future<Output = E2eResult<Option<T>>>,
{
    let start = Instant::now();
    let deadline = start + policy.timeout;
    let interval = policy.interval();
    let mut last_error: Option<E2eError> = None;
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        match probe().await {
            Ok(Some(value)) => {
                trace!("Condition met after {} attempt(s): {}", attempts, what);
                return Ok(value);
            }
            Ok(None) => {}
            Err(e) if retry(&e) => {
                trace!("Transient error while waiting for {}: {}", what, e);
                last_error = Some(e);
            }
            Err(e) => return Err(e),
        }

        let now = Instant::now();
        if now >= deadline {
            let what = match last_error {
                Some(e) => format!("{} (last error: {})", what, e),
                None => what.to_string(),
            };
            return Err(E2eError::Timeout {
                what,
                waited_ms: start.elapsed().as_millis() as u64,
            });
        }

        sleep(interval.min(deadline - now)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeBrowser, FakeDom, FakeElement};

    fn policy(timeout_ms: u64, poll_ms: u64) -> WaitPolicy {
        WaitPolicy::new(
            Duration::from_millis(timeout_ms),
            Duration::from_millis(poll_ms),
        )
    }

    #[test]
    fn test_poll_interval_floor() {
        assert_eq!(policy(1000, 1).interval(), MIN_POLL_INTERVAL);
        assert_eq!(policy(1000, 400).interval(), Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_presence_after_delayed_render() {
        let mut dom = FakeDom::new();
        dom.add_root("#late", FakeElement::new("late").appears_after(3));
        let browser = FakeBrowser::new(dom);

        let start = Instant::now();
        let found = wait_for(&browser, &"#late".into(), Condition::Present, &policy(5_000, 100))
            .await
            .unwrap();
        assert_eq!(browser.label_of(found), "late");
        assert!(start.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_at_deadline() {
        let browser = FakeBrowser::new(FakeDom::new());

        let start = Instant::now();
        let err = wait_for(&browser, &"#missing".into(), Condition::Present, &policy(1_000, 100))
            .await
            .unwrap_err();
        match err {
            E2eError::Timeout { waited_ms, what } => {
                assert_eq!(waited_ms, 1_000);
                assert!(what.contains("#missing"));
            }
            other => panic!("expected timeout, got {:?}", other),
        }
        assert_eq!(start.elapsed(), Duration::from_millis(1_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_presence_does_not_imply_interactable() {
        let mut dom = FakeDom::new();
        dom.add_root("#btn", FakeElement::new("btn").disabled());
        let browser = FakeBrowser::new(dom);

        assert!(wait_for(&browser, &"#btn".into(), Condition::Present, &policy(500, 100))
            .await
            .is_ok());
        let err = wait_for(&browser, &"#btn".into(), Condition::Interactable, &policy(500, 100))
            .await
            .unwrap_err();
        assert!(matches!(err, E2eError::Timeout { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hidden_element_is_not_interactable() {
        let mut dom = FakeDom::new();
        dom.add_root("#ghost", FakeElement::new("ghost").hidden());
        let browser = FakeBrowser::new(dom);

        let found = probe_optional(&browser, &"#ghost".into(), Condition::Interactable, &policy(300, 100))
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_element_fails_fast() {
        let mut dom = FakeDom::new();
        let id = dom.add_root("#slot", FakeElement::new("slot").stale());
        let browser = FakeBrowser::new(dom);

        let start = Instant::now();
        let err = wait_for_element(&browser, &id, "slot", Condition::Interactable, &policy(5_000, 100))
            .await
            .unwrap_err();
        assert!(matches!(err, E2eError::StaleElement(_)));
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_until_propagates_fatal_errors() {
        let mut calls = 0;
        let err = poll_until(&policy(1_000, 100), "anything", E2eError::is_transient, || {
            calls += 1;
            async { Err::<Option<()>, _>(E2eError::Browser("session gone".into())) }
        })
        .await
        .unwrap_err();
        assert!(matches!(err, E2eError::Browser(_)));
        assert_eq!(calls, 1);
    }
}

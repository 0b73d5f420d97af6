//! Run orchestration: one browser session per run, every selected journey in
//! order, session released on every exit path.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use shopcheck_common::{Journey, RunReport, RunRequest};

use crate::browser::{BrowserSession, SessionFactory};
use crate::error::E2eResult;
use crate::journeys::{self, RunContext};
use crate::profile::StorefrontProfile;

/// Runs journeys against sessions from `F`
pub struct JourneyRunner<F: SessionFactory> {
    factory: F,
    profile: Arc<StorefrontProfile>,
}

impl<F: SessionFactory> JourneyRunner<F> {
    pub fn new(factory: F, profile: StorefrontProfile) -> Self {
        Self {
            factory,
            profile: Arc::new(profile),
        }
    }

    pub fn profile(&self) -> &StorefrontProfile {
        &self.profile
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Execute every journey selected in `request`.
    ///
    /// Only a session that cannot be opened is an error; journey failures are
    /// reported in the returned [`RunReport`].
    pub async fn run(&self, request: &RunRequest) -> E2eResult<RunReport> {
        let run_id = Uuid::new_v4();
        self.run_with_id(run_id, request)
            .instrument(info_span!("run", %run_id))
            .await
    }

    async fn run_with_id(&self, run_id: Uuid, request: &RunRequest) -> E2eResult<RunReport> {
        info!(
            "Starting run against {} with profile '{}' ({} journey(s))",
            request.target_url,
            self.profile.name,
            request.journeys.len()
        );

        let session = self.factory.open().await?;
        let ctx = RunContext::new(run_id, &session, &self.profile);
        let result = AssertUnwindSafe(run_journeys(&ctx, request))
            .catch_unwind()
            .await;

        if let Err(e) = session.close().await {
            warn!("Failed to close browser session: {}", e);
        }

        match result {
            Ok(report) => {
                let passed = report.iter().filter(|(_, o)| o.is_success()).count();
                info!("Run finished: {}/{} journey(s) passed", passed, report.len());
                Ok(report)
            }
            Err(panic) => {
                error!("Run panicked; browser session released");
                std::panic::resume_unwind(panic)
            }
        }
    }
}

/// Run the selected journeys in their fixed order. A failed journey never
/// stops the ones after it.
pub async fn run_journeys<S: BrowserSession>(
    ctx: &RunContext<'_, S>,
    request: &RunRequest,
) -> RunReport {
    let mut report = RunReport::new();
    for journey in Journey::ALL.into_iter().filter(|j| request.includes(*j)) {
        let outcome = match journey {
            Journey::Login => {
                journeys::login(ctx, &request.target_url, &request.credentials).await
            }
            Journey::AddToCart => journeys::add_to_cart(ctx, &request.product_url).await,
            Journey::Checkout => journeys::checkout(ctx).await,
        };
        if !outcome.is_success() {
            warn!("Journey {} failed: {}", journey, outcome.message);
        }
        report.insert(journey, outcome);
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::E2eError;
    use crate::testing::{fast_profile, FakeFactory, FakeFault, FakeSlot, FakeStorefront};
    use shopcheck_common::{OutcomeStatus, RunDefaults, RunRequestInput};

    fn request(journeys: Option<Vec<Journey>>) -> RunRequest {
        RunRequestInput {
            url: Some("https://shop.test/".into()),
            username: Some("shopper@example.com".into()),
            password: Some("hunter2".into()),
            product_url: Some("https://shop.test/p/1".into()),
            journeys,
        }
        .resolve(&RunDefaults::default())
        .unwrap()
    }

    fn storefront() -> FakeStorefront {
        FakeStorefront::new(&fast_profile())
            .tab("0", vec![FakeSlot::marked_disabled("A")])
            .tab("1", vec![FakeSlot::available("B")])
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_run_succeeds() {
        let runner = JourneyRunner::new(FakeFactory::new(storefront().build()), fast_profile());

        let report = runner.run(&request(None)).await.unwrap();

        assert_eq!(report.len(), 3);
        assert!(report.all_succeeded());
        assert_eq!(runner.factory().opened(), 1);
        assert_eq!(runner.factory().closed(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_login_failure_does_not_stop_later_journeys() {
        let dom = storefront().without("account").build();
        let runner = JourneyRunner::new(FakeFactory::new(dom), fast_profile());

        let report = runner.run(&request(None)).await.unwrap();

        let login = report.get(Journey::Login).unwrap();
        assert_eq!(login.status, OutcomeStatus::Failed);
        assert!(login.screenshot.is_some());
        assert!(report.get(Journey::AddToCart).unwrap().is_success());
        assert!(report.get(Journey::Checkout).unwrap().is_success());
        assert_eq!(runner.factory().closed(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_selected_journeys_run() {
        let runner = JourneyRunner::new(FakeFactory::new(storefront().build()), fast_profile());

        let report = runner.run(&request(Some(vec![Journey::Checkout]))).await.unwrap();

        assert_eq!(report.len(), 1);
        assert!(report.get(Journey::Login).is_none());
        let session = runner.factory().last_session().unwrap();
        assert!(!session.clicks().contains(&"join".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_open_failure_is_an_error() {
        let runner = JourneyRunner::new(FakeFactory::unavailable(), fast_profile());

        let err = runner.run(&request(None)).await.unwrap_err();

        assert!(matches!(err, E2eError::SessionStart(_)));
        assert_eq!(runner.factory().closed(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_closed_once_for_every_fault() {
        let scenarios = vec![
            ("no slots", FakeStorefront::new(&fast_profile()).build()),
            ("screenshots fail", storefront().without("account").failing_screenshots().build()),
            (
                "post-selection fault",
                storefront().click_fault("place-order", FakeFault::Intercepted).build(),
            ),
            ("stale slot", storefront().stale("B").build()),
            ("cart broken", storefront().hidden("buy").build()),
        ];

        for (name, dom) in scenarios {
            let runner = JourneyRunner::new(FakeFactory::new(dom), fast_profile());
            let report = runner.run(&request(None)).await.unwrap();
            assert_eq!(report.len(), 3, "{}", name);
            assert!(!report.all_succeeded(), "{}", name);
            assert_eq!(runner.factory().closed(), 1, "{}", name);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_panic_still_releases_session() {
        let dom = storefront().panicking_navigation().build();
        let runner = Arc::new(JourneyRunner::new(FakeFactory::new(dom), fast_profile()));

        let task_runner = runner.clone();
        let joined = tokio::spawn(async move { task_runner.run(&request(None)).await }).await;

        assert!(joined.unwrap_err().is_panic());
        assert_eq!(runner.factory().opened(), 1);
        assert_eq!(runner.factory().closed(), 1);
    }
}

//! User journeys
//!
//! Each journey resolves to a [`StepOutcome`]; errors never escape.

use tokio::time::Instant;
use tracing::{info, info_span, warn, Instrument, Span};
use uuid::Uuid;

use shopcheck_common::{Credentials, StepOutcome};

use crate::browser::BrowserSession;
use crate::diagnostic;
use crate::error::E2eResult;
use crate::executor::StepExecutor;
use crate::profile::StorefrontProfile;
use crate::slots::{Resolution, SlotResolver};

/// Outcome message when no tab offers a usable slot
pub const NO_SLOT_MESSAGE: &str = "no available slot found";

/// Per-run state handed to every journey
pub struct RunContext<'a, S: BrowserSession> {
    pub run_id: Uuid,
    pub session: &'a S,
    pub profile: &'a StorefrontProfile,
}

impl<'a, S: BrowserSession> RunContext<'a, S> {
    pub fn new(run_id: Uuid, session: &'a S, profile: &'a StorefrontProfile) -> Self {
        Self {
            run_id,
            session,
            profile,
        }
    }

    /// Span for one journey, tagged with the run it belongs to
    pub fn journey_span(&self, name: &str) -> Span {
        info_span!("journey", run_id = %self.run_id, name)
    }

    pub fn executor(&self) -> StepExecutor<'a, S> {
        StepExecutor::new(self.session, self.profile.wait_policy(), self.profile.settle())
    }
}

/// Sign in with email and password
pub async fn login<S: BrowserSession>(
    ctx: &RunContext<'_, S>,
    target_url: &str,
    credentials: &Credentials,
) -> StepOutcome {
    let exec = ctx.executor();
    async {
        info!("Journey: login as {}", credentials.username);
        let started = Instant::now();
        let result = login_steps(&exec, ctx.profile, target_url, credentials).await;
        exec.conclude("login", started, result).await
    }
    .instrument(ctx.journey_span("login"))
    .await
}

async fn login_steps<S: BrowserSession>(
    exec: &StepExecutor<'_, S>,
    profile: &StorefrontProfile,
    target_url: &str,
    credentials: &Credentials,
) -> E2eResult<String> {
    let login = &profile.login;
    exec.navigate(target_url).await?;
    exec.click(&login.open_button).await?;
    exec.click(&login.email_tab).await?;
    exec.type_into(&login.username_field, &credentials.username).await?;
    exec.type_into(&login.password_field, &credentials.password).await?;
    exec.click(&login.submit).await?;
    exec.present(&login.account_marker).await?;
    Ok("Login successful".to_string())
}

/// Add the product to the cart and walk through to the checkout page
pub async fn add_to_cart<S: BrowserSession>(
    ctx: &RunContext<'_, S>,
    product_url: &str,
) -> StepOutcome {
    let exec = ctx.executor();
    async {
        info!("Journey: add to cart");
        let started = Instant::now();
        let result = add_to_cart_steps(&exec, ctx.profile, product_url).await;
        exec.conclude("add_to_cart", started, result).await
    }
    .instrument(ctx.journey_span("add_to_cart"))
    .await
}

async fn add_to_cart_steps<S: BrowserSession>(
    exec: &StepExecutor<'_, S>,
    profile: &StorefrontProfile,
    product_url: &str,
) -> E2eResult<String> {
    let cart = &profile.cart;
    exec.navigate(product_url).await?;
    exec.click(&cart.quantity_plus).await?;
    exec.click(&cart.add_to_cart).await?;
    exec.click(&cart.cart_icon).await?;
    exec.click(&cart.start_checkout).await?;
    match &cart.checkout_ready {
        Some(ready) => {
            exec.present(ready).await?;
        }
        None => exec.settle().await,
    }
    Ok("Checkout reached".to_string())
}

/// Pick a delivery slot and place the order
pub async fn checkout<S: BrowserSession>(ctx: &RunContext<'_, S>) -> StepOutcome {
    checkout_flow(ctx).instrument(ctx.journey_span("checkout")).await
}

async fn checkout_flow<S: BrowserSession>(ctx: &RunContext<'_, S>) -> StepOutcome {
    info!("Journey: checkout");
    let exec = ctx.executor();
    let started = Instant::now();
    let mut resolver = SlotResolver::new(ctx.session, ctx.profile);

    match resolver.resolve().await {
        Resolution::Resolved(selected) => {
            let message = format!(
                "Process Success: {} in tab {}",
                selected.label(),
                selected.tab
            );
            exec.conclude("checkout", started, Ok(message)).await
        }
        Resolution::Exhausted { tabs_scanned } => {
            warn!("No available slot in {} tab(s)", tabs_scanned);
            let duration_ms = started.elapsed().as_millis() as u64;
            let screenshot = diagnostic::capture(ctx.session).await;
            StepOutcome::failed(NO_SLOT_MESSAGE, screenshot).with_duration(duration_ms)
        }
        Resolution::Failed { slot, error } => {
            if let Some(slot) = slot {
                warn!("Checkout failed after selecting {} in tab {}", slot.label(), slot.tab);
            }
            exec.conclude("checkout", started, Err(error)).await
        }
    }
}

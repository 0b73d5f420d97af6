//! Shopcheck journey engine
//!
//! Drives a real browser through a storefront's login, add-to-cart and
//! checkout journeys and reports a per-journey outcome:
//! - Polling waits on element conditions instead of fixed sleeps
//! - A step executor that captures a screenshot on every failing step
//! - A slot resolution state machine for the checkout's delivery tabs
//! - A WebDriver backend (fantoccini) behind the [`BrowserSession`] trait
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  JourneyRunner<SessionFactory>              │
//! │    open session ─► run journeys (catch_unwind) ─► close     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  journeys                                                   │
//! │    ├── login(ctx, url, credentials) -> StepOutcome          │
//! │    ├── add_to_cart(ctx, product_url) -> StepOutcome         │
//! │    └── checkout(ctx) -> StepOutcome                         │
//! │          └── SlotResolver: tabs ─► slots ─► commit          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  StepExecutor: locate ─► wait (Present/Interactable) ─► act │
//! │  diagnostic::capture on failure                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  BrowserSession                                             │
//! │    ├── WebDriverSession (fantoccini)                        │
//! │    └── FakeBrowser (feature "testing")                      │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod browser;
pub mod diagnostic;
pub mod driver;
pub mod error;
pub mod executor;
pub mod journeys;
pub mod profile;
pub mod runner;
pub mod slots;
pub mod wait;
pub mod webdriver;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use browser::{BrowserSession, Selector, SessionFactory};
pub use driver::{DriverConfig, DriverProcess};
pub use error::{E2eError, E2eResult};
pub use profile::StorefrontProfile;
pub use runner::JourneyRunner;
pub use webdriver::{WebDriverFactory, WebDriverSession};

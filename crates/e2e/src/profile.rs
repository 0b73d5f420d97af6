//! Storefront profile: the selectors and timings that describe one storefront's
//! markup. Loaded from YAML; every field has a default matching the reference
//! storefront.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::browser::Selector;
use crate::error::{E2eError, E2eResult};
use crate::wait::WaitPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorefrontProfile {
    /// Name used in logs
    pub name: String,

    pub timeouts: Timeouts,

    pub login: LoginSelectors,

    pub cart: CartSelectors,

    pub checkout: CheckoutSelectors,

    /// Text entered into the delivery comment field
    pub delivery_comment: String,
}

impl Default for StorefrontProfile {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            timeouts: Timeouts::default(),
            login: LoginSelectors::default(),
            cart: CartSelectors::default(),
            checkout: CheckoutSelectors::default(),
            delivery_comment: "Developer Automat Test".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Budget for each required condition
    pub wait_ms: u64,

    /// Polling interval (floored at 50 ms)
    pub poll_ms: u64,

    /// Budget for conditions that may never occur
    pub optional_ms: u64,

    /// Pause used only where no observable condition exists
    pub settle_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            wait_ms: 15_000,
            poll_ms: 250,
            optional_ms: 3_000,
            settle_ms: 750,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginSelectors {
    pub open_button: Selector,
    pub email_tab: Selector,
    pub username_field: Selector,
    pub password_field: Selector,
    pub submit: Selector,
    /// Present once the account is signed in
    pub account_marker: Selector,
}

impl Default for LoginSelectors {
    fn default() -> Self {
        Self {
            open_button: Selector::id("joinBTn"),
            email_tab: Selector::id("sign-in-tab-tab-email"),
            username_field: Selector::name("email"),
            password_field: Selector::name("email-pass"),
            submit: Selector::css("button[type='submit']"),
            account_marker: Selector::css("div.user-account, div.profile, a.account"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CartSelectors {
    pub quantity_plus: Selector,
    pub add_to_cart: Selector,
    pub cart_icon: Selector,
    pub start_checkout: Selector,
    /// Present once the checkout page has rendered
    pub checkout_ready: Option<Selector>,
}

impl Default for CartSelectors {
    fn default() -> Self {
        Self {
            quantity_plus: Selector::class("btn-plus"),
            add_to_cart: Selector::class("product-buy-icon"),
            cart_icon: Selector::id("cart-icon"),
            start_checkout: Selector::id("start-checkout"),
            checkout_ready: Some(Selector::css("div.tab-content")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckoutSelectors {
    /// Every slot tab trigger
    pub tabs: Selector,

    /// Attribute carrying a tab's index
    pub tab_index_attribute: String,

    /// One tab trigger; `{index}` is replaced by the tab index
    pub tab_by_index: String,

    /// The panel of the currently active tab
    pub active_panel: Selector,

    /// Slot buttons, relative to the active panel
    pub slot_buttons: Selector,

    /// Class marking a slot button as unavailable
    pub disabled_class: String,

    /// Out-of-stock substitution choice, shown only for some carts
    pub substitution_option: Selector,

    pub delivery_comment_field: Selector,

    pub submit: Selector,

    /// Present once the order has been submitted
    pub confirmation: Option<Selector>,
}

impl Default for CheckoutSelectors {
    fn default() -> Self {
        Self {
            tabs: Selector::css("li[data-index]"),
            tab_index_attribute: "data-index".to_string(),
            tab_by_index: "li[data-index='{index}']".to_string(),
            active_panel: Selector::css("div.tab-content div.tab-pane[aria-hidden='false']"),
            slot_buttons: Selector::css("div.tableRow div.tableColumn button[class*='slot-']"),
            disabled_class: "disabledButton".to_string(),
            substitution_option: Selector::class("btn-oos-option"),
            delivery_comment_field: Selector::id("Comments"),
            submit: Selector::id("processCheckout"),
            confirmation: None,
        }
    }
}

impl CheckoutSelectors {
    /// Selector for the tab trigger with the given index
    pub fn tab_selector(&self, index: &str) -> Selector {
        Selector::css(self.tab_by_index.replace("{index}", &index.replace('\'', "\\'")))
    }
}

impl StorefrontProfile {
    /// Parse a profile from YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let profile: Self = serde_yaml::from_str(yaml)?;
        profile.validate()?;
        Ok(profile)
    }

    /// Parse a profile from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load from `path` when given, else the built-in profile
    pub fn load(path: Option<&Path>) -> E2eResult<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn to_yaml(&self) -> E2eResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    fn validate(&self) -> E2eResult<()> {
        if !self.checkout.tab_by_index.contains("{index}") {
            return Err(E2eError::ProfileParse(
                "checkout.tab_by_index must contain '{index}'".to_string(),
            ));
        }
        if self.timeouts.wait_ms == 0 {
            return Err(E2eError::ProfileParse("timeouts.wait_ms must be positive".to_string()));
        }
        Ok(())
    }

    pub fn wait_policy(&self) -> WaitPolicy {
        WaitPolicy::new(
            Duration::from_millis(self.timeouts.wait_ms),
            Duration::from_millis(self.timeouts.poll_ms),
        )
    }

    pub fn optional_policy(&self) -> WaitPolicy {
        self.wait_policy()
            .with_timeout(Duration::from_millis(self.timeouts.optional_ms))
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.timeouts.settle_ms)
    }
}

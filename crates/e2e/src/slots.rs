//! Delivery slot resolution
//!
//! Walks the checkout's slot tabs in document order and commits to the first
//! actionable slot it can click:
//!
//! ```text
//! Init -> TabScan -> TabActive -> SlotScan -> SlotSelected -> PostSelectionFlow -> Resolved
//!             |          |            |
//!             |          +-- activation failed: next tab
//!             |                       +-- no candidates / none actionable: next tab
//!             +-- tabs exhausted ------------------------------------------> Exhausted
//! ```
//!
//! The click on a slot is the commit point. Faults before it skip the tab or
//! slot; faults after it fail the whole resolution and no other slot is tried.

use tracing::{debug, info, warn};

use crate::browser::BrowserSession;
use crate::error::{E2eError, E2eResult};
use crate::executor::StepExecutor;
use crate::profile::StorefrontProfile;
use crate::wait::{self, Condition};

/// A slot tab as found during the scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabDescriptor {
    pub index: String,
    pub is_active: bool,
}

/// A slot button inside the active panel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotCandidate {
    /// Zero-based position within the panel
    pub position: usize,
    /// Class list
    pub signature: String,
    pub is_enabled: bool,
    pub has_disabled_marker: bool,
    pub has_disabled_attribute: bool,
}

impl SlotCandidate {
    /// One-based label used in logs and outcome messages
    pub fn label(&self) -> String {
        format!("slot {}", self.position + 1)
    }

    pub fn is_actionable(&self) -> bool {
        self.is_enabled && !self.has_disabled_marker && !self.has_disabled_attribute
    }

    fn blockers(&self) -> Vec<&'static str> {
        let mut reasons = Vec::new();
        if self.has_disabled_marker {
            reasons.push("disabled class");
        }
        if !self.is_enabled {
            reasons.push("not enabled");
        }
        if self.has_disabled_attribute {
            reasons.push("disabled attribute");
        }
        reasons
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionState {
    Init,
    TabScan,
    TabActive(String),
    SlotScan(String),
    SlotSelected { tab: String, position: usize },
    PostSelectionFlow,
    Resolved,
    Exhausted,
}

/// The slot that was committed to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedSlot {
    pub tab: String,
    pub position: usize,
    pub signature: String,
}

impl SelectedSlot {
    pub fn label(&self) -> String {
        format!("slot {}", self.position + 1)
    }
}

#[derive(Debug)]
pub enum Resolution {
    Resolved(SelectedSlot),
    /// Every tab was scanned without finding a slot to commit to
    Exhausted { tabs_scanned: usize },
    /// A fault that ends the resolution; `slot` is set when it happened after
    /// the commit point
    Failed {
        slot: Option<SelectedSlot>,
        error: E2eError,
    },
}

/// Result of trying to bring a tab's panel up
pub enum TabActivation<E> {
    Active(E),
    Failed(E2eError),
}

/// What happened to one slot candidate
#[derive(Debug)]
pub enum SlotDecision {
    NotActionable(SlotCandidate),
    Faulted(E2eError),
    Committed(SelectedSlot),
}

pub struct SlotResolver<'a, S: BrowserSession> {
    exec: StepExecutor<'a, S>,
    profile: &'a StorefrontProfile,
    trace: Vec<ResolutionState>,
}

impl<'a, S: BrowserSession> SlotResolver<'a, S> {
    pub fn new(session: &'a S, profile: &'a StorefrontProfile) -> Self {
        Self {
            exec: StepExecutor::new(session, profile.wait_policy(), profile.settle()),
            profile,
            trace: Vec::new(),
        }
    }

    /// States visited so far, in order
    pub fn trace(&self) -> &[ResolutionState] {
        &self.trace
    }

    /// Run the state machine. Expects the checkout page to be loaded.
    pub async fn resolve(&mut self) -> Resolution {
        self.enter(ResolutionState::Init);
        self.enter(ResolutionState::TabScan);

        let tabs = match self.scan_tabs().await {
            Ok(tabs) => tabs,
            Err(error) => return Resolution::Failed { slot: None, error },
        };
        info!("Found {} slot tab(s)", tabs.len());

        for tab in &tabs {
            self.enter(ResolutionState::TabActive(tab.index.clone()));
            let panel = match self.activate(tab).await {
                TabActivation::Active(panel) => panel,
                TabActivation::Failed(e) => {
                    warn!("Could not activate tab {}: {}", tab.index, e);
                    continue;
                }
            };

            self.enter(ResolutionState::SlotScan(tab.index.clone()));
            let buttons = match self
                .exec
                .session()
                .find_all_within(&panel, &self.profile.checkout.slot_buttons)
                .await
            {
                Ok(buttons) => buttons,
                Err(e) => {
                    warn!("Could not list slots in tab {}: {}", tab.index, e);
                    continue;
                }
            };
            if buttons.is_empty() {
                info!("Tab {} has no slots", tab.index);
                continue;
            }

            for (position, button) in buttons.iter().enumerate() {
                let selected = match self.try_slot(tab, position, button).await {
                    SlotDecision::Committed(selected) => selected,
                    SlotDecision::NotActionable(candidate) => {
                        info!(
                            "Skipping {} in tab {}: {}",
                            candidate.label(),
                            tab.index,
                            candidate.blockers().join(", ")
                        );
                        continue;
                    }
                    SlotDecision::Faulted(e) => {
                        warn!("Skipping slot {} in tab {}: {}", position + 1, tab.index, e);
                        continue;
                    }
                };

                self.enter(ResolutionState::SlotSelected {
                    tab: selected.tab.clone(),
                    position: selected.position,
                });
                self.enter(ResolutionState::PostSelectionFlow);
                return match self.post_selection().await {
                    Ok(()) => {
                        self.enter(ResolutionState::Resolved);
                        Resolution::Resolved(selected)
                    }
                    Err(error) => Resolution::Failed {
                        slot: Some(selected),
                        error,
                    },
                };
            }
        }

        self.enter(ResolutionState::Exhausted);
        Resolution::Exhausted {
            tabs_scanned: tabs.len(),
        }
    }

    fn enter(&mut self, state: ResolutionState) {
        debug!("Slot resolution -> {:?}", state);
        self.trace.push(state);
    }

    async fn scan_tabs(&self) -> E2eResult<Vec<TabDescriptor>> {
        let session = self.exec.session();
        let checkout = &self.profile.checkout;
        let mut tabs = Vec::new();

        for element in session.find_all(&checkout.tabs).await? {
            let index = match session.attribute(&element, &checkout.tab_index_attribute).await {
                Ok(Some(index)) => index,
                Ok(None) => {
                    warn!("Tab without {} attribute ignored", checkout.tab_index_attribute);
                    continue;
                }
                Err(e) => {
                    warn!("Skipping tab during scan: {}", e);
                    continue;
                }
            };
            let is_active = session
                .attribute(&element, "class")
                .await
                .ok()
                .flatten()
                .map(|class| class.split_whitespace().any(|c| c == "active"))
                .unwrap_or(false);
            tabs.push(TabDescriptor { index, is_active });
        }
        Ok(tabs)
    }

    /// Click the tab and wait for its panel. The tab is re-located by index so
    /// a re-render since the scan does not matter.
    async fn activate(&self, tab: &TabDescriptor) -> TabActivation<S::Element> {
        let checkout = &self.profile.checkout;
        if tab.is_active {
            debug!("Tab {} already active", tab.index);
        }
        if let Err(e) = self.exec.click(&checkout.tab_selector(&tab.index)).await {
            return TabActivation::Failed(e);
        }
        if let Err(e) = self.exec.present(&checkout.active_panel).await {
            return TabActivation::Failed(e);
        }
        self.exec.settle().await;
        match self.exec.present(&checkout.active_panel).await {
            Ok(panel) => TabActivation::Active(panel),
            Err(e) => TabActivation::Failed(e),
        }
    }

    async fn try_slot(
        &self,
        tab: &TabDescriptor,
        position: usize,
        button: &S::Element,
    ) -> SlotDecision {
        let candidate = match self.inspect(position, button).await {
            Ok(candidate) => candidate,
            Err(e) => return SlotDecision::Faulted(e),
        };
        if !candidate.is_actionable() {
            return SlotDecision::NotActionable(candidate);
        }
        match self.exec.click_element(button, &candidate.label()).await {
            Ok(()) => {
                info!(
                    "Selected {} in tab {} [{}]",
                    candidate.label(),
                    tab.index,
                    candidate.signature
                );
                SlotDecision::Committed(SelectedSlot {
                    tab: tab.index.clone(),
                    position,
                    signature: candidate.signature,
                })
            }
            Err(e) => SlotDecision::Faulted(e),
        }
    }

    async fn inspect(&self, position: usize, button: &S::Element) -> E2eResult<SlotCandidate> {
        let session = self.exec.session();
        let disabled_class = &self.profile.checkout.disabled_class;

        let class = session.attribute(button, "class").await?.unwrap_or_default();

        Ok(SlotCandidate {
            position,
            signature: class.split_whitespace().collect::<Vec<_>>().join(" "),
            is_enabled: session.is_enabled(button).await?,
            has_disabled_marker: !disabled_class.is_empty() && class.contains(disabled_class.as_str()),
            has_disabled_attribute: session.attribute(button, "disabled").await?.is_some(),
        })
    }

    async fn post_selection(&self) -> E2eResult<()> {
        let session = self.exec.session();
        let checkout = &self.profile.checkout;

        let substitution = wait::probe_optional(
            session,
            &checkout.substitution_option,
            Condition::Interactable,
            &self.profile.optional_policy(),
        )
        .await?;
        match substitution {
            Some(option) => {
                session.click(&option).await?;
                debug!("Confirmed substitution option");
            }
            None => debug!("No substitution prompt"),
        }

        self.exec
            .type_into(&checkout.delivery_comment_field, &self.profile.delivery_comment)
            .await?;
        self.exec.click(&checkout.submit).await?;

        match &checkout.confirmation {
            Some(confirmation) => {
                self.exec.present(confirmation).await?;
            }
            None => self.exec.settle().await,
        }
        Ok(())
    }
}

//! Scripted in-memory browser
//!
//! [`FakeBrowser`] implements [`BrowserSession`] over a tiny element arena.
//! Elements are registered under the exact selector strings the engine will
//! query; there is no CSS engine. [`FakeStorefront`] lays out a complete
//! storefront for a [`StorefrontProfile`] so journeys can run end to end.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::browser::{BrowserSession, Selector, SessionFactory};
use crate::error::{E2eError, E2eResult};
use crate::profile::StorefrontProfile;

pub type FakeElementId = usize;

/// Fault raised when a scripted element is clicked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeFault {
    Stale,
    Intercepted,
}

impl FakeFault {
    fn to_error(self, label: &str) -> E2eError {
        match self {
            FakeFault::Stale => E2eError::StaleElement(label.to_string()),
            FakeFault::Intercepted => {
                E2eError::Interaction(format!("click intercepted on {}", label))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct FakeElement {
    label: String,
    attributes: HashMap<String, String>,
    enabled: bool,
    displayed: bool,
    stale: bool,
    appears_after: usize,
    visible_with_tab: Option<String>,
    activates_tab: Option<String>,
    click_fault: Option<FakeFault>,
    failing_attribute: Option<String>,
}

impl FakeElement {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            attributes: HashMap::new(),
            enabled: true,
            displayed: true,
            stale: false,
            appears_after: 0,
            visible_with_tab: None,
            activates_tab: None,
            click_fault: None,
            failing_attribute: None,
        }
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.displayed = false;
        self
    }

    pub fn stale(mut self) -> Self {
        self.stale = true;
        self
    }

    /// Absent from the first `lookups` queries that would match it
    pub fn appears_after(mut self, lookups: usize) -> Self {
        self.appears_after = lookups;
        self
    }

    /// Attached only while the tab with this index is active
    pub fn only_with_tab(mut self, index: &str) -> Self {
        self.visible_with_tab = Some(index.to_string());
        self
    }

    /// Clicking activates the tab with this index
    pub fn activates_tab(mut self, index: &str) -> Self {
        self.activates_tab = Some(index.to_string());
        self
    }

    pub fn click_fault(mut self, fault: FakeFault) -> Self {
        self.click_fault = Some(fault);
        self
    }

    /// Reading this attribute fails with a backend error
    pub fn failing_attribute(mut self, name: &str) -> Self {
        self.failing_attribute = Some(name.to_string());
        self
    }
}

/// Everything the fake browser was asked to do, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeEvent {
    Navigate(String),
    Click(String),
    Type { label: String, text: String },
    Screenshot,
    Close,
}

#[derive(Debug, Clone, Default)]
pub struct FakeDom {
    elements: Vec<FakeElement>,
    roots: Vec<(Selector, FakeElementId)>,
    children: Vec<(FakeElementId, Selector, FakeElementId)>,
    lookups: HashMap<FakeElementId, usize>,
    active_tab: Option<String>,
    screenshot_fails: bool,
    panic_on_navigate: bool,
    events: Vec<FakeEvent>,
}

impl FakeDom {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a document-level element under `selector`
    pub fn add_root(&mut self, selector: impl Into<Selector>, element: FakeElement) -> FakeElementId {
        let id = self.push(element);
        self.roots.push((selector.into(), id));
        id
    }

    /// Register an existing element under an additional selector
    pub fn alias_root(&mut self, selector: impl Into<Selector>, id: FakeElementId) {
        self.roots.push((selector.into(), id));
    }

    /// Register an element found under `parent` with `selector`
    pub fn add_child(
        &mut self,
        parent: FakeElementId,
        selector: impl Into<Selector>,
        element: FakeElement,
    ) -> FakeElementId {
        let id = self.push(element);
        self.children.push((parent, selector.into(), id));
        id
    }

    /// Detach every element with this label
    pub fn remove(&mut self, label: &str) {
        let elements = &self.elements;
        self.roots.retain(|(_, id)| elements[*id].label != label);
        self.children.retain(|(_, _, id)| elements[*id].label != label);
    }

    /// Apply `change` to every element with this label
    pub fn modify(&mut self, label: &str, change: impl Fn(FakeElement) -> FakeElement) {
        for element in self.elements.iter_mut().filter(|e| e.label == label) {
            *element = change(element.clone());
        }
    }

    pub fn fail_screenshots(&mut self) {
        self.screenshot_fails = true;
    }

    pub fn panic_on_navigate(&mut self) {
        self.panic_on_navigate = true;
    }

    fn push(&mut self, element: FakeElement) -> FakeElementId {
        self.elements.push(element);
        self.elements.len() - 1
    }

    /// Counts as one lookup of `id`
    fn lookup(&mut self, id: FakeElementId) -> bool {
        let count = {
            let count = self.lookups.entry(id).or_insert(0);
            *count += 1;
            *count
        };
        count > self.elements[id].appears_after && self.attached(id)
    }

    fn attached(&self, id: FakeElementId) -> bool {
        match &self.elements[id].visible_with_tab {
            Some(tab) => self.active_tab.as_ref() == Some(tab),
            None => true,
        }
    }

    fn live(&self, id: FakeElementId) -> E2eResult<&FakeElement> {
        let element = self
            .elements
            .get(id)
            .ok_or_else(|| E2eError::ElementNotFound(format!("fake element #{}", id)))?;
        if element.stale || !self.attached(id) {
            return Err(E2eError::StaleElement(element.label.clone()));
        }
        Ok(element)
    }
}

/// In-memory [`BrowserSession`]
#[derive(Clone)]
pub struct FakeBrowser {
    dom: Arc<Mutex<FakeDom>>,
    closes: Arc<AtomicUsize>,
}

impl FakeBrowser {
    pub fn new(dom: FakeDom) -> Self {
        Self {
            dom: Arc::new(Mutex::new(dom)),
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn events(&self) -> Vec<FakeEvent> {
        self.dom.lock().events.clone()
    }

    /// Labels of clicked elements, in order
    pub fn clicks(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                FakeEvent::Click(label) => Some(label),
                _ => None,
            })
            .collect()
    }

    /// (label, text) pairs typed, in order
    pub fn typed(&self) -> Vec<(String, String)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                FakeEvent::Type { label, text } => Some((label, text)),
                _ => None,
            })
            .collect()
    }

    pub fn label_of(&self, id: FakeElementId) -> String {
        self.dom.lock().elements[id].label.clone()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserSession for FakeBrowser {
    type Element = FakeElementId;

    async fn navigate(&self, url: &str) -> E2eResult<()> {
        let mut dom = self.dom.lock();
        if dom.panic_on_navigate {
            drop(dom);
            panic!("scripted navigation panic");
        }
        dom.events.push(FakeEvent::Navigate(url.to_string()));
        Ok(())
    }

    async fn find_all(&self, selector: &Selector) -> E2eResult<Vec<FakeElementId>> {
        let mut dom = self.dom.lock();
        let ids: Vec<FakeElementId> = dom
            .roots
            .iter()
            .filter(|(s, _)| s == selector)
            .map(|(_, id)| *id)
            .collect();
        Ok(ids.into_iter().filter(|id| dom.lookup(*id)).collect())
    }

    async fn find_all_within(
        &self,
        scope: &FakeElementId,
        selector: &Selector,
    ) -> E2eResult<Vec<FakeElementId>> {
        let mut dom = self.dom.lock();
        dom.live(*scope)?;
        let ids: Vec<FakeElementId> = dom
            .children
            .iter()
            .filter(|(parent, s, _)| parent == scope && s == selector)
            .map(|(_, _, id)| *id)
            .collect();
        Ok(ids.into_iter().filter(|id| dom.lookup(*id)).collect())
    }

    async fn click(&self, element: &FakeElementId) -> E2eResult<()> {
        let mut dom = self.dom.lock();
        let target = dom.live(*element)?.clone();
        if let Some(fault) = target.click_fault {
            return Err(fault.to_error(&target.label));
        }
        if !target.displayed {
            return Err(E2eError::Interaction(format!("{} is not displayed", target.label)));
        }
        dom.events.push(FakeEvent::Click(target.label.clone()));
        if let Some(tab) = target.activates_tab {
            dom.active_tab = Some(tab);
        }
        Ok(())
    }

    async fn type_text(&self, element: &FakeElementId, text: &str) -> E2eResult<()> {
        let mut dom = self.dom.lock();
        let label = dom.live(*element)?.label.clone();
        dom.events.push(FakeEvent::Type {
            label,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn attribute(&self, element: &FakeElementId, name: &str) -> E2eResult<Option<String>> {
        let dom = self.dom.lock();
        let target = dom.live(*element)?;
        if target.failing_attribute.as_deref() == Some(name) {
            return Err(E2eError::Browser(format!(
                "javascript error: {} detached",
                target.label
            )));
        }
        Ok(target.attributes.get(name).cloned())
    }

    async fn is_enabled(&self, element: &FakeElementId) -> E2eResult<bool> {
        let dom = self.dom.lock();
        Ok(dom.live(*element)?.enabled)
    }

    async fn is_displayed(&self, element: &FakeElementId) -> E2eResult<bool> {
        let dom = self.dom.lock();
        Ok(dom.live(*element)?.displayed)
    }

    async fn screenshot(&self) -> E2eResult<Vec<u8>> {
        let mut dom = self.dom.lock();
        if dom.screenshot_fails {
            return Err(E2eError::Screenshot("scripted screenshot failure".to_string()));
        }
        dom.events.push(FakeEvent::Screenshot);
        Ok(tiny_png())
    }

    async fn close(&self) -> E2eResult<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.dom.lock().events.push(FakeEvent::Close);
        Ok(())
    }
}

/// Hands out a fresh copy of a template DOM per session and counts
/// opens and closes.
pub struct FakeFactory {
    template: FakeDom,
    fail_open: bool,
    opened: AtomicUsize,
    closes: Arc<AtomicUsize>,
    sessions: Mutex<Vec<FakeBrowser>>,
}

impl FakeFactory {
    pub fn new(template: FakeDom) -> Self {
        Self {
            template,
            fail_open: false,
            opened: AtomicUsize::new(0),
            closes: Arc::new(AtomicUsize::new(0)),
            sessions: Mutex::new(Vec::new()),
        }
    }

    /// A factory whose sessions never open
    pub fn unavailable() -> Self {
        Self {
            fail_open: true,
            ..Self::new(FakeDom::new())
        }
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn last_session(&self) -> Option<FakeBrowser> {
        self.sessions.lock().last().cloned()
    }
}

#[async_trait]
impl SessionFactory for FakeFactory {
    type Session = FakeBrowser;

    async fn open(&self) -> E2eResult<FakeBrowser> {
        if self.fail_open {
            return Err(E2eError::SessionStart("scripted: no browser available".to_string()));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        let browser = FakeBrowser {
            dom: Arc::new(Mutex::new(self.template.clone())),
            closes: self.closes.clone(),
        };
        self.sessions.lock().push(browser.clone());
        Ok(browser)
    }
}

/// A slot button to place in a fake checkout tab
#[derive(Debug, Clone)]
pub struct FakeSlot {
    label: String,
    marked: bool,
    enabled: bool,
    disabled_attribute: bool,
}

impl FakeSlot {
    pub fn available(label: &str) -> Self {
        Self {
            label: label.to_string(),
            marked: false,
            enabled: true,
            disabled_attribute: false,
        }
    }

    /// Carries the profile's disabled class
    pub fn marked_disabled(label: &str) -> Self {
        Self {
            marked: true,
            ..Self::available(label)
        }
    }

    /// Reports itself as not enabled
    pub fn not_enabled(label: &str) -> Self {
        Self {
            enabled: false,
            ..Self::available(label)
        }
    }

    /// Has a `disabled` attribute
    pub fn disabled_attribute(label: &str) -> Self {
        Self {
            disabled_attribute: true,
            ..Self::available(label)
        }
    }
}

/// Builds a [`FakeDom`] laid out like a storefront for `profile`.
///
/// Control labels: `join`, `email-tab`, `username`, `password`,
/// `login-submit`, `account`, `plus`, `buy`, `cart`, `start-checkout`,
/// `checkout-ready`, `substitution`, `comment`, `place-order`,
/// `confirmation`, and `tab:<index>` / `panel:<index>` per tab.
pub struct FakeStorefront {
    profile: StorefrontProfile,
    dom: FakeDom,
}

impl FakeStorefront {
    pub fn new(profile: &StorefrontProfile) -> Self {
        let mut dom = FakeDom::new();
        let login = &profile.login;
        dom.add_root(login.open_button.clone(), FakeElement::new("join"));
        dom.add_root(login.email_tab.clone(), FakeElement::new("email-tab"));
        dom.add_root(login.username_field.clone(), FakeElement::new("username"));
        dom.add_root(login.password_field.clone(), FakeElement::new("password"));
        dom.add_root(login.submit.clone(), FakeElement::new("login-submit"));
        dom.add_root(login.account_marker.clone(), FakeElement::new("account"));

        let cart = &profile.cart;
        dom.add_root(cart.quantity_plus.clone(), FakeElement::new("plus"));
        dom.add_root(cart.add_to_cart.clone(), FakeElement::new("buy"));
        dom.add_root(cart.cart_icon.clone(), FakeElement::new("cart"));
        dom.add_root(cart.start_checkout.clone(), FakeElement::new("start-checkout"));
        if let Some(ready) = &cart.checkout_ready {
            dom.add_root(ready.clone(), FakeElement::new("checkout-ready"));
        }

        let checkout = &profile.checkout;
        dom.add_root(checkout.substitution_option.clone(), FakeElement::new("substitution"));
        dom.add_root(checkout.delivery_comment_field.clone(), FakeElement::new("comment"));
        dom.add_root(checkout.submit.clone(), FakeElement::new("place-order"));
        if let Some(confirmation) = &checkout.confirmation {
            dom.add_root(confirmation.clone(), FakeElement::new("confirmation"));
        }

        Self {
            profile: profile.clone(),
            dom,
        }
    }

    /// Append a checkout tab holding `slots` in document order
    pub fn tab(mut self, index: &str, slots: Vec<FakeSlot>) -> Self {
        let checkout = &self.profile.checkout;
        let tab = self.dom.add_root(
            checkout.tabs.clone(),
            FakeElement::new(&format!("tab:{}", index))
                .attr(&checkout.tab_index_attribute, index)
                .activates_tab(index),
        );
        self.dom.alias_root(checkout.tab_selector(index), tab);

        let panel = self.dom.add_root(
            checkout.active_panel.clone(),
            FakeElement::new(&format!("panel:{}", index)).only_with_tab(index),
        );

        for slot in slots {
            let class = if slot.marked {
                format!("slot-btn {}", checkout.disabled_class)
            } else {
                "slot-btn".to_string()
            };
            let mut element = FakeElement::new(&slot.label).attr("class", &class);
            if !slot.enabled {
                element = element.disabled();
            }
            if slot.disabled_attribute {
                element = element.attr("disabled", "true");
            }
            self.dom.add_child(panel, checkout.slot_buttons.clone(), element);
        }
        self
    }

    pub fn without(mut self, label: &str) -> Self {
        self.dom.remove(label);
        self
    }

    pub fn click_fault(mut self, label: &str, fault: FakeFault) -> Self {
        self.dom.modify(label, |e| e.click_fault(fault));
        self
    }

    pub fn failing_attribute(mut self, label: &str, name: &str) -> Self {
        let name = name.to_string();
        self.dom.modify(label, move |e| e.failing_attribute(&name));
        self
    }

    pub fn hidden(mut self, label: &str) -> Self {
        self.dom.modify(label, FakeElement::hidden);
        self
    }

    pub fn stale(mut self, label: &str) -> Self {
        self.dom.modify(label, FakeElement::stale);
        self
    }

    pub fn failing_screenshots(mut self) -> Self {
        self.dom.fail_screenshots();
        self
    }

    pub fn panicking_navigation(mut self) -> Self {
        self.dom.panic_on_navigate();
        self
    }

    pub fn build(self) -> FakeDom {
        self.dom
    }
}

/// Profile with short timeouts for scripted runs
pub fn fast_profile() -> StorefrontProfile {
    let mut profile = StorefrontProfile::default();
    profile.name = "fake".to_string();
    profile.timeouts.wait_ms = 1_000;
    profile.timeouts.poll_ms = 50;
    profile.timeouts.optional_ms = 200;
    profile.timeouts.settle_ms = 10;
    profile
}

/// A valid 2x2 PNG
pub fn tiny_png() -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(2, 2, image::Rgba([200, 30, 30, 255]));
    let mut out = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut out, image::ImageOutputFormat::Png)
        .expect("encode png");
    out.into_inner()
}

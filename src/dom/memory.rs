//! In-memory headless page
//!
//! Implements [`Document`] and [`NavigationContext`] without a browser. The
//! CLI uses it to describe the page an event is sent from; tests use it to
//! drive clicks, history pushes and back/forward navigation.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;
use url::Url;

use super::{
    ClickEvent, ClickHandler, Document, Element, InterceptId, ListenerId, NavigationContext,
    RouteHandler,
};

pub struct MemoryPage {
    location: Mutex<Url>,
    title: Mutex<String>,
    referrer: String,
    screen: (u32, u32),
    globals: HashSet<String>,
    ready: AtomicBool,
    history_api: bool,
    next_id: AtomicU64,
    click_listeners: DashMap<ListenerId, ClickHandler>,
    route_listeners: DashMap<ListenerId, RouteHandler>,
    intercepts: DashMap<InterceptId, RouteHandler>,
    ready_handlers: Mutex<Vec<RouteHandler>>,
    navigations: Mutex<Vec<String>>,
}

impl MemoryPage {
    /// A fully loaded page at `url` with programmatic history available.
    pub fn new(url: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            location: Mutex::new(Url::parse(url)?),
            title: Mutex::new(String::new()),
            referrer: String::new(),
            screen: (1920, 1080),
            globals: HashSet::new(),
            ready: AtomicBool::new(true),
            history_api: true,
            next_id: AtomicU64::new(1),
            click_listeners: DashMap::new(),
            route_listeners: DashMap::new(),
            intercepts: DashMap::new(),
            ready_handlers: Mutex::new(Vec::new()),
            navigations: Mutex::new(Vec::new()),
        })
    }

    pub fn with_title(self, title: impl Into<String>) -> Self {
        *self.title.lock() = title.into();
        self
    }

    pub fn with_referrer(mut self, referrer: impl Into<String>) -> Self {
        self.referrer = referrer.into();
        self
    }

    pub fn with_screen(mut self, width: u32, height: u32) -> Self {
        self.screen = (width, height);
        self
    }

    /// Define a global on the page (e.g. an automation marker).
    pub fn with_global(mut self, name: impl Into<String>) -> Self {
        self.globals.insert(name.into());
        self
    }

    /// Start with the document body not yet available.
    pub fn loading(self) -> Self {
        self.ready.store(false, Ordering::SeqCst);
        self
    }

    /// Model a page without a programmatic history API.
    pub fn without_history(mut self) -> Self {
        self.history_api = false;
        self
    }

    pub fn set_title(&self, title: impl Into<String>) {
        *self.title.lock() = title.into();
    }

    /// Programmatic navigation: updates the location, then runs every
    /// interception installed on the entry point.
    pub fn push_state(&self, path: &str) {
        self.set_location(path);
        let handlers: Vec<RouteHandler> =
            self.intercepts.iter().map(|e| Arc::clone(e.value())).collect();
        for handler in handlers {
            handler();
        }
    }

    /// Back/forward navigation to `path`.
    pub fn back(&self, path: &str) {
        self.set_location(path);
        let handlers: Vec<RouteHandler> = self
            .route_listeners
            .iter()
            .map(|e| Arc::clone(e.value()))
            .collect();
        for handler in handlers {
            handler();
        }
    }

    /// Mark the document as ready and run deferred readiness handlers.
    pub fn finish_loading(&self) {
        self.ready.store(true, Ordering::SeqCst);
        let handlers = std::mem::take(&mut *self.ready_handlers.lock());
        for handler in handlers {
            handler();
        }
    }

    /// Dispatch a click or auxclick to every document listener.
    pub fn dispatch_click(&self, event: &ClickEvent) {
        let handlers: Vec<ClickHandler> = self
            .click_listeners
            .iter()
            .map(|e| Arc::clone(e.value()))
            .collect();
        for handler in handlers {
            handler(event);
        }
    }

    /// Full navigations performed through [`NavigationContext::navigate`].
    pub fn navigations(&self) -> Vec<String> {
        self.navigations.lock().clone()
    }

    pub fn click_listener_count(&self) -> usize {
        self.click_listeners.len()
    }

    pub fn route_listener_count(&self) -> usize {
        self.route_listeners.len()
    }

    pub fn intercept_count(&self) -> usize {
        self.intercepts.len()
    }

    fn set_location(&self, target: &str) {
        let mut location = self.location.lock();
        match location.join(target) {
            Ok(next) => *location = next,
            Err(err) => debug!(target = %target, error = %err, "ignoring unparsable location"),
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }
}

impl Document for MemoryPage {
    fn location(&self) -> Url {
        self.location.lock().clone()
    }

    fn title(&self) -> String {
        self.title.lock().clone()
    }

    fn referrer(&self) -> String {
        self.referrer.clone()
    }

    fn screen(&self) -> (u32, u32) {
        self.screen
    }

    fn has_global(&self, name: &str) -> bool {
        self.globals.contains(name)
    }

    fn add_click_listener(&self, handler: ClickHandler) -> ListenerId {
        let id = ListenerId(self.next_id());
        self.click_listeners.insert(id, handler);
        id
    }

    fn remove_click_listener(&self, id: ListenerId) {
        self.click_listeners.remove(&id);
    }
}

impl NavigationContext for MemoryPage {
    fn current_path(&self) -> String {
        self.location.lock().path().to_string()
    }

    fn navigate(&self, url: &str) {
        self.navigations.lock().push(url.to_string());
        self.set_location(url);
    }

    fn on_route_change(&self, handler: RouteHandler) -> ListenerId {
        let id = ListenerId(self.next_id());
        self.route_listeners.insert(id, handler);
        id
    }

    fn remove_route_listener(&self, id: ListenerId) {
        self.route_listeners.remove(&id);
    }

    fn intercept(&self, handler: RouteHandler) -> Option<InterceptId> {
        if !self.history_api {
            return None;
        }
        let id = InterceptId(self.next_id());
        self.intercepts.insert(id, handler);
        Some(id)
    }

    fn release(&self, id: InterceptId) {
        self.intercepts.remove(&id);
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn on_ready(&self, handler: RouteHandler) {
        if self.is_ready() {
            handler();
        } else {
            self.ready_handlers.lock().push(handler);
        }
    }
}

/// A synthetic element for building element trees.
#[derive(Clone)]
pub struct MemoryElement {
    tag: Option<String>,
    attributes: Vec<(String, String)>,
    parent: Option<Arc<dyn Element>>,
}

impl MemoryElement {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: Some(tag.into()),
            attributes: Vec::new(),
            parent: None,
        }
    }

    /// A text node: no tag, no attributes.
    pub fn text() -> Self {
        Self {
            tag: None,
            attributes: Vec::new(),
            parent: None,
        }
    }

    pub fn anchor(href: impl Into<String>) -> Self {
        Self::new("a").attr("href", href)
    }

    /// Set an attribute, replacing an existing value in place.
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
        self
    }

    pub fn within(mut self, parent: Arc<dyn Element>) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn into_element(self) -> Arc<dyn Element> {
        Arc::new(self)
    }
}

impl Element for MemoryElement {
    fn tag_name(&self) -> Option<String> {
        self.tag.clone()
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    }

    fn attribute_names(&self) -> Vec<String> {
        self.attributes.iter().map(|(n, _)| n.clone()).collect()
    }

    fn href(&self) -> Option<String> {
        match self.tag.as_deref() {
            Some(tag) if tag.eq_ignore_ascii_case("a") || tag.eq_ignore_ascii_case("area") => {
                self.attribute("href")
            }
            _ => None,
        }
    }

    fn parent(&self) -> Option<Arc<dyn Element>> {
        self.parent.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_state_runs_interceptions_after_location_update() {
        let page = Arc::new(MemoryPage::new("https://example.com/").unwrap());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let observer = Arc::clone(&page);
        let sink = Arc::clone(&seen);
        let id = page
            .intercept(Arc::new(move || sink.lock().push(observer.current_path())))
            .unwrap();

        page.push_state("/pricing");
        assert_eq!(*seen.lock(), vec!["/pricing".to_string()]);

        page.release(id);
        page.push_state("/about");
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn ready_handlers_wait_for_loading_to_finish() {
        let page = MemoryPage::new("https://example.com/").unwrap().loading();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        page.on_ready(Arc::new(move || flag.store(true, Ordering::SeqCst)));

        assert!(!fired.load(Ordering::SeqCst));
        page.finish_loading();
        assert!(fired.load(Ordering::SeqCst));
    }

    #[test]
    fn only_anchors_expose_href() {
        let div = MemoryElement::new("div").attr("href", "https://x.io");
        assert_eq!(div.href(), None);

        let link = MemoryElement::anchor("https://x.io/a");
        assert_eq!(link.href().as_deref(), Some("https://x.io/a"));
    }

    #[test]
    fn without_history_refuses_interception() {
        let page = MemoryPage::new("https://example.com/").unwrap().without_history();
        assert!(page.intercept(Arc::new(|| {})).is_none());
    }
}

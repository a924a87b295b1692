//! Host page capabilities
//!
//! The tracker never touches a concrete browser. Everything it needs from the
//! page (location, title, click listeners, history interception) is reached
//! through the traits in this module, so the same capture logic runs against
//! a real page binding or the in-memory [`memory::MemoryPage`].

pub mod memory;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use url::Url;

/// Opaque handle returned when registering a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Opaque handle for an installed history interception.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InterceptId(pub u64);

/// Callback invoked for document level click and auxclick events.
pub type ClickHandler = Arc<dyn Fn(&ClickEvent) + Send + Sync>;

/// Callback invoked on route changes, interceptions and document readiness.
pub type RouteHandler = Arc<dyn Fn() + Send + Sync>;

/// A DOM element as seen by the link interceptor.
pub trait Element: Send + Sync {
    /// Tag name, if the node is an element at all.
    fn tag_name(&self) -> Option<String>;

    fn attribute(&self, name: &str) -> Option<String>;

    /// All attribute names in document order.
    fn attribute_names(&self) -> Vec<String>;

    /// Resolved absolute `href` for anchor-like elements.
    fn href(&self) -> Option<String>;

    fn parent(&self) -> Option<Arc<dyn Element>>;
}

/// Read access to the document plus document level click listeners.
pub trait Document: Send + Sync {
    /// Current page location.
    fn location(&self) -> Url;

    fn title(&self) -> String;

    fn referrer(&self) -> String;

    /// Screen width and height in pixels.
    fn screen(&self) -> (u32, u32);

    /// Whether a global with the given name is defined on the page.
    fn has_global(&self, name: &str) -> bool;

    fn add_click_listener(&self, handler: ClickHandler) -> ListenerId;

    fn remove_click_listener(&self, id: ListenerId);
}

/// The page's navigation entry points.
pub trait NavigationContext: Send + Sync {
    /// Path component of the current location.
    fn current_path(&self) -> String;

    /// Perform a full navigation to `url`.
    fn navigate(&self, url: &str);

    /// Listen for user initiated back/forward navigation.
    fn on_route_change(&self, handler: RouteHandler) -> ListenerId;

    fn remove_route_listener(&self, id: ListenerId);

    /// Wrap the programmatic navigation entry point so `handler` runs after
    /// every programmatic navigation. Returns `None` when the page has no
    /// programmatic history API.
    fn intercept(&self, handler: RouteHandler) -> Option<InterceptId>;

    /// Restore the entry point wrapped by [`NavigationContext::intercept`].
    fn release(&self, id: InterceptId);

    /// Whether the document body is available.
    fn is_ready(&self) -> bool;

    /// Run `handler` once the document becomes ready.
    fn on_ready(&self, handler: RouteHandler);
}

/// Everything the tracker needs from a page.
pub trait Host: Document + NavigationContext {}

impl<T: Document + NavigationContext + ?Sized> Host for T {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickKind {
    Click,
    AuxClick,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Primary,
    Middle,
    Secondary,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
}

impl Modifiers {
    pub fn any(&self) -> bool {
        self.ctrl || self.meta || self.shift
    }
}

/// A click or auxclick dispatched on the document.
pub struct ClickEvent {
    pub kind: ClickKind,
    pub button: MouseButton,
    pub modifiers: Modifiers,
    pub target: Option<Arc<dyn Element>>,
    default_prevented: AtomicBool,
}

impl ClickEvent {
    pub fn new(kind: ClickKind, button: MouseButton, target: Arc<dyn Element>) -> Self {
        Self {
            kind,
            button,
            modifiers: Modifiers::default(),
            target: Some(target),
            default_prevented: AtomicBool::new(false),
        }
    }

    /// Plain primary-button click.
    pub fn click(target: Arc<dyn Element>) -> Self {
        Self::new(ClickKind::Click, MouseButton::Primary, target)
    }

    /// Middle-button auxclick.
    pub fn middle_click(target: Arc<dyn Element>) -> Self {
        Self::new(ClickKind::AuxClick, MouseButton::Middle, target)
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn is_primary_click(&self) -> bool {
        self.kind == ClickKind::Click
    }

    pub fn is_middle_click(&self) -> bool {
        self.kind == ClickKind::AuxClick && self.button == MouseButton::Middle
    }

    /// Cancel the browser's default action for this event.
    pub fn prevent_default(&self) {
        self.default_prevented.store(true, Ordering::SeqCst);
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for ClickEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClickEvent")
            .field("kind", &self.kind)
            .field("button", &self.button)
            .field("modifiers", &self.modifiers)
            .field("default_prevented", &self.default_prevented())
            .finish()
    }
}

/// `host` as the browser reports it: hostname plus any non-default port.
pub fn host_of(url: &Url) -> Option<String> {
    let hostname = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{hostname}:{port}"),
        None => hostname.to_string(),
    })
}

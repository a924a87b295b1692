//! Single-page-application route change watcher
//!
//! Arms itself on the page's programmatic navigation entry point and on
//! back/forward navigation, and records a pageview whenever the path
//! changes. Triggers are deferred to the next scheduler turn so the new
//! location is observable when the path is read.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::debug;

use crate::beacon::{Beacon, Dispatch};
use crate::dom::{InterceptId, ListenerId, NavigationContext, RouteHandler};
use crate::payload::{Meta, PAGEVIEW};
use crate::teardown::Teardown;

#[derive(Clone)]
pub struct NavigationWatcher {
    inner: Arc<WatcherInner>,
}

struct WatcherInner {
    beacon: Beacon,
    hash: bool,
    state: Mutex<WatcherState>,
    last_page: Mutex<Option<String>>,
}

enum WatcherState {
    Idle,
    Armed(Armed),
}

struct Armed {
    intercept: Option<InterceptId>,
    listener: ListenerId,
    teardown: Teardown,
}

impl NavigationWatcher {
    pub fn new(beacon: Beacon) -> Self {
        let hash = beacon.config().hash;
        Self {
            inner: Arc::new(WatcherInner {
                beacon,
                hash,
                state: Mutex::new(WatcherState::Idle),
                last_page: Mutex::new(None),
            }),
        }
    }

    pub fn is_armed(&self) -> bool {
        self.inner.is_armed()
    }

    /// Idle → Armed. Enabling an armed watcher hands back the teardown of
    /// the existing arming instead of wrapping the entry point twice.
    pub fn enable(&self) -> Teardown {
        let host = Arc::clone(self.inner.beacon.host());

        let teardown = {
            let mut state = self.inner.state.lock();
            if let WatcherState::Armed(armed) = &*state {
                return armed.teardown.clone();
            }

            let scheduled = self.scheduled_trigger();
            let intercept = host.intercept(Arc::clone(&scheduled));
            if intercept.is_none() {
                debug!("Programmatic history unavailable, watching back/forward only");
            }
            let listener = host.on_route_change(scheduled);

            let weak = Arc::downgrade(&self.inner);
            let teardown = Teardown::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.disarm();
                }
            });

            *state = WatcherState::Armed(Armed {
                intercept,
                listener,
                teardown: teardown.clone(),
            });
            teardown
        };

        if host.is_ready() {
            self.inner.trigger();
        } else {
            let weak = Arc::downgrade(&self.inner);
            host.on_ready(Arc::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.trigger_if_armed();
                }
            }));
        }

        teardown
    }

    /// Record a pageview unless the path is unchanged and hash mode is off.
    /// Returns `None` for a deduplicated trigger.
    pub fn trigger(&self) -> Option<Dispatch> {
        self.inner.trigger()
    }

    fn scheduled_trigger(&self) -> RouteHandler {
        let weak: Weak<WatcherInner> = Arc::downgrade(&self.inner);
        let runtime = self.inner.beacon.runtime().clone();
        Arc::new(move || {
            let weak = weak.clone();
            runtime.spawn(async move {
                tokio::task::yield_now().await;
                if let Some(inner) = weak.upgrade() {
                    inner.trigger_if_armed();
                }
            });
        })
    }
}

impl WatcherInner {
    fn is_armed(&self) -> bool {
        matches!(*self.state.lock(), WatcherState::Armed(_))
    }

    fn trigger_if_armed(&self) {
        if self.is_armed() {
            self.trigger();
        }
    }

    fn trigger(&self) -> Option<Dispatch> {
        let path = self.beacon.host().current_path();
        {
            let mut last_page = self.last_page.lock();
            if !self.hash && last_page.as_deref() == Some(path.as_str()) {
                debug!(path = %path, "Skipping repeated pageview");
                return None;
            }
            *last_page = Some(path);
        }
        Some(self.beacon.record(Some(PAGEVIEW), Meta::new(), None))
    }

    fn disarm(&self) {
        let previous = std::mem::replace(&mut *self.state.lock(), WatcherState::Idle);
        if let WatcherState::Armed(armed) = previous {
            let host = self.beacon.host();
            if let Some(id) = armed.intercept {
                host.release(id);
            }
            host.remove_route_listener(armed.listener);
            debug!("Navigation watcher disarmed");
        }
    }
}

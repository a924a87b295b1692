use std::sync::Arc;

use parking_lot::Mutex;

type Action = Box<dyn FnOnce() + Send + 'static>;

/// Disposer returned by every feature enabler. Clones share the same action,
/// which runs at most once no matter how often `dispose` is called.
#[derive(Clone)]
pub struct Teardown {
    action: Arc<Mutex<Option<Action>>>,
}

impl Teardown {
    pub fn new(action: impl FnOnce() + Send + 'static) -> Self {
        Self {
            action: Arc::new(Mutex::new(Some(Box::new(action)))),
        }
    }

    pub fn dispose(&self) {
        // Release the lock before running the action.
        let action = self.action.lock().take();
        if let Some(action) = action {
            action();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.action.lock().is_none()
    }
}

impl std::fmt::Debug for Teardown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Teardown")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

//! Observer sinks and the registry that fans events out to them.

use std::sync::{Arc, PoisonError, RwLock};

use super::MonitorEvent;

/// Observer receives monitor events. Called from coordinator workers, so it
/// must not block; hand slow work off to a task.
pub trait Observer: Send + Sync {
    fn notify(&self, event: MonitorEvent);
}

impl<F> Observer for F
where
    F: Fn(MonitorEvent) + Send + Sync,
{
    fn notify(&self, event: MonitorEvent) {
        self(event)
    }
}

/// ObserverRegistry forwards every event to every registered observer, once.
///
/// Forwarding works on a snapshot of the list, so observers may be registered
/// or cleared while an event is being delivered.
#[derive(Default)]
pub struct ObserverRegistry {
    observers: RwLock<Vec<Arc<dyn Observer>>>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an observer. Returns false if this exact observer is already
    /// registered.
    pub fn register(&self, observer: Arc<dyn Observer>) -> bool {
        let mut observers = self.observers.write().unwrap_or_else(PoisonError::into_inner);
        if observers.iter().any(|o| same_observer(o, &observer)) {
            return false;
        }
        observers.push(observer);
        true
    }

    /// Removes all observers.
    pub fn clear(&self) {
        self.observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self) -> Vec<Arc<dyn Observer>> {
        self.observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Observer for ObserverRegistry {
    fn notify(&self, event: MonitorEvent) {
        let observers = self.snapshot();
        let Some((last, rest)) = observers.split_last() else {
            return;
        };
        for observer in rest {
            observer.notify(event.clone());
        }
        last.notify(event);
    }
}

/// Compares observers by allocation, ignoring vtable identity.
fn same_observer(a: &Arc<dyn Observer>, b: &Arc<dyn Observer>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

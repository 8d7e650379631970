//! Scoped fan-out of [`AppEvent`]s.
//!
//! [`EventBus`] is an [`EventSink`] that forwards every event to the
//! handlers registered through [`EventBus::subscribe`].  The returned
//! [`Subscription`] is a guard: dropping it unregisters the handler, so a
//! UI screen or metrics exporter cannot leak a listener past its lifetime.
//!
//! Single-threaded.  Handlers may drop subscriptions or subscribe new
//! handlers while an event is being delivered; additions take effect from
//! the next event.

use core::cell::{Cell, RefCell};
use std::rc::Rc;

use super::events::AppEvent;
use super::ports::EventSink;

type Handler = Box<dyn FnMut(&AppEvent)>;

struct Entry {
    active: Rc<Cell<bool>>,
    handler: Handler,
}

#[derive(Clone, Default)]
pub struct EventBus {
    entries: Rc<RefCell<Vec<Entry>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "dropping the subscription unregisters the handler"]
    pub fn subscribe(&self, handler: impl FnMut(&AppEvent) + 'static) -> Subscription {
        let active = Rc::new(Cell::new(true));
        self.entries.borrow_mut().push(Entry {
            active: Rc::clone(&active),
            handler: Box::new(handler),
        });
        Subscription { active }
    }

    /// Live subscriber count.
    pub fn subscriber_count(&self) -> usize {
        self.entries
            .borrow()
            .iter()
            .filter(|e| e.active.get())
            .count()
    }
}

impl EventSink for EventBus {
    fn emit(&mut self, event: &AppEvent) {
        // Detach the list while handlers run so they can touch the bus.
        let mut delivering = core::mem::take(&mut *self.entries.borrow_mut());
        delivering.retain(|e| e.active.get());
        for entry in &mut delivering {
            if entry.active.get() {
                (entry.handler)(event);
            }
        }
        let mut slot = self.entries.borrow_mut();
        delivering.append(&mut slot);
        *slot = delivering;
    }
}

/// Registration guard returned by [`EventBus::subscribe`].
pub struct Subscription {
    active: Rc<Cell<bool>>,
}

impl Subscription {
    pub fn is_active(&self) -> bool {
        self.active.get()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.active.set(false);
    }
}

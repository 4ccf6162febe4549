//! Outbound engine notifications.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::properties::TextProperties;
use crate::style::Rgba;

/// Something the rest of the product may want to react to.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// The view background of a surface changed.
    BackgroundChanged(Rgba),
    DefaultTextPropertiesChanged(TextProperties),
    /// Editor format map keys that changed.
    FormatItemsChanged(Vec<String>),
    /// Classification types that changed.
    ClassificationFormatChanged(Vec<String>),
}

pub type EventListener = Rc<dyn Fn(&EngineEvent)>;

/// Token returned by [`EventHub::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Fan-out of [`EngineEvent`]s to listeners, in subscription order.
#[derive(Default)]
pub struct EventHub {
    listeners: RefCell<Vec<(ListenerId, EventListener)>>,
    next_id: Cell<u64>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: EventListener) -> ListenerId {
        let id = ListenerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.listeners.borrow_mut().push((id, listener));
        id
    }

    pub fn unsubscribe(&self, id: ListenerId) {
        self.listeners.borrow_mut().retain(|(existing, _)| *existing != id);
    }

    pub fn emit(&self, event: &EngineEvent) {
        let listeners: Vec<EventListener> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect();
        tracing::trace!(?event, listeners = listeners.len(), "emitting engine event");
        for listener in listeners {
            listener(event);
        }
    }
}

impl std::fmt::Debug for EventHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHub")
            .field("listeners", &self.listeners.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_reaches_listeners_in_order() {
        let hub = EventHub::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        for tag in ["first", "second"] {
            let seen = Rc::clone(&seen);
            hub.subscribe(Rc::new(move |event: &EngineEvent| {
                seen.borrow_mut().push((tag, event.clone()));
            }));
        }
        hub.emit(&EngineEvent::FormatItemsChanged(vec!["keyword".into()]));

        let seen = seen.borrow();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0, "first");
        assert_eq!(seen[1].0, "second");
    }

    #[test]
    fn test_listener_may_unsubscribe_itself() {
        let hub = Rc::new(EventHub::new());
        let calls = Rc::new(Cell::new(0));
        let id = Rc::new(Cell::new(None));

        let listener: EventListener = {
            let hub = Rc::downgrade(&hub);
            let calls = Rc::clone(&calls);
            let id = Rc::clone(&id);
            Rc::new(move |_: &EngineEvent| {
                calls.set(calls.get() + 1);
                if let (Some(hub), Some(id)) = (hub.upgrade(), id.get()) {
                    hub.unsubscribe(id);
                }
            })
        };
        id.set(Some(hub.subscribe(listener)));

        let event = EngineEvent::BackgroundChanged(Rgba::BLACK);
        hub.emit(&event);
        hub.emit(&event);
        assert_eq!(calls.get(), 1);
    }
}

//! Typed, zero-payload notification channels.
//!
//! Every entity in the tray (items, nodes, configs, the icon theme) exposes a
//! fixed set of named events through [`Signals`]. Handlers carry no payload;
//! a notification only means that re-querying the emitter may now return a
//! different value.
//!
//! Dispatch is synchronous and runs on the caller's stack. The handler list
//! is snapshotted before dispatch, so a handler may connect, disconnect or
//! emit (even on the same emitter) without deadlocking or invalidating the
//! ongoing dispatch.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// Token returned by [`Signals::connect`], used to disconnect later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

type Handler = Rc<dyn Fn()>;

struct Slot<E> {
    id: HandlerId,
    event: E,
    handler: Handler,
}

/// A set of named, zero-payload channels keyed by `E`.
pub struct Signals<E> {
    slots: RefCell<Vec<Slot<E>>>,
    next_id: Cell<u64>,
}

impl<E> Default for Signals<E> {
    fn default() -> Self {
        Self {
            slots: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
        }
    }
}

impl<E: fmt::Debug> fmt::Debug for Signals<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots = self.slots.borrow();
        f.debug_struct("Signals")
            .field("handlers", &slots.len())
            .finish()
    }
}

impl<E: Copy + PartialEq> Signals<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect `handler` to `event`. Handlers run in connection order.
    pub fn connect<F>(&self, event: E, handler: F) -> HandlerId
    where
        F: Fn() + 'static,
    {
        let id = HandlerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.slots.borrow_mut().push(Slot {
            id,
            event,
            handler: Rc::new(handler),
        });
        id
    }

    /// Disconnect a handler. Returns `false` if it was not connected.
    pub fn disconnect(&self, id: HandlerId) -> bool {
        let mut slots = self.slots.borrow_mut();
        let before = slots.len();
        slots.retain(|slot| slot.id != id);
        slots.len() != before
    }

    /// Drop every handler.
    pub fn disconnect_all(&self) {
        self.slots.borrow_mut().clear();
    }

    pub fn is_connected(&self, id: HandlerId) -> bool {
        self.slots.borrow().iter().any(|slot| slot.id == id)
    }

    pub fn handler_count(&self, event: E) -> usize {
        self.slots
            .borrow()
            .iter()
            .filter(|slot| slot.event == event)
            .count()
    }

    /// Invoke every handler connected to `event`.
    pub fn emit(&self, event: E) {
        let pending: Vec<(HandlerId, Handler)> = self
            .slots
            .borrow()
            .iter()
            .filter(|slot| slot.event == event)
            .map(|slot| (slot.id, Rc::clone(&slot.handler)))
            .collect();

        for (id, handler) in pending {
            // An earlier handler in this dispatch may have disconnected it.
            if self.is_connected(id) {
                handler();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Ev {
        A,
        B,
    }

    #[test]
    fn dispatches_in_connection_order_per_event() {
        let signals = Signals::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        for tag in ["first", "second"] {
            let log = Rc::clone(&log);
            signals.connect(Ev::A, move || log.borrow_mut().push(tag));
        }
        let other = Rc::clone(&log);
        signals.connect(Ev::B, move || other.borrow_mut().push("b"));

        signals.emit(Ev::A);
        assert_eq!(*log.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn disconnect_stops_delivery() {
        let signals = Signals::new();
        let hits = Rc::new(Cell::new(0));
        let counter = Rc::clone(&hits);
        let id = signals.connect(Ev::A, move || counter.set(counter.get() + 1));

        signals.emit(Ev::A);
        assert!(signals.disconnect(id));
        assert!(!signals.disconnect(id));
        signals.emit(Ev::A);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn handlers_may_emit_reentrantly() {
        let signals = Rc::new(Signals::new());
        let hits = Rc::new(Cell::new(0));

        let inner = Rc::clone(&signals);
        signals.connect(Ev::A, move || inner.emit(Ev::B));
        let counter = Rc::clone(&hits);
        signals.connect(Ev::B, move || counter.set(counter.get() + 1));

        signals.emit(Ev::A);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn handler_disconnected_mid_dispatch_is_skipped() {
        let signals = Rc::new(Signals::new());
        let hits = Rc::new(Cell::new(0));
        let victim = Rc::new(Cell::new(None));

        let inner = Rc::clone(&signals);
        let target = Rc::clone(&victim);
        signals.connect(Ev::A, move || {
            if let Some(id) = target.get() {
                inner.disconnect(id);
            }
        });
        let counter = Rc::clone(&hits);
        let id = signals.connect(Ev::A, move || counter.set(counter.get() + 1));
        victim.set(Some(id));

        signals.emit(Ev::A);
        assert_eq!(hits.get(), 0);
        assert_eq!(signals.handler_count(Ev::A), 1);
    }
}

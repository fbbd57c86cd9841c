//! A minimal single-threaded event emitter.
//!
//! Listeners run synchronously inside [`EventEmitter::emit`]. Emitting from
//! the code that constructs an emitter therefore happens before any caller
//! had a chance to subscribe; [`EventEmitter::emit_deferred`] moves the emit
//! into a microtask so listeners attached by the current synchronous code
//! still see it.
//!
//! # Examples
//!
//! ```
//! use event_loop::{EventEmitter, Scheduler};
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let mut scheduler = Scheduler::new();
//! let emitter: EventEmitter<()> = EventEmitter::new();
//! emitter.emit_deferred(&mut scheduler, "start", ());
//!
//! let started = Rc::new(Cell::new(false));
//! let s = started.clone();
//! emitter.on("start", move |_| s.set(true));
//!
//! scheduler.run_until_idle();
//! assert!(started.get());
//! ```

use crate::scheduler::Scheduler;
use crate::task_queue::TaskHandle;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Identifies a registered listener so it can be removed again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener<T> = Rc<dyn Fn(&T)>;

struct Registration<T> {
    id: ListenerId,
    once: bool,
    listener: Listener<T>,
}

struct Registry<T> {
    next_id: u64,
    events: HashMap<String, Vec<Registration<T>>>,
}

/// Named events with payloads of type `T`.
///
/// Cloning an emitter yields another handle to the same listener registry.
pub struct EventEmitter<T> {
    registry: Rc<RefCell<Registry<T>>>,
}

impl<T: 'static> EventEmitter<T> {
    /// Creates an emitter with no listeners.
    pub fn new() -> Self {
        Self {
            registry: Rc::new(RefCell::new(Registry {
                next_id: 0,
                events: HashMap::new(),
            })),
        }
    }

    /// Registers a listener for `event`.
    pub fn on<F>(&self, event: &str, listener: F) -> ListenerId
    where
        F: Fn(&T) + 'static,
    {
        self.register(event, Rc::new(listener), false)
    }

    /// Registers a listener that is removed after its first call.
    pub fn once<F>(&self, event: &str, listener: F) -> ListenerId
    where
        F: Fn(&T) + 'static,
    {
        self.register(event, Rc::new(listener), true)
    }

    /// Removes a listener. Returns whether it was registered.
    pub fn off(&self, event: &str, id: ListenerId) -> bool {
        let mut registry = self.registry.borrow_mut();
        let Some(listeners) = registry.events.get_mut(event) else {
            return false;
        };
        let before = listeners.len();
        listeners.retain(|registration| registration.id != id);
        listeners.len() != before
    }

    /// Number of listeners registered for `event`.
    pub fn listener_count(&self, event: &str) -> usize {
        self.registry
            .borrow()
            .events
            .get(event)
            .map_or(0, Vec::len)
    }

    /// Calls every listener of `event` in registration order.
    ///
    /// Returns `true` if at least one listener ran. Listeners may register or
    /// remove listeners; such changes apply from the next emit.
    pub fn emit(&self, event: &str, payload: &T) -> bool {
        let listeners: Vec<Listener<T>> = {
            let mut registry = self.registry.borrow_mut();
            let Some(registrations) = registry.events.get_mut(event) else {
                return false;
            };
            let snapshot = registrations
                .iter()
                .map(|registration| registration.listener.clone())
                .collect();
            registrations.retain(|registration| !registration.once);
            snapshot
        };

        for listener in &listeners {
            listener(payload);
        }
        !listeners.is_empty()
    }

    /// Emits `event` from a microtask instead of the current stack.
    pub fn emit_deferred(
        &self,
        scheduler: &mut Scheduler,
        event: impl Into<String>,
        payload: T,
    ) -> TaskHandle {
        let emitter = self.clone();
        let event = event.into();
        scheduler.schedule_microtask(move |_| {
            emitter.emit(&event, &payload);
        })
    }

    fn register(&self, event: &str, listener: Listener<T>, once: bool) -> ListenerId {
        let mut registry = self.registry.borrow_mut();
        let id = ListenerId(registry.next_id);
        registry.next_id += 1;
        registry
            .events
            .entry(event.to_string())
            .or_default()
            .push(Registration { id, once, listener });
        id
    }
}

impl<T> Clone for EventEmitter<T> {
    fn clone(&self) -> Self {
        Self {
            registry: Rc::clone(&self.registry),
        }
    }
}

impl<T: 'static> Default for EventEmitter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for EventEmitter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.registry.borrow();
        let mut events: Vec<_> = registry.events.keys().cloned().collect();
        events.sort();
        f.debug_struct("EventEmitter").field("events", &events).finish()
    }
}

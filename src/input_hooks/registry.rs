use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Subscriber callback. Returns `true` when it swallows the event.
pub type Handler<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Identity of one registration, returned by [`HandlerRegistry::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct Registration<E> {
    id: HandlerId,
    live: AtomicBool,
    handler: Handler<E>,
}

/// Ordered, thread-safe set of handlers.
///
/// Dispatch works on a snapshot so handlers may register or unregister
/// (themselves or others) while an event is being delivered. A handler removed
/// mid-dispatch is skipped from that point on; one added mid-dispatch starts
/// with the next event.
pub struct HandlerRegistry<E> {
    next_id: AtomicU64,
    entries: RwLock<Vec<Arc<Registration<E>>>>,
}

impl<E> Default for HandlerRegistry<E> {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            entries: RwLock::new(Vec::new()),
        }
    }
}

impl<E> HandlerRegistry<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.register_shared(Arc::new(handler))
    }

    /// Registers a handler the caller keeps its own reference to.
    pub fn register_shared(&self, handler: Handler<E>) -> HandlerId {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let registration = Arc::new(Registration {
            id,
            live: AtomicBool::new(true),
            handler,
        });
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(registration);
        id
    }

    /// Removes a registration. Returns `false` if `id` was not registered.
    pub fn unregister(&self, id: HandlerId) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        match entries.iter().position(|entry| entry.id == id) {
            Some(index) => {
                let removed = entries.remove(index);
                removed.live.store(false, Ordering::Release);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self) -> Vec<Arc<Registration<E>>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Delivers `event` in registration order until a handler swallows it.
    ///
    /// Returns the id of the swallowing handler, if any.
    pub fn dispatch(&self, event: &E) -> Option<HandlerId> {
        self.dispatch_while(event, || true)
    }

    /// Like [`dispatch`](Self::dispatch), but `active` is checked before each
    /// handler and delivery ends as soon as it returns `false`.
    pub fn dispatch_while<A>(&self, event: &E, active: A) -> Option<HandlerId>
    where
        A: Fn() -> bool,
    {
        for entry in self.snapshot() {
            if !active() {
                break;
            }
            if !entry.live.load(Ordering::Acquire) {
                continue;
            }
            if (entry.handler)(event) {
                return Some(entry.id);
            }
        }
        None
    }
}

impl<E> fmt::Debug for HandlerRegistry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.len())
            .finish()
    }
}

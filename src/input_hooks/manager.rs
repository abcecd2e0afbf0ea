use std::fmt;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{DecodeError, HookError};
use crate::input_hooks::native::{
    HookBinding, HookCallback, HookDecision, HookHandle, HookType, RawHookCall, HC_ACTION,
};
use crate::input_hooks::registry::{Handler, HandlerId, HandlerRegistry};

/// One family of global hook: which OS hook to install and how to decode it.
pub trait HookKind: Send + Sync + 'static {
    type Event: fmt::Debug + Send + Sync + 'static;

    const HOOK_TYPE: HookType;

    fn decode(call: &RawHookCall<'_>) -> Result<Self::Event, DecodeError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookState {
    Uninstalled,
    Installed,
}

/// Dispatch counters, cumulative over every installation of a manager.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HookStats {
    /// Action invocations received while the hook was live.
    pub seen: u64,
    /// Events decoded and offered to the handlers.
    pub delivered: u64,
    /// Events a handler swallowed.
    pub swallowed: u64,
    /// Decode failures and handler panics caught at the callback boundary.
    pub faults: u64,
}

#[derive(Debug, Default)]
struct Counters {
    seen: AtomicU64,
    delivered: AtomicU64,
    swallowed: AtomicU64,
    faults: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> HookStats {
        HookStats {
            seen: self.seen.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            swallowed: self.swallowed.load(Ordering::Relaxed),
            faults: self.faults.load(Ordering::Relaxed),
        }
    }
}

/// Callback target handed to the binding for one installation.
///
/// A fresh trampoline is built for every install and retired before the
/// matching uninstall, so a late OS invocation never reaches the handlers of a
/// disabled hook.
struct Trampoline<K: HookKind> {
    registry: Arc<HandlerRegistry<K::Event>>,
    counters: Arc<Counters>,
    live: AtomicBool,
    _kind: PhantomData<fn() -> K>,
}

impl<K: HookKind> Trampoline<K> {
    fn retire(&self) {
        self.live.store(false, Ordering::Release);
    }

    fn decode_and_dispatch(&self, call: &RawHookCall<'_>) -> HookDecision {
        let event = match K::decode(call) {
            Ok(event) => event,
            Err(DecodeError::UnknownMessage(message)) => {
                tracing::trace!(hook_type = %K::HOOK_TYPE, message_id = message, "passing through unknown message");
                return HookDecision::CallNext;
            }
            Err(err) => {
                self.counters.faults.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(hook_type = %K::HOOK_TYPE, %err, "failed to decode hook event");
                return HookDecision::CallNext;
            }
        };

        self.counters.delivered.fetch_add(1, Ordering::Relaxed);
        // Retiring mid-event stops delivery before the next handler.
        let decision = self
            .registry
            .dispatch_while(&event, || self.live.load(Ordering::Acquire));
        match decision {
            Some(handler) => {
                self.counters.swallowed.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(hook_type = %K::HOOK_TYPE, %handler, ?event, "event swallowed");
                HookDecision::Swallow
            }
            None => HookDecision::CallNext,
        }
    }
}

impl<K: HookKind> HookCallback for Trampoline<K> {
    fn on_hook(&self, call: &RawHookCall<'_>) -> HookDecision {
        if call.code() != HC_ACTION || !self.live.load(Ordering::Acquire) {
            return HookDecision::CallNext;
        }
        self.counters.seen.fetch_add(1, Ordering::Relaxed);

        // Nothing may unwind into the OS.
        match panic::catch_unwind(AssertUnwindSafe(|| self.decode_and_dispatch(call))) {
            Ok(decision) => decision,
            Err(payload) => {
                self.counters.faults.fetch_add(1, Ordering::Relaxed);
                let panic_message = if let Some(message) = payload.downcast_ref::<&str>() {
                    (*message).to_string()
                } else if let Some(message) = payload.downcast_ref::<String>() {
                    message.clone()
                } else {
                    "unknown panic payload".to_string()
                };
                tracing::error!(hook_type = %K::HOOK_TYPE, panic_message, "hook handler panicked");
                HookDecision::CallNext
            }
        }
    }
}

/// Handle and trampoline of a live hook. They are created and released as a
/// pair, uninstall first.
struct Installation<K: HookKind> {
    handle: HookHandle,
    trampoline: Arc<Trampoline<K>>,
}

/// Install/uninstall state machine for one global hook plus its handlers.
///
/// Enable and disable are serialized by an internal lock that is never held
/// while events are dispatched. State queries do not take that lock, so a
/// handler may call them while another thread is mid-transition. Handlers may
/// be registered in any state and start receiving events once the hook is
/// enabled.
pub struct HookManager<K: HookKind> {
    binding: Arc<dyn HookBinding>,
    registry: Arc<HandlerRegistry<K::Event>>,
    counters: Arc<Counters>,
    installation: Mutex<Option<Installation<K>>>,
    /// Raw handle of the current installation, 0 when uninstalled.
    current: AtomicU64,
}

impl<K: HookKind> HookManager<K> {
    pub fn new(binding: Arc<dyn HookBinding>) -> Self {
        Self {
            binding,
            registry: Arc::new(HandlerRegistry::new()),
            counters: Arc::new(Counters::default()),
            installation: Mutex::new(None),
            current: AtomicU64::new(0),
        }
    }

    pub fn hook_type(&self) -> HookType {
        K::HOOK_TYPE
    }

    /// Installs the hook. A no-op if it is already installed.
    pub fn enable_hook(&self) -> Result<(), HookError> {
        let mut installation = self
            .installation
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if installation.is_some() {
            return Ok(());
        }

        tracing::debug!(hook_type = %K::HOOK_TYPE, "enabling hook");

        let trampoline = Arc::new(Trampoline::<K> {
            registry: Arc::clone(&self.registry),
            counters: Arc::clone(&self.counters),
            live: AtomicBool::new(true),
            _kind: PhantomData,
        });
        let callback: Arc<dyn HookCallback> = trampoline.clone();

        match self.binding.install(K::HOOK_TYPE, callback) {
            Ok(handle) => {
                self.current.store(handle.raw(), Ordering::Release);
                *installation = Some(Installation { handle, trampoline });
                Ok(())
            }
            Err(err) => {
                trampoline.retire();
                tracing::warn!(hook_type = %K::HOOK_TYPE, code = err.code, "installing hook failed");
                Err(HookError::Install {
                    hook_type: K::HOOK_TYPE,
                    code: err.code,
                })
            }
        }
    }

    /// Removes the hook. A no-op if it is not installed.
    ///
    /// The manager ends up uninstalled even when the OS reports a failure; the
    /// error is returned for the caller to report.
    pub fn disable_hook(&self) -> Result<(), HookError> {
        // Also covers a handler disabling its own hook while another thread
        // already holds the lock for the same removal.
        if self.current.load(Ordering::Acquire) == 0 {
            return Ok(());
        }

        let mut installation = self
            .installation
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(Installation { handle, trampoline }) = installation.take() else {
            return Ok(());
        };

        tracing::debug!(hook_type = %K::HOOK_TYPE, "disabling hook");

        self.current.store(0, Ordering::Release);
        trampoline.retire();
        let result = self.binding.uninstall(handle);
        drop(trampoline);

        result.map_err(|err| {
            tracing::warn!(hook_type = %K::HOOK_TYPE, code = err.code, "removing hook failed");
            HookError::Uninstall {
                hook_type: K::HOOK_TYPE,
                code: err.code,
            }
        })
    }

    pub fn register_handler<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&K::Event) -> bool + Send + Sync + 'static,
    {
        self.registry.register(handler)
    }

    pub fn register_shared_handler(&self, handler: Handler<K::Event>) -> HandlerId {
        self.registry.register_shared(handler)
    }

    pub fn unregister_handler(&self, id: HandlerId) -> bool {
        self.registry.unregister(id)
    }

    pub fn handler_count(&self) -> usize {
        self.registry.len()
    }

    pub fn state(&self) -> HookState {
        if self.handle().is_some() {
            HookState::Installed
        } else {
            HookState::Uninstalled
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.state() == HookState::Installed
    }

    pub fn handle(&self) -> Option<HookHandle> {
        match self.current.load(Ordering::Acquire) {
            0 => None,
            raw => Some(HookHandle::new(raw)),
        }
    }

    pub fn stats(&self) -> HookStats {
        self.counters.snapshot()
    }
}

impl<K: HookKind> Drop for HookManager<K> {
    fn drop(&mut self) {
        let _ = self.disable_hook();
    }
}

impl<K: HookKind> fmt::Debug for HookManager<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookManager")
            .field("hook_type", &K::HOOK_TYPE)
            .field("state", &self.state())
            .field("handlers", &self.registry.len())
            .finish()
    }
}

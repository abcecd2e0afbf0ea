use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::input_hooks::native::{
    BindingError, HookBinding, HookCallback, HookDecision, HookHandle, HookType, KeyboardHookData,
    MouseHookData, RawHookCall,
};

/// In-process stand-in for the OS hook API.
///
/// Installed callbacks are kept the way the OS would keep them, and
/// [`MockHookHandle`] plays the OS side: it fires events and can make the next
/// install or uninstall fail.
#[derive(Clone)]
pub struct MockHookBinding {
    state: Arc<MockHookState>,
}

type UninstallHook = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct MockHookState {
    install_count: AtomicUsize,
    uninstall_count: AtomicUsize,
    next_handle: AtomicU64,
    installed: Mutex<HashMap<HookHandle, (HookType, Arc<dyn HookCallback>)>>,
    fail_install: Mutex<Option<u32>>,
    fail_uninstall: Mutex<Option<u32>>,
    before_uninstall: Mutex<Option<UninstallHook>>,
}

impl MockHookBinding {
    pub fn new() -> (Self, MockHookHandle) {
        let state = Arc::new(MockHookState::default());
        (
            Self {
                state: Arc::clone(&state),
            },
            MockHookHandle { state },
        )
    }
}

impl HookBinding for MockHookBinding {
    fn install(
        &self,
        hook_type: HookType,
        callback: Arc<dyn HookCallback>,
    ) -> Result<HookHandle, BindingError> {
        if let Some(code) = self
            .state
            .fail_install
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            return Err(BindingError::new(code));
        }

        let handle = HookHandle::new(self.state.next_handle.fetch_add(1, Ordering::SeqCst) + 1);
        self.state
            .installed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(handle, (hook_type, callback));
        self.state.install_count.fetch_add(1, Ordering::SeqCst);
        Ok(handle)
    }

    fn uninstall(&self, handle: HookHandle) -> Result<(), BindingError> {
        self.state.uninstall_count.fetch_add(1, Ordering::SeqCst);
        let before = self
            .state
            .before_uninstall
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(before) = before {
            before();
        }

        if let Some(code) = self
            .state
            .fail_uninstall
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            return Err(BindingError::new(code));
        }

        match self
            .state
            .installed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&handle)
        {
            Some(_) => Ok(()),
            // ERROR_INVALID_HOOK_HANDLE
            None => Err(BindingError::new(1404)),
        }
    }
}

#[derive(Clone)]
pub struct MockHookHandle {
    state: Arc<MockHookState>,
}

impl MockHookHandle {
    pub fn install_count(&self) -> usize {
        self.state.install_count.load(Ordering::SeqCst)
    }

    pub fn uninstall_count(&self) -> usize {
        self.state.uninstall_count.load(Ordering::SeqCst)
    }

    /// Hooks currently held by the mock OS.
    pub fn installed_count(&self) -> usize {
        self.state
            .installed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_installed(&self, hook_type: HookType) -> bool {
        !self.callbacks(hook_type).is_empty()
    }

    /// Makes the next install fail with `code`.
    pub fn fail_next_install(&self, code: u32) {
        *self
            .state
            .fail_install
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(code);
    }

    /// Makes the next uninstall fail with `code`. The hook stays registered
    /// with the mock OS, as it would after a failed `UnhookWindowsHookEx`.
    pub fn fail_next_uninstall(&self, code: u32) {
        *self
            .state
            .fail_uninstall
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(code);
    }

    /// Runs `hook` inside the next uninstall, before the hook is removed.
    ///
    /// Stands in for a native uninstall that has to wait on the hook thread.
    pub fn on_next_uninstall<F>(&self, hook: F)
    where
        F: FnOnce() + Send + 'static,
    {
        *self
            .state
            .before_uninstall
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Box::new(hook));
    }

    fn callbacks(&self, hook_type: HookType) -> Vec<Arc<dyn HookCallback>> {
        let installed = self
            .state
            .installed
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut entries: Vec<_> = installed
            .iter()
            .filter(|(_, (kind, _))| *kind == hook_type)
            .map(|(handle, (_, callback))| (*handle, Arc::clone(callback)))
            .collect();
        entries.sort_by_key(|(handle, _)| handle.raw());
        // Newest hook first, like the native chain.
        entries
            .into_iter()
            .rev()
            .map(|(_, callback)| callback)
            .collect()
    }

    /// Runs `call` through the hook chain for its hook type.
    ///
    /// Returns `None` when no hook of that type is installed, i.e. the OS
    /// would not have invoked anything. The mock lock is released before any
    /// callback runs.
    pub fn fire(&self, call: &RawHookCall<'_>) -> Option<HookDecision> {
        let callbacks = self.callbacks(call.hook_type());
        if callbacks.is_empty() {
            return None;
        }
        for callback in callbacks {
            if callback.on_hook(call) == HookDecision::Swallow {
                return Some(HookDecision::Swallow);
            }
        }
        Some(HookDecision::CallNext)
    }

    pub fn fire_mouse(&self, message: u32, data: MouseHookData) -> Option<HookDecision> {
        self.fire(&RawHookCall::mouse(message, &data))
    }

    pub fn fire_keyboard(&self, message: u32, data: KeyboardHookData) -> Option<HookDecision> {
        self.fire(&RawHookCall::keyboard(message, &data))
    }
}

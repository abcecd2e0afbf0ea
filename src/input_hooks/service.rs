use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::error::HookError;
use crate::input_hooks::keyboard::KeyboardHookManager;
use crate::input_hooks::manager::{HookState, HookStats};
use crate::input_hooks::mouse::MouseHookManager;
use crate::input_hooks::native::HookBinding;
use crate::settings::HookSettings;

/// Binding for the current platform.
pub fn default_binding() -> Arc<dyn HookBinding> {
    #[cfg(windows)]
    {
        Arc::new(crate::input_hooks::win32::Win32HookBinding::new())
    }
    #[cfg(not(windows))]
    {
        Arc::new(crate::input_hooks::native::UnsupportedHookBinding)
    }
}

/// Snapshot of both hooks for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HookStatus {
    pub mouse: HookState,
    pub keyboard: HookState,
    pub mouse_handlers: usize,
    pub keyboard_handlers: usize,
    pub mouse_stats: HookStats,
    pub keyboard_stats: HookStats,
}

fn state_label(state: HookState) -> &'static str {
    match state {
        HookState::Installed => "installed",
        HookState::Uninstalled => "uninstalled",
    }
}

impl fmt::Display for HookStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "mouse: {} ({} handlers, {} events, {} swallowed), keyboard: {} ({} handlers, {} events, {} swallowed)",
            state_label(self.mouse),
            self.mouse_handlers,
            self.mouse_stats.delivered,
            self.mouse_stats.swallowed,
            state_label(self.keyboard),
            self.keyboard_handlers,
            self.keyboard_stats.delivered,
            self.keyboard_stats.swallowed,
        )
    }
}

/// The mouse and keyboard hooks of one process, sharing a binding.
#[derive(Debug)]
pub struct InputHooks {
    mouse: MouseHookManager,
    keyboard: KeyboardHookManager,
}

impl Default for InputHooks {
    fn default() -> Self {
        Self::new(default_binding())
    }
}

impl InputHooks {
    pub fn new(binding: Arc<dyn HookBinding>) -> Self {
        Self {
            mouse: MouseHookManager::new(Arc::clone(&binding)),
            keyboard: KeyboardHookManager::new(binding),
        }
    }

    pub fn mouse(&self) -> &MouseHookManager {
        &self.mouse
    }

    pub fn keyboard(&self) -> &KeyboardHookManager {
        &self.keyboard
    }

    /// Enables or disables each hook as configured.
    ///
    /// Both hooks are always processed; the first failure is returned.
    pub fn apply_settings(&self, settings: &HookSettings) -> Result<(), HookError> {
        let mouse = if settings.mouse_hook {
            self.mouse.enable_hook()
        } else {
            self.mouse.disable_hook()
        };
        let keyboard = if settings.keyboard_hook {
            self.keyboard.enable_hook()
        } else {
            self.keyboard.disable_hook()
        };
        mouse.and(keyboard)
    }

    /// Removes both hooks. Failures are logged by the managers.
    pub fn shutdown(&self) {
        let _ = self.mouse.disable_hook();
        let _ = self.keyboard.disable_hook();
    }

    pub fn status(&self) -> HookStatus {
        HookStatus {
            mouse: self.mouse.state(),
            keyboard: self.keyboard.state(),
            mouse_handlers: self.mouse.handler_count(),
            keyboard_handlers: self.keyboard.handler_count(),
            mouse_stats: self.mouse.stats(),
            keyboard_stats: self.keyboard.stats(),
        }
    }
}

static INPUT_HOOKS: OnceCell<InputHooks> = OnceCell::new();

/// Process-wide hooks over [`default_binding`], created on first use.
pub fn input_hooks() -> &'static InputHooks {
    INPUT_HOOKS.get_or_init(InputHooks::default)
}

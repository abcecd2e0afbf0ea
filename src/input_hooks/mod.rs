mod keyboard;
mod manager;
mod mock;
mod mouse;
pub mod native;
mod registry;
mod service;
#[cfg(windows)]
mod win32;

pub use keyboard::{KeyAction, Keyboard, KeyboardEvent, KeyboardHookManager};
pub use manager::{HookKind, HookManager, HookState, HookStats};
pub use mock::{MockHookBinding, MockHookHandle};
pub use mouse::{Mouse, MouseAction, MouseButton, MouseEvent, MouseHookManager};
pub use native::{
    BindingError, HookBinding, HookCallback, HookDecision, HookHandle, HookType,
    KeyboardHookData, MouseHookData, RawHookCall, UnsupportedHookBinding,
};
pub use registry::{Handler, HandlerId, HandlerRegistry};
pub use service::{default_binding, input_hooks, HookStatus, InputHooks};

#[cfg(windows)]
pub use win32::Win32HookBinding;

//! Contract between the hook managers and the platform hook API.
//!
//! The managers never talk to the OS directly. They hand a [`HookCallback`]
//! to a [`HookBinding`], which keeps it reachable for as long as the OS may
//! invoke it and translates [`HookDecision`] back into the native return
//! value.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use thiserror::Error;

/// `nCode` value for a hook invocation carrying an input event.
pub const HC_ACTION: i32 = 0;

pub const WM_KEYDOWN: u32 = 0x0100;
pub const WM_KEYUP: u32 = 0x0101;
pub const WM_SYSKEYDOWN: u32 = 0x0104;
pub const WM_SYSKEYUP: u32 = 0x0105;

pub const WM_MOUSEMOVE: u32 = 0x0200;
pub const WM_LBUTTONDOWN: u32 = 0x0201;
pub const WM_LBUTTONUP: u32 = 0x0202;
pub const WM_RBUTTONDOWN: u32 = 0x0204;
pub const WM_RBUTTONUP: u32 = 0x0205;
pub const WM_MBUTTONDOWN: u32 = 0x0207;
pub const WM_MBUTTONUP: u32 = 0x0208;
pub const WM_MOUSEWHEEL: u32 = 0x020A;
pub const WM_XBUTTONDOWN: u32 = 0x020B;
pub const WM_XBUTTONUP: u32 = 0x020C;
pub const WM_MOUSEHWHEEL: u32 = 0x020E;

pub const LLMHF_INJECTED: u32 = 0x0000_0001;
pub const LLMHF_LOWER_IL_INJECTED: u32 = 0x0000_0002;

pub const LLKHF_EXTENDED: u32 = 0x0000_0001;
pub const LLKHF_INJECTED: u32 = 0x0000_0010;
pub const LLKHF_ALTDOWN: u32 = 0x0000_0020;

/// Hook families this crate knows how to install.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookType {
    MouseLowLevel,
    KeyboardLowLevel,
}

impl HookType {
    /// Native `idHook` value (`WH_MOUSE_LL` / `WH_KEYBOARD_LL`).
    pub fn native_id(self) -> i32 {
        match self {
            HookType::MouseLowLevel => 14,
            HookType::KeyboardLowLevel => 13,
        }
    }
}

impl fmt::Display for HookType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookType::MouseLowLevel => write!(f, "mouse"),
            HookType::KeyboardLowLevel => write!(f, "keyboard"),
        }
    }
}

/// OS-issued identifier of an installed hook. Bindings never hand out 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookHandle(u64);

impl HookHandle {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// What the hook callback tells the OS to do with the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookDecision {
    /// Pass the event on with `CallNextHookEx`.
    CallNext,
    /// Return non-zero; the event never reaches the rest of the chain.
    Swallow,
}

/// Failure reported by a [`HookBinding`], with the platform error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("native hook call failed with code {code}")]
pub struct BindingError {
    pub code: u32,
}

impl BindingError {
    pub fn new(code: u32) -> Self {
        Self { code }
    }
}

/// Layout of `MSLLHOOKSTRUCT`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MouseHookData {
    pub x: i32,
    pub y: i32,
    pub mouse_data: u32,
    pub flags: u32,
    pub time: u32,
    pub extra_info: usize,
}

/// Layout of `KBDLLHOOKSTRUCT`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyboardHookData {
    pub vk_code: u32,
    pub scan_code: u32,
    pub flags: u32,
    pub time: u32,
    pub extra_info: usize,
}

/// Native structure delivered through `lParam` for a given hook type.
pub trait HookPayload: Copy {
    const HOOK_TYPE: HookType;
}

impl HookPayload for MouseHookData {
    const HOOK_TYPE: HookType = HookType::MouseLowLevel;
}

impl HookPayload for KeyboardHookData {
    const HOOK_TYPE: HookType = HookType::KeyboardLowLevel;
}

/// One invocation of a hook procedure: `(nCode, wParam, lParam)`.
///
/// The lifetime ties the call to the payload `lParam` points at, which the OS
/// only guarantees for the duration of the callback.
#[derive(Debug, Clone, Copy)]
pub struct RawHookCall<'a> {
    hook_type: HookType,
    code: i32,
    wparam: usize,
    lparam: isize,
    _payload: PhantomData<&'a ()>,
}

impl<'a> RawHookCall<'a> {
    /// Wraps the arguments the OS passed to a hook procedure.
    ///
    /// # Safety
    ///
    /// When `code` is [`HC_ACTION`], `lparam` must be null or point to the
    /// payload structure of `hook_type`, valid for `'a`.
    pub unsafe fn from_raw(hook_type: HookType, code: i32, wparam: usize, lparam: isize) -> Self {
        Self {
            hook_type,
            code,
            wparam,
            lparam,
            _payload: PhantomData,
        }
    }

    /// A mouse event as the OS would deliver it.
    pub fn mouse(message: u32, data: &'a MouseHookData) -> Self {
        Self::with_payload(message, data)
    }

    /// A keyboard event as the OS would deliver it.
    pub fn keyboard(message: u32, data: &'a KeyboardHookData) -> Self {
        Self::with_payload(message, data)
    }

    fn with_payload<T: HookPayload>(message: u32, data: &'a T) -> Self {
        Self {
            hook_type: T::HOOK_TYPE,
            code: HC_ACTION,
            wparam: message as usize,
            lparam: data as *const T as isize,
            _payload: PhantomData,
        }
    }

    pub fn hook_type(&self) -> HookType {
        self.hook_type
    }

    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn wparam(&self) -> usize {
        self.wparam
    }

    pub fn lparam(&self) -> isize {
        self.lparam
    }

    /// Window message identifier carried in `wParam`.
    pub fn message(&self) -> u32 {
        self.wparam as u32
    }

    /// Borrows the payload if it belongs to `T`'s hook type and is non-null.
    pub fn payload<T: HookPayload>(&self) -> Option<&'a T> {
        if self.hook_type != T::HOOK_TYPE || self.code != HC_ACTION {
            return None;
        }
        // SAFETY: the constructors guarantee a non-null lparam points to the
        // payload of `hook_type` for `'a`, and the hook type was checked above.
        unsafe { (self.lparam as *const T).as_ref() }
    }
}

/// Target the OS-facing trampoline forwards every hook invocation to.
pub trait HookCallback: Send + Sync {
    fn on_hook(&self, call: &RawHookCall<'_>) -> HookDecision;
}

/// Narrow interface over the platform hook API.
///
/// Implementations must keep the callback reachable until `uninstall` has
/// returned for the handle it was installed under.
pub trait HookBinding: Send + Sync {
    fn install(
        &self,
        hook_type: HookType,
        callback: Arc<dyn HookCallback>,
    ) -> Result<HookHandle, BindingError>;

    fn uninstall(&self, handle: HookHandle) -> Result<(), BindingError>;
}

/// Binding for platforms without a global hook API. Every install fails.
#[derive(Debug, Default)]
pub struct UnsupportedHookBinding;

/// `ERROR_CALL_NOT_IMPLEMENTED`
const ERROR_CALL_NOT_IMPLEMENTED: u32 = 120;

impl HookBinding for UnsupportedHookBinding {
    fn install(
        &self,
        hook_type: HookType,
        _callback: Arc<dyn HookCallback>,
    ) -> Result<HookHandle, BindingError> {
        tracing::debug!(%hook_type, "global hooks are not supported on this platform");
        Err(BindingError::new(ERROR_CALL_NOT_IMPLEMENTED))
    }

    fn uninstall(&self, _handle: HookHandle) -> Result<(), BindingError> {
        Ok(())
    }
}

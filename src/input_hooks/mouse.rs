use crate::error::DecodeError;
use crate::input_hooks::manager::{HookKind, HookManager};
use crate::input_hooks::native::{
    HookType, MouseHookData, RawHookCall, LLMHF_INJECTED, LLMHF_LOWER_IL_INJECTED,
    WM_LBUTTONDOWN, WM_LBUTTONUP, WM_MBUTTONDOWN, WM_MBUTTONUP, WM_MOUSEHWHEEL, WM_MOUSEMOVE,
    WM_MOUSEWHEEL, WM_RBUTTONDOWN, WM_RBUTTONUP, WM_XBUTTONDOWN, WM_XBUTTONUP,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    X1,
    X2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseAction {
    Move,
    ButtonDown(MouseButton),
    ButtonUp(MouseButton),
    /// Vertical wheel; positive is away from the user. Multiples of 120.
    Wheel(i16),
    /// Horizontal wheel; positive is to the right.
    HorizontalWheel(i16),
}

/// A system-wide mouse event in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MouseEvent {
    pub action: MouseAction,
    pub x: i32,
    pub y: i32,
    /// OS tick count in milliseconds.
    pub time: u32,
    /// Synthesised by `SendInput` or similar rather than a device.
    pub injected: bool,
    pub extra_info: usize,
}

impl MouseEvent {
    pub fn position(&self) -> (i32, i32) {
        (self.x, self.y)
    }
}

fn high_word(value: u32) -> i16 {
    (value >> 16) as u16 as i16
}

fn x_button(message: u32, mouse_data: u32) -> Result<MouseButton, DecodeError> {
    match high_word(mouse_data) {
        1 => Ok(MouseButton::X1),
        2 => Ok(MouseButton::X2),
        _ => Err(DecodeError::Malformed(message)),
    }
}

/// Low-level mouse hook (`WH_MOUSE_LL`).
#[derive(Debug)]
pub struct Mouse;

impl HookKind for Mouse {
    type Event = MouseEvent;

    const HOOK_TYPE: HookType = HookType::MouseLowLevel;

    fn decode(call: &RawHookCall<'_>) -> Result<MouseEvent, DecodeError> {
        let message = call.message();
        let data = call
            .payload::<MouseHookData>()
            .ok_or(DecodeError::MissingPayload)?;

        let action = match message {
            WM_MOUSEMOVE => MouseAction::Move,
            WM_LBUTTONDOWN => MouseAction::ButtonDown(MouseButton::Left),
            WM_LBUTTONUP => MouseAction::ButtonUp(MouseButton::Left),
            WM_RBUTTONDOWN => MouseAction::ButtonDown(MouseButton::Right),
            WM_RBUTTONUP => MouseAction::ButtonUp(MouseButton::Right),
            WM_MBUTTONDOWN => MouseAction::ButtonDown(MouseButton::Middle),
            WM_MBUTTONUP => MouseAction::ButtonUp(MouseButton::Middle),
            WM_XBUTTONDOWN => MouseAction::ButtonDown(x_button(message, data.mouse_data)?),
            WM_XBUTTONUP => MouseAction::ButtonUp(x_button(message, data.mouse_data)?),
            WM_MOUSEWHEEL => MouseAction::Wheel(high_word(data.mouse_data)),
            WM_MOUSEHWHEEL => MouseAction::HorizontalWheel(high_word(data.mouse_data)),
            other => return Err(DecodeError::UnknownMessage(other)),
        };

        Ok(MouseEvent {
            action,
            x: data.x,
            y: data.y,
            time: data.time,
            injected: data.flags & (LLMHF_INJECTED | LLMHF_LOWER_IL_INJECTED) != 0,
            extra_info: data.extra_info,
        })
    }
}

pub type MouseHookManager = HookManager<Mouse>;

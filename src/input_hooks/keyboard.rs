use crate::error::DecodeError;
use crate::input_hooks::manager::{HookKind, HookManager};
use crate::input_hooks::native::{
    HookType, KeyboardHookData, RawHookCall, LLKHF_ALTDOWN, LLKHF_EXTENDED, LLKHF_INJECTED,
    WM_KEYDOWN, WM_KEYUP, WM_SYSKEYDOWN, WM_SYSKEYUP,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Down,
    Up,
}

/// A system-wide key transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyboardEvent {
    pub action: KeyAction,
    /// Virtual-key code (`VK_*`).
    pub vk_code: u32,
    pub scan_code: u32,
    /// Delivered as `WM_SYSKEYDOWN`/`WM_SYSKEYUP` (Alt held or F10).
    pub system: bool,
    pub extended: bool,
    pub injected: bool,
    pub alt_down: bool,
    pub time: u32,
    pub extra_info: usize,
}

impl KeyboardEvent {
    pub fn is_down(&self) -> bool {
        self.action == KeyAction::Down
    }
}

/// Low-level keyboard hook (`WH_KEYBOARD_LL`).
#[derive(Debug)]
pub struct Keyboard;

impl HookKind for Keyboard {
    type Event = KeyboardEvent;

    const HOOK_TYPE: HookType = HookType::KeyboardLowLevel;

    fn decode(call: &RawHookCall<'_>) -> Result<KeyboardEvent, DecodeError> {
        let data = call
            .payload::<KeyboardHookData>()
            .ok_or(DecodeError::MissingPayload)?;

        let (action, system) = match call.message() {
            WM_KEYDOWN => (KeyAction::Down, false),
            WM_KEYUP => (KeyAction::Up, false),
            WM_SYSKEYDOWN => (KeyAction::Down, true),
            WM_SYSKEYUP => (KeyAction::Up, true),
            other => return Err(DecodeError::UnknownMessage(other)),
        };

        Ok(KeyboardEvent {
            action,
            vk_code: data.vk_code,
            scan_code: data.scan_code,
            system,
            extended: data.flags & LLKHF_EXTENDED != 0,
            injected: data.flags & LLKHF_INJECTED != 0,
            alt_down: data.flags & LLKHF_ALTDOWN != 0,
            time: data.time,
            extra_info: data.extra_info,
        })
    }
}

pub type KeyboardHookManager = HookManager<Keyboard>;

#[cfg(test)]
mod tests {
    use super::*;

    const VK_ESCAPE: u32 = 0x1B;

    #[test]
    fn decodes_key_down() {
        let data = KeyboardHookData {
            vk_code: VK_ESCAPE,
            scan_code: 1,
            time: 12,
            ..Default::default()
        };
        let event = Keyboard::decode(&RawHookCall::keyboard(WM_KEYDOWN, &data)).unwrap();

        assert!(event.is_down());
        assert_eq!(event.vk_code, VK_ESCAPE);
        assert_eq!(event.scan_code, 1);
        assert_eq!(event.time, 12);
        assert!(!event.system);
    }

    #[test]
    fn system_key_up_with_flags() {
        let data = KeyboardHookData {
            vk_code: 0x73,
            flags: LLKHF_ALTDOWN | LLKHF_EXTENDED | LLKHF_INJECTED,
            ..Default::default()
        };
        let event = Keyboard::decode(&RawHookCall::keyboard(WM_SYSKEYUP, &data)).unwrap();

        assert_eq!(event.action, KeyAction::Up);
        assert!(event.system);
        assert!(event.alt_down);
        assert!(event.extended);
        assert!(event.injected);
    }

    #[test]
    fn mouse_payload_is_rejected() {
        let data = crate::input_hooks::native::MouseHookData::default();
        assert_eq!(
            Keyboard::decode(&RawHookCall::mouse(WM_KEYDOWN, &data)),
            Err(DecodeError::MissingPayload)
        );
    }
}

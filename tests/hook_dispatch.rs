use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use overlay_input::input_hooks::native::{
    HC_ACTION, WM_KEYDOWN, WM_KEYUP, WM_MOUSEMOVE, WM_MOUSEWHEEL, WM_RBUTTONDOWN,
};
use overlay_input::input_hooks::{
    Handler, HandlerId, HookDecision, HookType, KeyAction, KeyboardEvent, KeyboardHookData,
    KeyboardHookManager, MockHookBinding, MockHookHandle, MouseAction, MouseButton, MouseEvent,
    MouseHookData, MouseHookManager, RawHookCall,
};

fn mouse_manager() -> (Arc<MouseHookManager>, MockHookHandle) {
    let (binding, handle) = MockHookBinding::new();
    (Arc::new(MouseHookManager::new(Arc::new(binding))), handle)
}

fn keyboard_manager() -> (KeyboardHookManager, MockHookHandle) {
    let (binding, handle) = MockHookBinding::new();
    (KeyboardHookManager::new(Arc::new(binding)), handle)
}

fn counter(manager: &MouseHookManager, swallow: bool) -> (HandlerId, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let id = {
        let calls = Arc::clone(&calls);
        manager.register_handler(move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            swallow
        })
    };
    (id, calls)
}

#[test]
fn every_handler_sees_every_event_in_order() {
    let (manager, os) = mouse_manager();
    let order = Arc::new(Mutex::new(Vec::new()));
    for tag in 0..3 {
        let order = Arc::clone(&order);
        manager.register_handler(move |_| {
            order.lock().unwrap().push(tag);
            false
        });
    }
    manager.enable_hook().unwrap();

    const N: usize = 5;
    for i in 0..N {
        let decision = os.fire_mouse(
            WM_MOUSEMOVE,
            MouseHookData {
                x: i as i32,
                ..Default::default()
            },
        );
        assert_eq!(decision, Some(HookDecision::CallNext));
    }

    let order = order.lock().unwrap();
    assert_eq!(order.len(), 3 * N);
    for chunk in order.chunks(3) {
        assert_eq!(chunk, [0, 1, 2]);
    }
    assert_eq!(manager.stats().delivered, N as u64);
    assert_eq!(manager.stats().swallowed, 0);
}

#[test]
fn swallowing_handler_stops_later_handlers() {
    let (manager, os) = mouse_manager();
    let (_, first) = counter(&manager, false);
    let (_, swallower) = counter(&manager, true);
    let (_, last) = counter(&manager, false);
    manager.enable_hook().unwrap();

    for _ in 0..4 {
        assert_eq!(
            os.fire_mouse(WM_RBUTTONDOWN, MouseHookData::default()),
            Some(HookDecision::Swallow)
        );
    }

    assert_eq!(first.load(Ordering::SeqCst), 4);
    assert_eq!(swallower.load(Ordering::SeqCst), 4);
    assert_eq!(last.load(Ordering::SeqCst), 0);
    assert_eq!(manager.stats().swallowed, 4);
}

#[test]
fn selective_swallow_only_blocks_matching_events() {
    let (manager, os) = keyboard_manager();
    let seen_by_second = Arc::new(AtomicUsize::new(0));
    manager.register_handler(|event: &KeyboardEvent| event.vk_code == 0x1B && event.is_down());
    {
        let seen = Arc::clone(&seen_by_second);
        manager.register_handler(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
            false
        });
    }
    manager.enable_hook().unwrap();

    let escape = KeyboardHookData {
        vk_code: 0x1B,
        ..Default::default()
    };
    let letter = KeyboardHookData {
        vk_code: 0x41,
        ..Default::default()
    };

    assert_eq!(os.fire_keyboard(WM_KEYDOWN, escape), Some(HookDecision::Swallow));
    assert_eq!(os.fire_keyboard(WM_KEYUP, escape), Some(HookDecision::CallNext));
    assert_eq!(os.fire_keyboard(WM_KEYDOWN, letter), Some(HookDecision::CallNext));
    assert_eq!(seen_by_second.load(Ordering::SeqCst), 2);
}

#[test]
fn unregistering_during_dispatch_stops_delivery() {
    let (manager, os) = mouse_manager();
    let victim: Arc<OnceLock<HandlerId>> = Arc::new(OnceLock::new());
    {
        let weak = Arc::downgrade(&manager);
        let victim = Arc::clone(&victim);
        manager.register_handler(move |_| {
            if let (Some(manager), Some(id)) = (weak.upgrade(), victim.get()) {
                manager.unregister_handler(*id);
            }
            false
        });
    }
    let (id, victim_calls) = counter(&manager, false);
    victim.set(id).unwrap();
    let (_, tail_calls) = counter(&manager, false);
    manager.enable_hook().unwrap();

    for _ in 0..3 {
        os.fire_mouse(WM_MOUSEMOVE, MouseHookData::default());
    }

    assert_eq!(victim_calls.load(Ordering::SeqCst), 0);
    assert_eq!(tail_calls.load(Ordering::SeqCst), 3);
    assert_eq!(manager.handler_count(), 2);
}

#[test]
fn handler_can_unregister_itself() {
    let (manager, os) = mouse_manager();
    let own_id: Arc<OnceLock<HandlerId>> = Arc::new(OnceLock::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let id = {
        let weak = Arc::downgrade(&manager);
        let own_id = Arc::clone(&own_id);
        let calls = Arc::clone(&calls);
        manager.register_handler(move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            if let (Some(manager), Some(id)) = (weak.upgrade(), own_id.get()) {
                manager.unregister_handler(*id);
            }
            false
        })
    };
    own_id.set(id).unwrap();
    manager.enable_hook().unwrap();

    os.fire_mouse(WM_MOUSEMOVE, MouseHookData::default());
    os.fire_mouse(WM_MOUSEMOVE, MouseHookData::default());

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(manager.handler_count(), 0);
}

#[test]
fn round_trip_preserves_fields_and_stops_after_disable() {
    let (manager, os) = mouse_manager();
    let received: Arc<Mutex<Vec<MouseEvent>>> = Arc::new(Mutex::new(Vec::new()));
    {
        let received = Arc::clone(&received);
        manager.register_handler(move |event| {
            received.lock().unwrap().push(*event);
            false
        });
    }
    manager.enable_hook().unwrap();

    os.fire_mouse(
        WM_MOUSEWHEEL,
        MouseHookData {
            x: 1913,
            y: -7,
            mouse_data: (-120_i16 as u16 as u32) << 16,
            flags: 0,
            time: 123_456,
            extra_info: 42,
        },
    );

    assert_eq!(
        *received.lock().unwrap(),
        vec![MouseEvent {
            action: MouseAction::Wheel(-120),
            x: 1913,
            y: -7,
            time: 123_456,
            injected: false,
            extra_info: 42,
        }]
    );

    manager.disable_hook().unwrap();
    assert_eq!(os.fire_mouse(WM_MOUSEMOVE, MouseHookData::default()), None);
    assert_eq!(received.lock().unwrap().len(), 1);
}

#[test]
fn keyboard_round_trip_preserves_key_codes() {
    let (manager, os) = keyboard_manager();
    let received: Arc<Mutex<Vec<KeyboardEvent>>> = Arc::new(Mutex::new(Vec::new()));
    {
        let received = Arc::clone(&received);
        manager.register_handler(move |event| {
            received.lock().unwrap().push(*event);
            false
        });
    }
    manager.enable_hook().unwrap();

    os.fire_keyboard(
        WM_KEYUP,
        KeyboardHookData {
            vk_code: 0x70,
            scan_code: 0x3B,
            flags: 0x80,
            time: 77,
            extra_info: 0,
        },
    );

    let received = received.lock().unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].action, KeyAction::Up);
    assert_eq!(received[0].vk_code, 0x70);
    assert_eq!(received[0].scan_code, 0x3B);
    assert_eq!(received[0].time, 77);
}

#[test]
fn stale_callback_is_inert_after_disable() {
    let (manager, os) = mouse_manager();
    let (_, calls) = counter(&manager, true);
    manager.enable_hook().unwrap();

    // Simulate the OS invoking a trampoline it still holds after removal.
    os.fail_next_uninstall(6);
    let _ = manager.disable_hook();

    assert_eq!(
        os.fire_mouse(WM_RBUTTONDOWN, MouseHookData::default()),
        Some(HookDecision::CallNext)
    );
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn panicking_handler_passes_event_through() {
    let (manager, os) = mouse_manager();
    manager.register_handler(|event: &MouseEvent| {
        if event.action == MouseAction::ButtonDown(MouseButton::Right) {
            panic!("handler failure");
        }
        false
    });
    let (_, after) = counter(&manager, false);
    manager.enable_hook().unwrap();

    assert_eq!(
        os.fire_mouse(WM_RBUTTONDOWN, MouseHookData::default()),
        Some(HookDecision::CallNext)
    );
    assert_eq!(manager.stats().faults, 1);

    // The hook keeps working for later events.
    os.fire_mouse(WM_MOUSEMOVE, MouseHookData::default());
    assert_eq!(after.load(Ordering::SeqCst), 1);
}

#[test]
fn malformed_calls_are_passed_through() {
    let (manager, os) = mouse_manager();
    let (_, calls) = counter(&manager, true);
    manager.enable_hook().unwrap();

    // Null payload.
    let null = unsafe { RawHookCall::from_raw(HookType::MouseLowLevel, HC_ACTION, 0x0200, 0) };
    assert_eq!(os.fire(&null), Some(HookDecision::CallNext));

    // Negative code must go straight to the next hook.
    let data = MouseHookData::default();
    let skip = unsafe {
        RawHookCall::from_raw(
            HookType::MouseLowLevel,
            -1,
            0x0200,
            &data as *const MouseHookData as isize,
        )
    };
    assert_eq!(os.fire(&skip), Some(HookDecision::CallNext));

    // Unknown message id.
    assert_eq!(
        os.fire_mouse(0x0209, MouseHookData::default()),
        Some(HookDecision::CallNext)
    );

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(manager.stats().faults, 1);
    assert_eq!(manager.stats().seen, 2);
}

#[test]
fn shared_handler_can_serve_two_managers() {
    let (binding, os) = MockHookBinding::new();
    let binding = Arc::new(binding);
    let first = KeyboardHookManager::new(binding.clone());
    let second = KeyboardHookManager::new(binding);
    let calls = Arc::new(AtomicUsize::new(0));
    let handler: Handler<KeyboardEvent> = {
        let calls = Arc::clone(&calls);
        Arc::new(move |_: &KeyboardEvent| {
            calls.fetch_add(1, Ordering::SeqCst);
            false
        })
    };

    first.register_shared_handler(Arc::clone(&handler));
    let id = second.register_shared_handler(handler);
    first.enable_hook().unwrap();
    os.fire_keyboard(WM_KEYDOWN, KeyboardHookData::default());
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    assert!(second.unregister_handler(id));
    assert_eq!(second.handler_count(), 0);
    assert_eq!(first.handler_count(), 1);
}

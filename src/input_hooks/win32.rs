//! `SetWindowsHookExW` binding.
//!
//! Low-level hooks are delivered through the message queue of the thread that
//! installed them, so every install gets its own thread that owns the hook and
//! pumps messages until it is told to quit.

use std::cell::Cell;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::JoinHandle;
use std::time::Duration;

use windows::Win32::Foundation::{GetLastError, LPARAM, LRESULT, WPARAM};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, DispatchMessageW, GetMessageW, PeekMessageW, PostThreadMessageW,
    SetWindowsHookExW, TranslateMessage, UnhookWindowsHookEx, HHOOK, HOOKPROC, MSG, PM_NOREMOVE,
    WINDOWS_HOOK_ID, WM_QUIT,
};

use crate::input_hooks::native::{
    BindingError, HookBinding, HookCallback, HookDecision, HookHandle, HookType, RawHookCall,
};

const ERROR_NOT_ENOUGH_MEMORY: u32 = 8;
const ERROR_ALREADY_EXISTS: u32 = 183;
const WAIT_TIMEOUT: u32 = 258;
const ERROR_INVALID_HOOK_HANDLE: u32 = 1404;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(2);

struct SlotEntry {
    owner: u64,
    callback: Arc<dyn HookCallback>,
}

type CallbackSlot = RwLock<Option<SlotEntry>>;

// Hook procedures carry no user data, so each hook type routes through a
// process-wide slot. A slot is filled before the hook exists and emptied once
// it has been removed or abandoned.
static MOUSE_SLOT: CallbackSlot = RwLock::new(None);
static KEYBOARD_SLOT: CallbackSlot = RwLock::new(None);

static NEXT_OWNER: AtomicU64 = AtomicU64::new(1);

thread_local! {
    // Slot owner of the hook installed by this thread. Low-level hooks are
    // called on the installing thread, so a hook proc only forwards to the
    // slot entry its own install created.
    static HOOK_OWNER: Cell<u64> = const { Cell::new(0) };
}

fn slot(hook_type: HookType) -> &'static CallbackSlot {
    match hook_type {
        HookType::MouseLowLevel => &MOUSE_SLOT,
        HookType::KeyboardLowLevel => &KEYBOARD_SLOT,
    }
}

fn release_slot(hook_type: HookType, owner: u64) {
    let mut current = slot(hook_type)
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    if current.as_ref().is_some_and(|entry| entry.owner == owner) {
        *current = None;
    }
}

unsafe extern "system" fn mouse_hook_proc(n_code: i32, w_param: WPARAM, l_param: LPARAM) -> LRESULT {
    forward(HookType::MouseLowLevel, n_code, w_param, l_param)
}

unsafe extern "system" fn keyboard_hook_proc(
    n_code: i32,
    w_param: WPARAM,
    l_param: LPARAM,
) -> LRESULT {
    forward(HookType::KeyboardLowLevel, n_code, w_param, l_param)
}

unsafe fn forward(hook_type: HookType, n_code: i32, w_param: WPARAM, l_param: LPARAM) -> LRESULT {
    if n_code >= 0 {
        let owner = HOOK_OWNER.with(Cell::get);
        // The clone keeps the callback alive for this invocation even if the
        // hook is being removed concurrently.
        let callback = slot(hook_type).try_read().ok().and_then(|guard| {
            guard
                .as_ref()
                .filter(|entry| entry.owner == owner)
                .map(|entry| Arc::clone(&entry.callback))
        });
        if let Some(callback) = callback {
            let call = RawHookCall::from_raw(hook_type, n_code, w_param.0, l_param.0);
            // Nothing may unwind into the OS.
            match panic::catch_unwind(AssertUnwindSafe(|| callback.on_hook(&call))) {
                Ok(HookDecision::Swallow) => return LRESULT(1),
                Ok(HookDecision::CallNext) => {}
                Err(_) => tracing::error!(%hook_type, "hook callback panicked"),
            }
        }
    }

    CallNextHookEx(HHOOK(std::ptr::null_mut()), n_code, w_param, l_param)
}

fn last_error() -> u32 {
    unsafe { GetLastError() }.0
}

fn win32_code(err: &windows::core::Error) -> u32 {
    let hresult = err.code().0 as u32;
    if hresult & 0xFFFF_0000 == 0x8007_0000 {
        hresult & 0xFFFF
    } else {
        hresult
    }
}

struct HookThread {
    hook_type: HookType,
    owner: u64,
    thread_id: u32,
    join: JoinHandle<()>,
    done_rx: Receiver<Result<(), u32>>,
}

fn run_hook_thread(
    hook_type: HookType,
    owner: u64,
    abandoned: Arc<AtomicBool>,
    ready_tx: SyncSender<Result<(u64, u32), u32>>,
    done_tx: SyncSender<Result<(), u32>>,
) {
    HOOK_OWNER.with(|cell| cell.set(owner));

    // Ensure the thread has a message queue before the hook is installed.
    let mut msg = MSG::default();
    unsafe {
        let _ = PeekMessageW(&mut msg, None, 0, 0, PM_NOREMOVE);
    }

    let thread_id = unsafe { GetCurrentThreadId() };
    let hmodule = match unsafe { GetModuleHandleW(None) } {
        Ok(h) => h,
        Err(err) => {
            let _ = ready_tx.send(Err(win32_code(&err)));
            return;
        }
    };

    let hook_proc: HOOKPROC = match hook_type {
        HookType::MouseLowLevel => Some(mouse_hook_proc),
        HookType::KeyboardLowLevel => Some(keyboard_hook_proc),
    };
    let id = WINDOWS_HOOK_ID(hook_type.native_id());

    let hook = match unsafe { SetWindowsHookExW(id, hook_proc, hmodule, 0) } {
        Ok(h) if !h.0.is_null() => h,
        Ok(_) => {
            let _ = ready_tx.send(Err(last_error()));
            return;
        }
        Err(err) => {
            let _ = ready_tx.send(Err(win32_code(&err)));
            return;
        }
    };

    let _ = ready_tx.send(Ok((hook.0 as usize as u64, thread_id)));

    // The installer gave up waiting: nobody owns this hook, remove it now.
    if !abandoned.load(Ordering::SeqCst) {
        loop {
            let r = unsafe { GetMessageW(&mut msg, None, 0, 0) };
            // 0 is WM_QUIT, -1 an error.
            if r.0 == 0 || r.0 == -1 {
                break;
            }
            unsafe {
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }
    }

    let result = unsafe { UnhookWindowsHookEx(hook) }.map_err(|err| win32_code(&err));
    if let Err(code) = result {
        tracing::warn!(%hook_type, code, "UnhookWindowsHookEx failed");
    }
    release_slot(hook_type, owner);
    let _ = done_tx.send(result);
}

/// Installs hooks with `SetWindowsHookExW`, one message-pump thread per hook.
///
/// At most one hook per [`HookType`] can be installed through this binding at
/// a time.
#[derive(Default)]
pub struct Win32HookBinding {
    threads: Mutex<HashMap<HookHandle, HookThread>>,
}

impl Win32HookBinding {
    pub fn new() -> Self {
        Self::default()
    }

    fn spawn(&self, hook_type: HookType, owner: u64) -> Result<HookHandle, BindingError> {
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);
        let (done_tx, done_rx) = mpsc::sync_channel(1);
        let abandoned = Arc::new(AtomicBool::new(false));

        let thread_abandoned = Arc::clone(&abandoned);
        let join = std::thread::Builder::new()
            .name(format!("{hook_type}-hook"))
            .spawn(move || {
                run_hook_thread(hook_type, owner, thread_abandoned, ready_tx, done_tx)
            })
            .map_err(|err| {
                tracing::error!(%hook_type, ?err, "failed to spawn hook thread");
                BindingError::new(ERROR_NOT_ENOUGH_MEMORY)
            })?;

        let (raw, thread_id) = match ready_rx.recv_timeout(HANDSHAKE_TIMEOUT) {
            Ok(Ok(ready)) => ready,
            Ok(Err(code)) => {
                let _ = join.join();
                return Err(BindingError::new(code));
            }
            Err(_) => {
                abandoned.store(true, Ordering::SeqCst);
                // The thread reports before it checks the flag, so a hook that
                // came up in between is visible here and is told to quit.
                if let Ok(Ok((_, thread_id))) = ready_rx.try_recv() {
                    let _ =
                        unsafe { PostThreadMessageW(thread_id, WM_QUIT, WPARAM(0), LPARAM(0)) };
                }
                tracing::error!(%hook_type, "hook thread did not signal readiness");
                return Err(BindingError::new(WAIT_TIMEOUT));
            }
        };

        let handle = HookHandle::new(raw);
        self.threads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                handle,
                HookThread {
                    hook_type,
                    owner,
                    thread_id,
                    join,
                    done_rx,
                },
            );
        Ok(handle)
    }
}

impl HookBinding for Win32HookBinding {
    fn install(
        &self,
        hook_type: HookType,
        callback: Arc<dyn HookCallback>,
    ) -> Result<HookHandle, BindingError> {
        let owner = NEXT_OWNER.fetch_add(1, Ordering::Relaxed);
        {
            let mut current = slot(hook_type)
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            if current.is_some() {
                return Err(BindingError::new(ERROR_ALREADY_EXISTS));
            }
            *current = Some(SlotEntry { owner, callback });
        }

        self.spawn(hook_type, owner)
            .inspect_err(|_| release_slot(hook_type, owner))
    }

    fn uninstall(&self, handle: HookHandle) -> Result<(), BindingError> {
        let thread = self
            .threads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&handle);
        let Some(thread) = thread else {
            return Err(BindingError::new(ERROR_INVALID_HOOK_HANDLE));
        };

        let posted =
            unsafe { PostThreadMessageW(thread.thread_id, WM_QUIT, WPARAM(0), LPARAM(0)) };
        let result = match posted {
            // Removal from a handler running on the hook thread: the pump
            // picks up WM_QUIT once the handler returns.
            Ok(()) if unsafe { GetCurrentThreadId() } == thread.thread_id => Ok(()),
            Ok(()) => match thread.done_rx.recv_timeout(HANDSHAKE_TIMEOUT) {
                Ok(result) => {
                    let _ = thread.join.join();
                    result.map_err(BindingError::new)
                }
                Err(_) => Err(BindingError::new(WAIT_TIMEOUT)),
            },
            Err(err) => Err(BindingError::new(win32_code(&err))),
        };

        release_slot(thread.hook_type, thread.owner);
        result
    }
}

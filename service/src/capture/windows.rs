//! Low-level keyboard hook backend.
//!
//! The hook runs on a dedicated thread with its own message loop. The hook
//! procedure only snapshots the key and hands it to the worker; translation
//! through the foreground layout happens on the worker via [`LayoutTranslator`].

use std::sync::mpsc::sync_channel;
use std::sync::Mutex;
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};
use windows::core::PCWSTR;
use windows::Win32::Foundation::{HINSTANCE, HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    GetAsyncKeyState, GetKeyState, GetKeyboardLayout, ToUnicodeEx,
};
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, DispatchMessageW, GetForegroundWindow, GetMessageW, GetWindowThreadProcessId,
    PostThreadMessageW, SetWindowsHookExW, TranslateMessage, UnhookWindowsHookEx, HHOOK,
    KBDLLHOOKSTRUCT, LLKHF_INJECTED, MSG, WH_KEYBOARD_LL, WM_KEYDOWN, WM_QUIT, WM_SYSKEYDOWN,
};

use super::{control_digit, CaptureError, KeyCaptureSource, KeySink, KeyTranslator, RawKey};

const VK_SHIFT: usize = 0x10;
const VK_CONTROL: usize = 0x11;
const VK_MENU: usize = 0x12;
const VK_CAPITAL: usize = 0x14;
const MODIFIERS: [usize; 9] = [VK_SHIFT, VK_CONTROL, VK_MENU, 0xA0, 0xA1, 0xA2, 0xA3, 0xA4, 0xA5];

static SINK: Mutex<Option<KeySink>> = Mutex::new(None);

fn key_state_snapshot() -> [u8; 256] {
    let mut state = [0u8; 256];
    for vk in MODIFIERS {
        // SAFETY: GetAsyncKeyState has no preconditions.
        if unsafe { GetAsyncKeyState(vk as i32) } < 0 {
            state[vk] = 0x80;
        }
    }
    // SAFETY: as above.
    if unsafe { GetKeyState(VK_CAPITAL as i32) } & 1 != 0 {
        state[VK_CAPITAL] |= 0x01;
    }
    state
}

unsafe extern "system" fn hook_proc(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    let message = wparam.0 as u32;
    if code >= 0 && (message == WM_KEYDOWN || message == WM_SYSKEYDOWN) {
        // SAFETY: for WH_KEYBOARD_LL, lparam points to a KBDLLHOOKSTRUCT.
        let info = unsafe { &*(lparam.0 as *const KBDLLHOOKSTRUCT) };
        if (info.flags & LLKHF_INJECTED).0 == 0 {
            let sink = SINK.lock().ok().and_then(|guard| guard.clone());
            if let Some(sink) = sink {
                let key_state = key_state_snapshot();
                let ctrl = key_state[VK_CONTROL] & 0x80 != 0;
                let digit = control_digit(info.vkCode, ctrl, sink.suggestions_showing());
                sink.push_raw(RawKey {
                    vk: info.vkCode,
                    scan: info.scanCode,
                    key_state,
                    control_digit: digit,
                });
                if digit.is_some() {
                    return LRESULT(1);
                }
            }
        }
    }
    // SAFETY: forwarding the untouched hook arguments.
    unsafe { CallNextHookEx(HHOOK::default(), code, wparam, lparam) }
}

/// Global `WH_KEYBOARD_LL` hook.
#[derive(Default)]
pub struct LowLevelHook {
    thread: Option<(u32, JoinHandle<()>)>,
}

impl LowLevelHook {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyCaptureSource for LowLevelHook {
    fn start(&mut self, sink: KeySink) -> Result<(), CaptureError> {
        if self.thread.is_some() {
            return Err(CaptureError::AlreadyRunning);
        }
        if let Ok(mut slot) = SINK.lock() {
            *slot = Some(sink);
        }

        let (ready_tx, ready_rx) = sync_channel::<Result<u32, String>>(1);
        let handle = thread::Builder::new()
            .name("keyboard-hook".into())
            .spawn(move || {
                // SAFETY: installing and removing the hook on this thread,
                // which pumps messages for its whole lifetime.
                unsafe {
                    let module = match GetModuleHandleW(PCWSTR::null()) {
                        Ok(m) => m,
                        Err(e) => {
                            let _ = ready_tx.send(Err(e.to_string()));
                            return;
                        }
                    };
                    let hook = match SetWindowsHookExW(
                        WH_KEYBOARD_LL,
                        Some(hook_proc),
                        HINSTANCE(module.0),
                        0,
                    ) {
                        Ok(h) => h,
                        Err(e) => {
                            let _ = ready_tx.send(Err(e.to_string()));
                            return;
                        }
                    };
                    let _ = ready_tx.send(Ok(GetCurrentThreadId()));

                    let mut msg = MSG::default();
                    while GetMessageW(&mut msg, HWND::default(), 0, 0).as_bool() {
                        let _ = TranslateMessage(&msg);
                        DispatchMessageW(&msg);
                    }
                    if let Err(e) = UnhookWindowsHookEx(hook) {
                        warn!(error = %e, "failed to remove keyboard hook");
                    }
                }
                debug!("keyboard hook thread exited");
            })?;

        match ready_rx.recv() {
            Ok(Ok(thread_id)) => {
                info!("keyboard hook installed");
                self.thread = Some((thread_id, handle));
                Ok(())
            }
            Ok(Err(reason)) => {
                let _ = handle.join();
                clear_sink();
                Err(CaptureError::HookInstall(reason))
            }
            Err(_) => {
                let _ = handle.join();
                clear_sink();
                Err(CaptureError::HookInstall("hook thread exited".into()))
            }
        }
    }

    fn stop(&mut self) {
        let Some((thread_id, handle)) = self.thread.take() else {
            return;
        };
        // SAFETY: posting to a thread we created; failure means it is gone.
        if let Err(e) = unsafe { PostThreadMessageW(thread_id, WM_QUIT, WPARAM(0), LPARAM(0)) } {
            warn!(error = %e, "failed to signal keyboard hook thread");
        }
        if handle.join().is_err() {
            warn!("keyboard hook thread panicked");
        }
        clear_sink();
        info!("keyboard hook removed");
    }
}

impl Drop for LowLevelHook {
    fn drop(&mut self) {
        self.stop();
    }
}

fn clear_sink() {
    if let Ok(mut slot) = SINK.lock() {
        *slot = None;
    }
}

/// Translates with the keyboard layout of the foreground window's thread.
#[derive(Debug, Default)]
pub struct LayoutTranslator;

impl KeyTranslator for LayoutTranslator {
    fn to_unicode(&self, vk: u32, scan: u32, key_state: &[u8; 256]) -> Option<String> {
        let mut buf = [0u16; 8];
        // SAFETY: buffers are owned and sized; flag 0x4 leaves the kernel
        // dead-key state untouched.
        let written = unsafe {
            let foreground = GetForegroundWindow();
            let thread = GetWindowThreadProcessId(foreground, None);
            let layout = GetKeyboardLayout(thread);
            ToUnicodeEx(vk, scan, key_state, &mut buf, 0x4, layout)
        };
        if written <= 0 {
            return None;
        }
        let text = String::from_utf16_lossy(&buf[..written as usize]);
        (!text.chars().all(char::is_control)).then_some(text)
    }
}

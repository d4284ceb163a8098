//! Typing text into the focused application.

use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum InjectError {
    #[error("only {sent} of {expected} input events were accepted")]
    Partial { sent: u32, expected: u32 },

    #[error("text injection is not available on this platform")]
    Unsupported,
}

/// Synthesizes keystrokes for completion text.
pub trait TextInjector: Send {
    /// Type `text` at the caret. With `release_modifier`, a control key-up is
    /// sent first so a held control modifier does not turn the text into
    /// shortcuts.
    fn inject(&mut self, text: &str, release_modifier: bool) -> Result<(), InjectError>;
}

/// Injector that only logs; used by the console backend.
#[derive(Debug, Default)]
pub struct LogInjector;

impl TextInjector for LogInjector {
    fn inject(&mut self, text: &str, release_modifier: bool) -> Result<(), InjectError> {
        info!(text, release_modifier, "inject");
        Ok(())
    }
}

#[cfg(windows)]
pub use self::native::SendInputInjector;

#[cfg(windows)]
mod native {
    use std::mem::size_of;

    use windows::Win32::UI::Input::KeyboardAndMouse::{
        SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, KEYBDINPUT, KEYBD_EVENT_FLAGS, KEYEVENTF_KEYUP,
        KEYEVENTF_UNICODE, VIRTUAL_KEY, VK_CONTROL,
    };

    use super::{InjectError, TextInjector};

    /// Injects text with `SendInput` as unicode key events.
    #[derive(Debug, Default)]
    pub struct SendInputInjector;

    fn key(vk: VIRTUAL_KEY, scan: u16, flags: KEYBD_EVENT_FLAGS) -> INPUT {
        INPUT {
            r#type: INPUT_KEYBOARD,
            Anonymous: INPUT_0 {
                ki: KEYBDINPUT {
                    wVk: vk,
                    wScan: scan,
                    dwFlags: flags,
                    time: 0,
                    dwExtraInfo: 0,
                },
            },
        }
    }

    impl TextInjector for SendInputInjector {
        fn inject(&mut self, text: &str, release_modifier: bool) -> Result<(), InjectError> {
            let mut inputs = Vec::with_capacity(text.len() * 2 + 1);
            if release_modifier {
                inputs.push(key(VK_CONTROL, 0, KEYEVENTF_KEYUP));
            }
            for unit in text.encode_utf16() {
                inputs.push(key(VIRTUAL_KEY(0), unit, KEYEVENTF_UNICODE));
                inputs.push(key(VIRTUAL_KEY(0), unit, KEYEVENTF_UNICODE | KEYEVENTF_KEYUP));
            }
            if inputs.is_empty() {
                return Ok(());
            }

            let expected = inputs.len() as u32;
            // SAFETY: `inputs` is a valid slice of initialized INPUT records.
            let sent = unsafe { SendInput(&inputs, size_of::<INPUT>() as i32) };
            if sent == expected {
                Ok(())
            } else {
                Err(InjectError::Partial { sent, expected })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_injector_accepts_anything() {
        let mut injector = LogInjector;
        assert!(injector.inject("árvíztűrő", true).is_ok());
        assert!(injector.inject("", false).is_ok());
    }
}

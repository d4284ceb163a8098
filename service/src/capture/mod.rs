//! Keystroke capture.
//!
//! A capture backend pushes raw key-downs into a [`KeySink`] as fast as it
//! can; translation into [`KeyInput`] happens later on the worker thread via
//! [`translate`] and a [`KeyTranslator`].

pub mod console;
#[cfg(windows)]
pub mod windows;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;

use quicktype_core::KeyInput;

use crate::worker::WorkerEvent;

pub const VK_BACK: u32 = 0x08;
pub const VK_TAB: u32 = 0x09;
pub const VK_RETURN: u32 = 0x0D;
pub const VK_ESCAPE: u32 = 0x1B;
const VK_0: u32 = 0x30;
const VK_9: u32 = 0x39;
const VK_NUMPAD0: u32 = 0x60;
const VK_NUMPAD9: u32 = 0x69;

/// Snapshot of one physical key-down, taken on the hook thread.
#[derive(Debug, Clone)]
pub struct RawKey {
    pub vk: u32,
    pub scan: u32,
    /// 0x80 for every key that was down when the event fired.
    pub key_state: [u8; 256],
    /// Set when the hook turned a control+digit into a selection and
    /// swallowed the keystroke.
    pub control_digit: Option<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("failed to install keyboard hook: {0}")]
    HookInstall(String),

    #[error("capture is already running")]
    AlreadyRunning,

    #[error("failed to start capture thread: {0}")]
    Thread(#[from] std::io::Error),

    #[error("capture backend is not available on this platform")]
    Unsupported,
}

/// Where capture backends deliver keys.
#[derive(Debug, Clone)]
pub struct KeySink {
    tx: Sender<WorkerEvent>,
    showing: Arc<AtomicBool>,
}

impl KeySink {
    pub fn new(tx: Sender<WorkerEvent>, showing: Arc<AtomicBool>) -> Self {
        Self { tx, showing }
    }

    /// Whether suggestions are on screen right now.
    pub fn suggestions_showing(&self) -> bool {
        self.showing.load(Ordering::Acquire)
    }

    /// Queue a raw key. Never blocks.
    pub fn push_raw(&self, key: RawKey) -> bool {
        self.tx.send(WorkerEvent::Raw(Box::new(key))).is_ok()
    }

    /// Queue an already translated key.
    pub fn push_key(&self, key: KeyInput) -> bool {
        self.tx.send(WorkerEvent::Key(key)).is_ok()
    }

    /// Queue a console `^N`, resolved against the worker's own state.
    pub fn push_console_digit(&self, digit: u8) -> bool {
        self.tx.send(WorkerEvent::ConsoleDigit(digit)).is_ok()
    }
}

/// A global key filter.
pub trait KeyCaptureSource: Send {
    /// Install the filter; keys flow into `sink` until [`stop`](Self::stop).
    fn start(&mut self, sink: KeySink) -> Result<(), CaptureError>;
    /// Remove the filter. Safe to call more than once.
    fn stop(&mut self);
}

/// Layout-aware translation of a raw key into text.
pub trait KeyTranslator: Send {
    fn to_unicode(&self, vk: u32, scan: u32, key_state: &[u8; 256]) -> Option<String>;
}

/// Translator for backends that only deliver pre-translated keys.
#[derive(Debug, Default)]
pub struct NoTranslator;

impl KeyTranslator for NoTranslator {
    fn to_unicode(&self, _vk: u32, _scan: u32, _key_state: &[u8; 256]) -> Option<String> {
        None
    }
}

/// Digit carried by a top-row or numpad key code.
pub fn digit_of(vk: u32) -> Option<u8> {
    match vk {
        VK_0..=VK_9 => Some((vk - VK_0) as u8),
        VK_NUMPAD0..=VK_NUMPAD9 => Some((vk - VK_NUMPAD0) as u8),
        _ => None,
    }
}

/// Decide on the hook thread whether a key-down is a selection shortcut.
pub fn control_digit(vk: u32, control_down: bool, showing: bool) -> Option<u8> {
    if control_down && showing {
        digit_of(vk)
    } else {
        None
    }
}

/// Turn a raw key into buffer input.
pub fn translate(key: &RawKey, translator: &dyn KeyTranslator) -> Option<KeyInput> {
    if let Some(digit) = key.control_digit {
        return Some(KeyInput::ControlDigit(digit));
    }
    match key.vk {
        VK_BACK => Some(KeyInput::Backspace),
        VK_TAB => Some(KeyInput::Tab),
        VK_RETURN => Some(KeyInput::Enter),
        VK_ESCAPE => Some(KeyInput::Newline),
        _ => translator
            .to_unicode(key.vk, key.scan, &key.key_state)
            .filter(|s| !s.is_empty())
            .map(KeyInput::Text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Letters;

    impl KeyTranslator for Letters {
        fn to_unicode(&self, vk: u32, _scan: u32, _key_state: &[u8; 256]) -> Option<String> {
            char::from_u32(vk).map(|c| c.to_ascii_lowercase().to_string())
        }
    }

    fn raw(vk: u32) -> RawKey {
        RawKey {
            vk,
            scan: 0,
            key_state: [0; 256],
            control_digit: None,
        }
    }

    #[test]
    fn digits_from_both_rows() {
        assert_eq!(digit_of(0x31), Some(1));
        assert_eq!(digit_of(0x60), Some(0));
        assert_eq!(digit_of(0x69), Some(9));
        assert_eq!(digit_of(0x41), None);
    }

    #[test]
    fn control_digit_needs_modifier_and_open_list() {
        assert_eq!(control_digit(0x32, true, true), Some(2));
        assert_eq!(control_digit(0x32, false, true), None);
        assert_eq!(control_digit(0x32, true, false), None);
    }

    #[test]
    fn markers_take_precedence_over_layout() {
        assert_eq!(translate(&raw(VK_BACK), &Letters), Some(KeyInput::Backspace));
        assert_eq!(translate(&raw(VK_RETURN), &Letters), Some(KeyInput::Enter));
        assert_eq!(translate(&raw(VK_ESCAPE), &Letters), Some(KeyInput::Newline));
        assert_eq!(translate(&raw(0x41), &Letters), Some(KeyInput::Text("a".into())));

        let mut key = raw(0x33);
        key.control_digit = Some(3);
        assert_eq!(translate(&key, &Letters), Some(KeyInput::ControlDigit(3)));
    }

    #[test]
    fn untranslatable_key_is_dropped() {
        assert_eq!(translate(&raw(0x41), &NoTranslator), None);
    }
}

//! Caret position lookup for placing the suggestion surface.

use quicktype_core::CaretRect;

pub trait CaretLocator: Send {
    /// Screen rectangle of the caret in the foreground window, if known.
    fn locate(&self) -> Option<CaretRect>;
}

/// Locator that never knows; the client then keeps its last position.
#[derive(Debug, Default)]
pub struct NullCaret;

impl CaretLocator for NullCaret {
    fn locate(&self) -> Option<CaretRect> {
        None
    }
}

#[cfg(windows)]
pub use self::native::GuiThreadCaret;

#[cfg(windows)]
mod native {
    use std::mem::size_of;

    use windows::Win32::Foundation::POINT;
    use windows::Win32::Graphics::Gdi::ClientToScreen;
    use windows::Win32::UI::WindowsAndMessaging::{
        GetCursorPos, GetForegroundWindow, GetGUIThreadInfo, GetWindowThreadProcessId,
        GUITHREADINFO,
    };

    use quicktype_core::CaretRect;

    use super::CaretLocator;

    /// Reads the caret from the foreground thread's GUI info, falling back to
    /// the mouse cursor.
    #[derive(Debug, Default)]
    pub struct GuiThreadCaret;

    impl GuiThreadCaret {
        fn from_gui_thread() -> Option<CaretRect> {
            // SAFETY: plain Win32 queries on out-parameters we own.
            unsafe {
                let foreground = GetForegroundWindow();
                if foreground.0.is_null() {
                    return None;
                }
                let thread = GetWindowThreadProcessId(foreground, None);
                let mut info = GUITHREADINFO {
                    cbSize: size_of::<GUITHREADINFO>() as u32,
                    ..Default::default()
                };
                GetGUIThreadInfo(thread, &mut info).ok()?;
                if info.hwndCaret.0.is_null() {
                    return None;
                }
                let rc = info.rcCaret;
                let mut origin = POINT {
                    x: rc.left,
                    y: rc.top,
                };
                if !ClientToScreen(info.hwndCaret, &mut origin).as_bool() {
                    return None;
                }
                CaretRect {
                    left: origin.x,
                    top: origin.y,
                    width: rc.right - rc.left,
                    height: rc.bottom - rc.top,
                }
                .non_degenerate()
            }
        }

        fn from_cursor() -> Option<CaretRect> {
            let mut point = POINT::default();
            // SAFETY: `point` is a valid out-parameter.
            unsafe { GetCursorPos(&mut point) }.ok()?;
            CaretRect {
                left: point.x,
                top: point.y,
                width: 1,
                height: 20,
            }
            .non_degenerate()
        }
    }

    impl CaretLocator for GuiThreadCaret {
        fn locate(&self) -> Option<CaretRect> {
            Self::from_gui_thread().or_else(Self::from_cursor)
        }
    }
}

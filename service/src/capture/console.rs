//! Line-based capture for terminals and tests.
//!
//! Every character of a line is typed in order. Escapes: `\b` backspace,
//! `\t` tab, `\n` newline, `\\` a literal backslash, `^N` control+digit N.
//! An empty line is an Enter.
//!
//! Whether `^N` selects a suggestion is decided by the worker once the keys
//! before it are processed, so `ca^1` on one line selects.

use std::io::{self, BufRead};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use tracing::{debug, warn};

use quicktype_core::KeyInput;

use super::{CaptureError, KeyCaptureSource, KeySink};

type LineSource = Box<dyn BufRead + Send>;

pub struct ConsoleCapture {
    source: Option<LineSource>,
    stopped: Arc<AtomicBool>,
    running: bool,
}

impl ConsoleCapture {
    /// Capture from standard input.
    pub fn new() -> Self {
        Self::from_reader(io::BufReader::new(io::stdin()))
    }

    pub fn from_reader<R: BufRead + Send + 'static>(reader: R) -> Self {
        Self {
            source: Some(Box::new(reader)),
            stopped: Arc::new(AtomicBool::new(false)),
            running: false,
        }
    }
}

impl Default for ConsoleCapture {
    fn default() -> Self {
        Self::new()
    }
}

/// One parsed console keystroke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleKey {
    Key(KeyInput),
    /// `^N`; a selection only if suggestions show when it is processed.
    ControlDigit(u8),
}

/// Parse one console line into keystrokes.
pub fn parse_line(line: &str) -> Vec<ConsoleKey> {
    if line.is_empty() {
        return vec![ConsoleKey::Key(KeyInput::Enter)];
    }
    let mut keys = Vec::new();
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('b') => keys.push(ConsoleKey::Key(KeyInput::Backspace)),
                Some('t') => keys.push(ConsoleKey::Key(KeyInput::Tab)),
                Some('n') => keys.push(ConsoleKey::Key(KeyInput::Newline)),
                Some(other) => keys.push(ConsoleKey::Key(KeyInput::Text(other.to_string()))),
                None => keys.push(ConsoleKey::Key(KeyInput::Text("\\".to_string()))),
            },
            '^' => match chars.peek().and_then(|d| d.to_digit(10)) {
                Some(d) => {
                    chars.next();
                    keys.push(ConsoleKey::ControlDigit(d as u8));
                }
                None => keys.push(ConsoleKey::Key(KeyInput::Text("^".to_string()))),
            },
            other => keys.push(ConsoleKey::Key(KeyInput::Text(other.to_string()))),
        }
    }
    keys
}

impl KeyCaptureSource for ConsoleCapture {
    fn start(&mut self, sink: KeySink) -> Result<(), CaptureError> {
        if self.running {
            return Err(CaptureError::AlreadyRunning);
        }
        let mut source = self.source.take().ok_or(CaptureError::AlreadyRunning)?;
        let stopped = Arc::clone(&self.stopped);
        stopped.store(false, Ordering::Release);

        // Reading stdin cannot be interrupted, so the thread is detached and
        // exits at the next line after `stop`.
        thread::Builder::new()
            .name("console-capture".into())
            .spawn(move || {
                let mut line = String::new();
                loop {
                    line.clear();
                    match source.read_line(&mut line) {
                        Ok(0) => {
                            debug!("console input closed");
                            break;
                        }
                        Ok(_) => {}
                        Err(e) => {
                            warn!(error = %e, "console read failed");
                            break;
                        }
                    }
                    if stopped.load(Ordering::Acquire) {
                        break;
                    }
                    let trimmed = line.trim_end_matches(&['\r', '\n'][..]);
                    for key in parse_line(trimmed) {
                        let delivered = match key {
                            ConsoleKey::Key(key) => sink.push_key(key),
                            ConsoleKey::ControlDigit(digit) => sink.push_console_digit(digit),
                        };
                        if !delivered {
                            return;
                        }
                    }
                }
            })?;
        self.running = true;
        Ok(())
    }

    fn stop(&mut self) {
        if self.running {
            self.stopped.store(true, Ordering::Release);
            self.running = false;
            debug!("console capture stopped");
        }
    }
}

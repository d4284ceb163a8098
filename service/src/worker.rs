//! The keystroke worker.
//!
//! One thread owns the [`BufferStateMachine`]. Capture backends, the IPC
//! handler and the orchestrator talk to it only through [`WorkerEvent`]s, so
//! keys are processed strictly in arrival order and never on the hook thread.

use std::io;
use std::sync::mpsc::Receiver;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use tracing::{debug, trace, warn};

use quicktype_core::{
    BufferAction, BufferOptions, BufferStateMachine, IpcMessage, KeyInput, Selection,
    SuggestionProvider,
};

use crate::capture::{translate, KeyTranslator, RawKey};
use crate::caret::CaretLocator;
use crate::inject::TextInjector;
use crate::ipc::Outbound;

#[derive(Debug)]
pub enum WorkerEvent {
    /// Untranslated key from the hook.
    Raw(Box<RawKey>),
    Key(KeyInput),
    /// Console `^N`: selects while suggestions show, otherwise types `^N`.
    ConsoleDigit(u8),
    Select(Selection),
    Options(BufferOptions),
    /// Drop the word under composition.
    Reset,
    Shutdown,
}

pub struct Worker<P> {
    machine: BufferStateMachine<P>,
    translator: Box<dyn KeyTranslator>,
    injector: Box<dyn TextInjector>,
    caret: Box<dyn CaretLocator>,
    outbound: Outbound,
}

impl<P: SuggestionProvider> Worker<P> {
    pub fn new(
        machine: BufferStateMachine<P>,
        translator: Box<dyn KeyTranslator>,
        injector: Box<dyn TextInjector>,
        caret: Box<dyn CaretLocator>,
        outbound: Outbound,
    ) -> Self {
        Self {
            machine,
            translator,
            injector,
            caret,
            outbound,
        }
    }

    pub fn machine(&self) -> &BufferStateMachine<P> {
        &self.machine
    }

    /// Process one event. Returns `false` once the worker should exit.
    pub fn handle(&mut self, event: WorkerEvent) -> bool {
        let actions = match event {
            WorkerEvent::Raw(raw) => match translate(&raw, self.translator.as_ref()) {
                Some(key) => self.machine.process_key(key),
                None => {
                    trace!(vk = raw.vk, "untranslatable key");
                    Vec::new()
                }
            },
            WorkerEvent::Key(key) => self.machine.process_key(key),
            WorkerEvent::ConsoleDigit(digit) if self.machine.is_showing() => {
                self.machine.process_key(KeyInput::ControlDigit(digit))
            }
            WorkerEvent::ConsoleDigit(digit) => {
                let mut actions = self.machine.process_key(KeyInput::Text("^".to_string()));
                actions.extend(self.machine.process_key(KeyInput::Text(digit.to_string())));
                actions
            }
            WorkerEvent::Select(selection) => self.machine.select(selection),
            WorkerEvent::Options(options) => {
                debug!(?options, "buffer options changed");
                self.machine.set_options(options);
                Vec::new()
            }
            WorkerEvent::Reset => self.machine.reset(),
            WorkerEvent::Shutdown => return false,
        };
        for action in actions {
            self.perform(action);
        }
        true
    }

    fn perform(&mut self, action: BufferAction) {
        match action {
            BufferAction::Suggest(list) => {
                let caret = if list.is_empty() {
                    None
                } else {
                    self.caret.locate()
                };
                self.outbound
                    .send(IpcMessage::suggestion(list.into_words(), caret));
            }
            BufferAction::Close => self.outbound.send(IpcMessage::close()),
            BufferAction::Status(text) => self.outbound.send(IpcMessage::status(text)),
            BufferAction::SearchFailed(reason) => self
                .outbound
                .send(IpcMessage::status("search incomplete").with_error(reason)),
            BufferAction::Inject {
                text,
                release_modifier,
            } => {
                if let Err(e) = self.injector.inject(&text, release_modifier) {
                    warn!(error = %e, "text injection failed");
                }
            }
        }
    }

    /// Drain `events` until shutdown or until every sender is gone.
    pub fn run(mut self, events: Receiver<WorkerEvent>) {
        debug!("worker started");
        while let Ok(event) = events.recv() {
            let started = Instant::now();
            if !self.handle(event) {
                break;
            }
            trace!(elapsed_us = started.elapsed().as_micros() as u64, "event handled");
        }
        debug!("worker stopped");
    }
}

impl<P: SuggestionProvider + Send + 'static> Worker<P> {
    pub fn spawn(self, events: Receiver<WorkerEvent>) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("quicktype-worker".into())
            .spawn(move || self.run(events))
    }
}

//! Service lifecycle and inbound message handling.
//!
//! [`Service::start`] wires the language index, the keystroke worker, the key
//! capture backend and the IPC server together; [`Service::stop`] tears them
//! down in a fixed order. The [`Orchestrator`] is the IPC server's handler.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use anyhow::{Context, Result};
use tokio::task::JoinHandle as TaskHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use quicktype_core::settings::{resync_languages, sync_languages};
use quicktype_core::{
    AppSettings, BufferStateMachine, BuiltinLanguage, CoreError, CustomLanguageDefinition,
    IpcMessage, LanguageIndex, MessageBody, Selection, SettingsChanges, SettingsPatch,
    SettingsStore,
};

use crate::capture::console::ConsoleCapture;
use crate::capture::{KeyCaptureSource, KeySink, KeyTranslator, NoTranslator};
use crate::caret::{CaretLocator, NullCaret};
use crate::config::{CaptureBackendKind, ServiceConfig};
use crate::inject::{LogInjector, TextInjector};
use crate::ipc::{server, Outbound};
use crate::worker::{Worker, WorkerEvent};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The OS-facing pieces of the service.
pub struct Collaborators {
    pub capture: Box<dyn KeyCaptureSource>,
    pub translator: Box<dyn KeyTranslator>,
    pub injector: Box<dyn TextInjector>,
    pub caret: Box<dyn CaretLocator>,
}

impl Collaborators {
    pub fn console() -> Self {
        Self {
            capture: Box::new(ConsoleCapture::new()),
            translator: Box::new(NoTranslator),
            injector: Box::new(LogInjector),
            caret: Box::new(NullCaret),
        }
    }

    #[cfg(windows)]
    pub fn native() -> Result<Self> {
        use crate::capture::windows::{LayoutTranslator, LowLevelHook};
        use crate::caret::GuiThreadCaret;
        use crate::inject::SendInputInjector;

        Ok(Self {
            capture: Box::new(LowLevelHook::new()),
            translator: Box::new(LayoutTranslator),
            injector: Box::new(SendInputInjector),
            caret: Box::new(GuiThreadCaret),
        })
    }

    #[cfg(not(windows))]
    pub fn native() -> Result<Self> {
        anyhow::bail!("the native capture backend is only available on Windows")
    }

    pub fn for_backend(kind: CaptureBackendKind) -> Result<Self> {
        match kind {
            CaptureBackendKind::Native => Self::native(),
            CaptureBackendKind::Console => Ok(Self::console()),
        }
    }
}

/// Blocking settings and language work, run one task at a time in the
/// order the messages arrived.
#[derive(Debug)]
pub enum AdminTask {
    UpdateSettings(SettingsPatch),
    RequestSettings { reset: bool },
    Recreate(CustomLanguageDefinition),
    Shutdown,
}

/// Handles messages from the presentation client.
#[derive(Clone)]
pub struct Orchestrator {
    index: Arc<LanguageIndex>,
    settings: Arc<Mutex<SettingsStore>>,
    worker: Sender<WorkerEvent>,
    admin: Sender<AdminTask>,
    outbound: Outbound,
    shutdown: CancellationToken,
    load_errors: Arc<Mutex<Vec<(String, String)>>>,
}

impl Orchestrator {
    /// The returned receiver feeds [`Orchestrator::spawn_admin`].
    pub fn new(
        index: Arc<LanguageIndex>,
        settings: Arc<Mutex<SettingsStore>>,
        worker: Sender<WorkerEvent>,
        outbound: Outbound,
        shutdown: CancellationToken,
    ) -> (Self, Receiver<AdminTask>) {
        let (admin, admin_rx) = mpsc::channel();
        let this = Self {
            index,
            settings,
            worker,
            admin,
            outbound,
            shutdown,
            load_errors: Arc::new(Mutex::new(Vec::new())),
        };
        (this, admin_rx)
    }

    /// Sender for queueing admin work, used to stop the admin thread.
    pub fn admin_sender(&self) -> Sender<AdminTask> {
        self.admin.clone()
    }

    /// Run admin tasks on a dedicated thread until [`AdminTask::Shutdown`].
    pub fn spawn_admin(&self, tasks: Receiver<AdminTask>) -> std::io::Result<JoinHandle<()>> {
        let this = self.clone();
        std::thread::Builder::new()
            .name("settings-admin".into())
            .spawn(move || this.run_admin(tasks))
    }

    fn run_admin(self, tasks: Receiver<AdminTask>) {
        debug!("admin thread started");
        for task in tasks.iter() {
            match task {
                AdminTask::UpdateSettings(patch) => self.update_settings(patch),
                AdminTask::RequestSettings { reset } => self.request_settings(reset),
                AdminTask::Recreate(language) => self.recreate(language),
                AdminTask::Shutdown => break,
            }
        }
        debug!("admin thread stopped");
    }

    fn to_admin(&self, task: AdminTask) {
        if self.admin.send(task).is_err() {
            warn!("admin thread gone, request dropped");
        }
    }

    /// Remember language failures so they are reported when a client attaches.
    pub fn record_failures(&self, failures: Vec<(String, CoreError)>) {
        let mut errors = self.load_errors.lock().unwrap_or_else(PoisonError::into_inner);
        errors.clear();
        for (name, e) in failures {
            warn!(language = %name, error = %e, "language failed to load");
            errors.push((name, e.to_string()));
        }
    }

    fn settings_snapshot(&self) -> AppSettings {
        self.settings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .settings()
            .clone()
    }

    fn to_worker(&self, event: WorkerEvent) {
        if self.worker.send(event).is_err() {
            debug!("worker gone, event dropped");
        }
    }

    fn select(&self, index: Option<usize>, word: Option<String>) {
        let selection = match (index, word) {
            (_, Some(word)) if !word.is_empty() => Selection::Word(word),
            (Some(index), _) => Selection::Index(index),
            _ => {
                warn!("selection without index or word");
                return;
            }
        };
        self.to_worker(WorkerEvent::Select(selection));
    }

    /// Push settings effects to the worker and the index, then report the
    /// resulting settings. Blocking.
    fn apply_changes(&self, previous: &AppSettings, changes: SettingsChanges) {
        let snapshot = self.settings_snapshot();
        if changes.buffer_options {
            self.to_worker(WorkerEvent::Options(snapshot.buffer_options()));
        }
        if changes.languages {
            let failures = resync_languages(&self.index, previous, &snapshot);
            for (name, e) in &failures {
                self.outbound.send(
                    IpcMessage::status(format!("language {name} unavailable"))
                        .with_error(e.to_string()),
                );
            }
            self.record_failures(failures);
            info!(languages = ?self.index.loaded_names(), "languages synchronized");
        }
        self.outbound
            .send(IpcMessage::settings(SettingsPatch::from(&snapshot)));
    }

    fn update_settings(&self, patch: SettingsPatch) {
        let (previous, result) = {
            let mut store = self.settings.lock().unwrap_or_else(PoisonError::into_inner);
            let previous = store.settings().clone();
            (previous, store.update(patch))
        };
        match result {
            Ok(changes) => self.apply_changes(&previous, changes),
            Err(e) => {
                error!(error = %e, "failed to update settings");
                self.outbound
                    .send(IpcMessage::status("settings not saved").with_error(e.to_string()));
            }
        }
    }

    fn request_settings(&self, reset: bool) {
        if !reset {
            let snapshot = self.settings_snapshot();
            self.outbound
                .send(IpcMessage::settings(SettingsPatch::from(&snapshot)));
            return;
        }
        let (previous, result) = {
            let mut store = self.settings.lock().unwrap_or_else(PoisonError::into_inner);
            let previous = store.settings().clone();
            (previous, store.reset())
        };
        match result {
            Ok(changes) => self.apply_changes(&previous, changes),
            Err(e) => {
                error!(error = %e, "failed to reset settings");
                self.outbound
                    .send(IpcMessage::status("settings not reset").with_error(e.to_string()));
            }
        }
    }

    /// Rebuild a language's store from its source. Blocking.
    fn recreate(&self, language: CustomLanguageDefinition) {
        let name = language.name.trim().to_string();
        let result = if let Some(builtin) = BuiltinLanguage::from_name(&name) {
            self.index.recreate(builtin.name())
        } else {
            self.recreate_custom(&language)
        };
        match result {
            Ok(()) => {
                info!(language = %name, "language database recreated");
                self.outbound
                    .send(IpcMessage::status(format!("{name} database recreated")));
            }
            Err(e) => {
                warn!(language = %name, error = %e, "language recreate failed");
                self.outbound.send(
                    IpcMessage::status(format!("{name} database not recreated"))
                        .with_error(e.to_string()),
                );
            }
        }
    }

    fn recreate_custom(&self, language: &CustomLanguageDefinition) -> quicktype_core::Result<()> {
        let definition = language.to_definition()?;
        if self.index.is_loaded(&definition.name) {
            self.index.unload(&definition.name);
            self.index.load(definition, true)
        } else {
            // not loaded: drop the stale store so the next load rebuilds it
            self.index.delete_custom(&definition.name)
        }
    }
}

impl server::InboundHandler for Orchestrator {
    fn attached(&self) {
        let languages = self.index.loaded_names();
        self.outbound.send(IpcMessage::status(format!(
            "quicktype {VERSION} ready, languages: {}",
            languages.join(", ")
        )));
        let errors = self
            .load_errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for (name, e) in errors {
            self.outbound
                .send(IpcMessage::status(format!("language {name} unavailable")).with_error(e));
        }
    }

    fn handle(&self, message: IpcMessage) {
        let kind = message.kind();
        debug!(kind, "inbound message");
        match message.body {
            MessageBody::Selection { index, word } => self.select(index, word),
            MessageBody::Settings { settings } => {
                self.to_admin(AdminTask::UpdateSettings(settings))
            }
            MessageBody::SettingsRequest { reset } => {
                self.to_admin(AdminTask::RequestSettings { reset })
            }
            MessageBody::RecreateLanguageDatabase { language } => {
                self.to_admin(AdminTask::Recreate(language))
            }
            MessageBody::ServiceShutdown => {
                info!("shutdown requested by client");
                self.shutdown.cancel();
            }
            MessageBody::Close => self.to_worker(WorkerEvent::Reset),
            MessageBody::Status { .. } | MessageBody::Suggestion { .. } => {
                debug!(kind, "ignoring service-to-client message")
            }
        }
    }
}

/// A running service.
pub struct Service {
    index: Arc<LanguageIndex>,
    capture: Box<dyn KeyCaptureSource>,
    worker_tx: Sender<WorkerEvent>,
    worker: Option<JoinHandle<()>>,
    admin_tx: Sender<AdminTask>,
    admin: Option<JoinHandle<()>>,
    ipc_cancel: CancellationToken,
    server: Option<TaskHandle<()>>,
    shutdown: CancellationToken,
}

impl Service {
    /// Load settings and languages, bind the endpoint, start the worker and
    /// install key capture. Any failure here is fatal.
    pub async fn start(
        config: &ServiceConfig,
        collaborators: Collaborators,
        force_rebuild: bool,
    ) -> Result<Self> {
        let settings_path = config.storage.settings_path();
        let settings = SettingsStore::open(&settings_path)
            .with_context(|| format!("failed to open settings {}", settings_path.display()))?;
        let snapshot = settings.settings().clone();

        let data_dir = config.storage.data_dir();
        info!(data_dir = %data_dir.display(), "loading languages");
        let index = Arc::new(LanguageIndex::new(&data_dir));
        let failures = {
            let index = Arc::clone(&index);
            let snapshot = snapshot.clone();
            tokio::task::spawn_blocking(move || sync_languages(&index, &snapshot, force_rebuild))
                .await
                .context("language loading panicked")?
        };
        info!(languages = ?index.loaded_names(), "languages loaded");

        let listener = server::bind(&config.ipc.endpoint).await?;
        let (outbound, outbound_rx) = Outbound::channel();

        let machine = BufferStateMachine::new(Arc::clone(&index), snapshot.buffer_options());
        let showing = machine.showing_flag();
        let (worker_tx, worker_rx) = mpsc::channel();
        let worker = Worker::new(
            machine,
            collaborators.translator,
            collaborators.injector,
            collaborators.caret,
            outbound.clone(),
        )
        .spawn(worker_rx)
        .context("failed to start worker thread")?;

        let mut capture = collaborators.capture;
        if let Err(e) = capture.start(KeySink::new(worker_tx.clone(), showing)) {
            let _ = worker_tx.send(WorkerEvent::Shutdown);
            let _ = worker.join();
            return Err(anyhow::Error::new(e).context("failed to start key capture"));
        }

        let shutdown = CancellationToken::new();
        let ipc_cancel = CancellationToken::new();
        let (orchestrator, admin_rx) = Orchestrator::new(
            Arc::clone(&index),
            Arc::new(Mutex::new(settings)),
            worker_tx.clone(),
            outbound,
            shutdown.clone(),
        );
        orchestrator.record_failures(failures);
        let admin_tx = orchestrator.admin_sender();
        let admin = match orchestrator.spawn_admin(admin_rx) {
            Ok(admin) => admin,
            Err(e) => {
                capture.stop();
                let _ = worker_tx.send(WorkerEvent::Shutdown);
                let _ = worker.join();
                return Err(anyhow::Error::new(e).context("failed to start admin thread"));
            }
        };
        let server = server::spawn(
            listener,
            outbound_rx,
            Arc::new(orchestrator),
            ipc_cancel.clone(),
        );

        info!("service started");
        Ok(Self {
            index,
            capture,
            worker_tx,
            worker: Some(worker),
            admin_tx,
            admin: Some(admin),
            ipc_cancel,
            server: Some(server),
            shutdown,
        })
    }

    /// Fires when a client asks the service to shut down.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn index(&self) -> &Arc<LanguageIndex> {
        &self.index
    }

    /// Queue an event for the worker.
    pub fn send(&self, event: WorkerEvent) -> bool {
        self.worker_tx.send(event).is_ok()
    }

    /// Run until Ctrl-C or a client shutdown request, then stop.
    pub async fn run(self) -> Result<()> {
        let token = self.shutdown_token();
        tokio::select! {
            _ = token.cancelled() => {}
            signal = tokio::signal::ctrl_c() => {
                signal.context("failed to listen for ctrl-c")?;
                info!("interrupt received");
            }
        }
        self.stop().await;
        Ok(())
    }

    /// Unhook capture, stop the worker, close the channel, finish queued
    /// admin work, release stores.
    pub async fn stop(mut self) {
        info!("stopping key capture");
        self.capture.stop();

        info!("stopping worker");
        let _ = self.worker_tx.send(WorkerEvent::Shutdown);
        if let Some(worker) = self.worker.take() {
            match tokio::task::spawn_blocking(move || worker.join()).await {
                Ok(Ok(())) => {}
                _ => warn!("worker thread did not exit cleanly"),
            }
        }

        info!("closing ipc channel");
        self.ipc_cancel.cancel();
        if let Some(server) = self.server.take() {
            if let Err(e) = server.await {
                warn!(error = %e, "ipc server task failed");
            }
        }

        info!("finishing settings work");
        let _ = self.admin_tx.send(AdminTask::Shutdown);
        if let Some(admin) = self.admin.take() {
            match tokio::task::spawn_blocking(move || admin.join()).await {
                Ok(Ok(())) => {}
                _ => warn!("admin thread did not exit cleanly"),
            }
        }

        info!("releasing language stores");
        self.index.clear();
        self.shutdown.cancel();
        info!("service stopped");
    }
}

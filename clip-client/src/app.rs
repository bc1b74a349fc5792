//! AppContext - the running Uniclip instance.
//!
//! Owns the connection controller, the clipboard watcher, the message
//! orchestrator and the chunker, and drives them from a single event loop.
//! Components talk to the loop only through their event channels; the loop
//! holds `&mut self`, so the orchestrator and chunker need no locking.
//!
//! ```text
//! watcher ──WatcherEvent──▶ AppContext ──upload/split/publish──▶ transport
//! transport ──ConnectionEvent::Message──▶ AppContext ──reassemble/receive/write──▶ clipboard
//! ```

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use clip_core::ConnectionState;
use clip_types::{ClipboardMessage, DeviceId};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::chunk::{ChunkOutcome, Chunker};
use crate::clipboard::{ClipboardBackend, ClipboardError};
use crate::config::{AppConfig, ConfigError, SyncMode};
use crate::connection::{ConnectError, ConnectionController, ConnectionEvent, PublishError};
use crate::orchestrator::{MessageOrchestrator, OrchestratorEvent};
use crate::transport::Transport;
use crate::watcher::{ClipboardWatcher, WatcherEvent};

/// Number of received messages reported by [`AppContext::status`].
const STATUS_HISTORY: usize = 5;

/// Application errors.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid or incomplete configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Connecting failed permanently; the configuration must change.
    #[error("connection error: {0}")]
    Connect(#[from] ConnectError),

    /// Publishing failed.
    #[error("publish error: {0}")]
    Publish(#[from] PublishError),

    /// The clipboard could not be written.
    #[error("clipboard error: {0}")]
    Clipboard(#[from] ClipboardError),

    /// A message could not be serialized for publishing.
    #[error("upload failed: {0}")]
    Upload(String),

    /// The download directory could not be created.
    #[error("failed to create download directory {path}: {source}")]
    DownloadDir {
        /// The directory.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Notifications for a user interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// History or connection state changed; redraw.
    Refresh,
    /// Something the user should see.
    Notification {
        /// Short title.
        title: String,
        /// Details.
        body: String,
    },
    /// A received file was saved.
    FileReceived {
        /// File name.
        name: String,
        /// Where it was saved.
        path: PathBuf,
    },
    /// Connecting gave up; offer a reconnect action.
    ReconnectAvailable,
}

/// Snapshot of the application state.
#[derive(Debug, Clone)]
pub struct AppStatus {
    /// Connection lifecycle state.
    pub connection: ConnectionState,
    /// Current sync mode.
    pub sync_mode: SyncMode,
    /// Whether the clipboard watcher is polling.
    pub watching: bool,
    /// Incomplete inbound chunk transfers.
    pub pending_transfers: usize,
    /// Most recently received messages, oldest first.
    pub received: Vec<ClipboardMessage>,
    /// Most recent local clipboard content.
    pub latest_local: Option<ClipboardMessage>,
    /// Where received files are saved.
    pub download_dir: PathBuf,
}

/// The running application.
pub struct AppContext<T: Transport, B: ClipboardBackend> {
    connection: Arc<ConnectionController<T>>,
    connection_events: mpsc::UnboundedReceiver<ConnectionEvent>,
    watcher: ClipboardWatcher<B>,
    watcher_events: mpsc::UnboundedReceiver<WatcherEvent>,
    orchestrator: MessageOrchestrator,
    orchestrator_events: mpsc::UnboundedReceiver<OrchestratorEvent>,
    chunker: Chunker,
    sync_mode: SyncMode,
    events: mpsc::UnboundedSender<AppEvent>,
}

impl<T: Transport, B: ClipboardBackend> AppContext<T, B> {
    /// Build the application from configuration.
    ///
    /// Nothing is started; call [`start`](Self::start).
    pub fn new(
        config: &AppConfig,
        transport: T,
        backend: Arc<B>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<AppEvent>), AppError> {
        config.validate()?;
        let device_id = config.device_id()?;
        let download_dir = config.download_dir()?;

        let (connection, connection_events) =
            ConnectionController::new(config.connection_config(), transport);
        let (watcher, watcher_events) = ClipboardWatcher::new(backend, config.watcher_config());
        let (orchestrator, orchestrator_events) = MessageOrchestrator::new(
            device_id.clone(),
            download_dir,
            config.history.received_capacity,
            config.history.sent_capacity,
        );
        let (events, rx) = mpsc::unbounded_channel();

        let app = Self {
            connection: Arc::new(connection),
            connection_events,
            watcher,
            watcher_events,
            orchestrator,
            orchestrator_events,
            chunker: Chunker::new(device_id),
            sync_mode: config.device.sync_mode,
            events,
        };
        Ok((app, rx))
    }

    /// Shared handle to the connection controller.
    ///
    /// Lets another task disconnect while a connect is in progress.
    pub fn connection(&self) -> Arc<ConnectionController<T>> {
        Arc::clone(&self.connection)
    }

    /// The clipboard watcher.
    pub fn watcher(&self) -> &ClipboardWatcher<B> {
        &self.watcher
    }

    /// The message orchestrator.
    pub fn orchestrator(&self) -> &MessageOrchestrator {
        &self.orchestrator
    }

    /// This device's id.
    pub fn device_id(&self) -> &DeviceId {
        self.chunker.device_id()
    }

    /// Current sync mode.
    pub fn sync_mode(&self) -> SyncMode {
        self.sync_mode
    }

    /// Switch between automatic and manual sync.
    pub fn set_sync_mode(&mut self, mode: SyncMode) {
        if self.sync_mode != mode {
            info!(mode = %mode, "Sync mode changed");
            self.sync_mode = mode;
            self.emit(AppEvent::Refresh);
        }
    }

    /// Create the download directory, start watching and connect.
    ///
    /// Only permanent connection failures are returned. A timeout becomes a
    /// notification plus [`AppEvent::ReconnectAvailable`].
    pub async fn start(&mut self) -> Result<(), AppError> {
        let dir = self.orchestrator.download_dir().to_path_buf();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| AppError::DownloadDir {
                path: dir.clone(),
                source,
            })?;
        debug!(path = %dir.display(), "Download directory ready");

        self.watcher.start_watching();
        self.reconnect().await
    }

    /// Connect with the same error policy as [`start`](Self::start).
    pub async fn reconnect(&self) -> Result<(), AppError> {
        match self.connection.connect().await {
            Ok(()) => Ok(()),
            Err(e @ ConnectError::Permanent(_)) => {
                error!(error = %e, "Cannot connect with the current configuration");
                Err(e.into())
            }
            Err(e @ ConnectError::Timeout) => {
                warn!(error = %e, "Connecting gave up");
                self.emit(AppEvent::Notification {
                    title: "Connection failed".to_string(),
                    body: e.to_string(),
                });
                self.emit(AppEvent::ReconnectAvailable);
                Ok(())
            }
        }
    }

    /// Stop watching and disconnect.
    pub async fn suspend(&mut self) {
        info!("Suspending");
        self.watcher.stop_watching();
        self.connection.suspend().await;
    }

    /// Reconnect and resume watching after [`suspend`](Self::suspend).
    pub async fn resume(&mut self) -> Result<(), AppError> {
        info!("Resuming");
        self.watcher.start_watching();
        self.reconnect().await
    }

    /// Upload the latest local clipboard content.
    ///
    /// Returns `false` if nothing has been copied yet.
    pub async fn send_latest(&mut self) -> Result<bool, AppError> {
        let Some(message) = self.watcher.latest_contents() else {
            debug!("Nothing to send");
            return Ok(false);
        };
        self.send(message).await?;
        Ok(true)
    }

    /// Put a history entry on the clipboard.
    ///
    /// File messages are already on disk and are not written.
    pub async fn fetch(&self, message: &ClipboardMessage) -> Result<(), AppError> {
        debug!(summary = %message.summary(), "Fetching message");
        self.watcher.write(message, true).await?;
        Ok(())
    }

    /// Snapshot of the current state.
    pub async fn status(&self) -> AppStatus {
        AppStatus {
            connection: self.connection.state().await,
            sync_mode: self.sync_mode,
            watching: self.watcher.is_watching(),
            pending_transfers: self.chunker.pending_transfers(),
            received: self.orchestrator.latest_messages(STATUS_HISTORY),
            latest_local: self.watcher.latest_contents(),
            download_dir: self.orchestrator.download_dir().to_path_buf(),
        }
    }

    /// Handle every event already queued, without waiting.
    ///
    /// Returns the number of events handled.
    pub async fn process_pending(&mut self) -> usize {
        let mut handled = 0;
        loop {
            if let Ok(event) = self.connection_events.try_recv() {
                self.on_connection_event(event).await;
            } else if let Ok(event) = self.watcher_events.try_recv() {
                self.on_local_change(event).await;
            } else {
                return handled;
            }
            handled += 1;
        }
    }

    /// Run the event loop until `shutdown` completes, then suspend.
    pub async fn run_until<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!(device = %self.device_id(), "Event loop running");
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                Some(event) = self.connection_events.recv() => {
                    self.on_connection_event(event).await;
                }
                Some(event) = self.watcher_events.recv() => {
                    self.on_local_change(event).await;
                }
            }
        }
        self.suspend().await;
        info!("Event loop stopped");
    }

    async fn on_connection_event(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Connected | ConnectionEvent::Disconnected => {
                self.emit(AppEvent::Refresh);
            }
            ConnectionEvent::Message(value) => self.on_inbound(value).await,
        }
    }

    async fn on_inbound(&mut self, value: Value) {
        let value = match self.chunker.receive(value) {
            ChunkOutcome::Complete(value) => value,
            ChunkOutcome::Progress { pending } => {
                debug!(pending, "Waiting for more chunks");
                return;
            }
            ChunkOutcome::Ignored => return,
        };

        let received = self.orchestrator.receive(value).await;
        if let Some(received) = received {
            if self.sync_mode == SyncMode::Automatic {
                if let Err(e) = self.watcher.write(&received.message, true).await {
                    warn!(error = %e, "Failed to apply received message");
                }
            }
        }
        self.drain_orchestrator_events();
    }

    async fn on_local_change(&mut self, event: WatcherEvent) {
        if self.sync_mode == SyncMode::Manual {
            debug!("Manual mode, not uploading");
            self.emit(AppEvent::Refresh);
            return;
        }
        if let Err(e) = self.send(event.into_message()).await {
            warn!(error = %e, "Failed to send clipboard change");
        }
    }

    async fn send(&mut self, message: ClipboardMessage) -> Result<(), AppError> {
        let wire = self.orchestrator.upload(message).await;
        self.drain_orchestrator_events();
        let wire = wire.ok_or_else(|| AppError::Upload("message could not be serialized".into()))?;

        let chunks = self
            .chunker
            .split(&wire)
            .map_err(|e| AppError::Upload(e.to_string()))?;
        debug!(chunks = chunks.len(), kind = %wire.kind, "Publishing");
        for chunk in &chunks {
            self.connection.publish(chunk).await?;
        }
        self.emit(AppEvent::Refresh);
        Ok(())
    }

    fn drain_orchestrator_events(&mut self) {
        while let Ok(event) = self.orchestrator_events.try_recv() {
            match event {
                OrchestratorEvent::Received(_) => self.emit(AppEvent::Refresh),
                OrchestratorEvent::FileCreated { name, path } => {
                    self.emit(AppEvent::Notification {
                        title: "File received".to_string(),
                        body: name.clone(),
                    });
                    self.emit(AppEvent::FileReceived { name, path });
                }
                OrchestratorEvent::Publish(_) => {}
            }
        }
    }

    fn emit(&self, event: AppEvent) {
        if self.events.send(event).is_err() {
            debug!("App event receiver dropped");
        }
    }
}

//! # clip-client
//!
//! Client library for Uniclip clipboard sync.
//!
//! This is the main library that applications use to sync a clipboard across
//! devices over a pub/sub stream.
//!
//! ## Features
//!
//! - **Adaptive Clipboard Watcher**: differential polling of text, images
//!   and copied files, with echo suppression for remote writes
//! - **Resilient Connection**: retries until a single deadline,
//!   cancellable by disconnect
//! - **Chunked Transfers**: oversized messages are split and reassembled
//! - **Transport Abstraction**: pluggable pub/sub layer (mock included)
//! - **Pure State Machine**: uses clip-core for side-effect-free logic
//!
//! ## Example
//!
//! ```ignore
//! use clip_client::{AppConfig, AppContext, MemoryClipboard, MockTransport};
//!
//! let config = AppConfig::from_file(&path)?;
//! let clipboard = Arc::new(MemoryClipboard::new());
//! let (mut app, events) = AppContext::new(&config, MockTransport::new(), clipboard)?;
//!
//! app.start().await?;
//! app.run_until(tokio::signal::ctrl_c().map(|_| ())).await;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod app;
pub mod chunk;
pub mod clipboard;
pub mod config;
pub mod connection;
pub mod orchestrator;
pub mod transport;
pub mod watcher;

pub use app::{AppContext, AppError, AppEvent, AppStatus};
pub use chunk::{ChunkOutcome, Chunker, MAX_CHUNK_SIZE, MAX_TRANSFER_CHUNKS};
pub use clipboard::{ClipboardBackend, ClipboardError, MemoryClipboard};
#[cfg(feature = "system-clipboard")]
pub use clipboard::SystemClipboard;
pub use config::{AppConfig, ConfigError, SyncMode};
pub use connection::{
    ConnectError, ConnectionConfig, ConnectionController, ConnectionEvent, PublishError,
};
pub use orchestrator::{MessageOrchestrator, OrchestratorError, OrchestratorEvent, ReceivedMessage};
pub use transport::{MockTransport, SubscribeOptions, Subscription, Transport, TransportError};
pub use watcher::{ClipboardWatcher, WatcherConfig, WatcherEvent};

//! MessageOrchestrator - routing of inbound and outbound clipboard messages.
//!
//! Inbound values are validated against the wire shape, files are persisted
//! to the download directory (never overwriting), and accepted messages are
//! recorded in a bounded history. Outbound clipboard messages are recorded
//! in the sent history and serialized to the wire form.
//!
//! Results are returned to the caller and also emitted as
//! [`OrchestratorEvent`]s for whoever drives the event loop.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use clip_core::HistoryBuffer;
use clip_types::{ClipboardMessage, DeviceId, ImageError, MessageKind, WireError, WireMessage};
use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::watcher::resolve_file_path;

/// Orchestrator errors.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Reading or writing a file failed.
    #[error("file I/O error on {path}: {source}")]
    FileIo {
        /// The file involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The inbound value is not a valid wire message.
    #[error("invalid message: {0}")]
    Wire(#[from] WireError),

    /// An image could not be encoded for upload.
    #[error("image encoding failed: {0}")]
    Image(#[from] ImageError),

    /// A received file name has no usable final component.
    #[error("unusable file name: {0:?}")]
    InvalidFileName(String),
}

/// An accepted inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    /// The typed message. Files point at their persisted location.
    pub message: ClipboardMessage,
    /// For files: whether this delivery created the file.
    pub file_created: Option<bool>,
}

/// Events emitted by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrchestratorEvent {
    /// An inbound message was accepted.
    Received(ReceivedMessage),
    /// A received file was written to disk for the first time.
    FileCreated {
        /// File name.
        name: String,
        /// Where it was written.
        path: PathBuf,
    },
    /// A wire message is ready to publish.
    Publish(WireMessage),
}

/// Routing hub between the watcher, the history and the network.
pub struct MessageOrchestrator {
    device_id: DeviceId,
    download_dir: PathBuf,
    received: HistoryBuffer<ClipboardMessage>,
    sent: HistoryBuffer<ClipboardMessage>,
    events: mpsc::UnboundedSender<OrchestratorEvent>,
}

impl MessageOrchestrator {
    /// Create an orchestrator and the receiver for its events.
    pub fn new(
        device_id: DeviceId,
        download_dir: impl Into<PathBuf>,
        received_capacity: usize,
        sent_capacity: usize,
    ) -> (Self, mpsc::UnboundedReceiver<OrchestratorEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let orchestrator = Self {
            device_id,
            download_dir: download_dir.into(),
            received: HistoryBuffer::new(received_capacity),
            sent: HistoryBuffer::new(sent_capacity),
            events,
        };
        (orchestrator, rx)
    }

    /// Directory received files are written to.
    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Validate and route one inbound value.
    ///
    /// Invalid values and files that cannot be persisted are dropped and
    /// logged; `None` is returned for them.
    pub async fn receive(&mut self, raw: Value) -> Option<ReceivedMessage> {
        let wire = match WireMessage::from_value(raw) {
            Ok(wire) => wire,
            Err(e) => {
                debug!(error = %e, "Unsupported message format");
                return None;
            }
        };

        let received = match wire.kind {
            MessageKind::File => match self.persist_file(&wire).await {
                Ok(received) => received,
                Err(e) => {
                    error!(error = %e, "Dropping received file");
                    return None;
                }
            },
            MessageKind::Text | MessageKind::Image => match wire.into_inline_message() {
                Ok(message) => ReceivedMessage {
                    message,
                    file_created: None,
                },
                Err(e) => {
                    debug!(error = %e, "Unsupported message format");
                    return None;
                }
            },
        };

        debug!(kind = %received.message.kind(), summary = %received.message.summary(), "Message received");
        self.received.push(received.message.clone());
        self.emit(OrchestratorEvent::Received(received.clone()));
        Some(received)
    }

    async fn persist_file(&self, wire: &WireMessage) -> Result<ReceivedMessage, OrchestratorError> {
        let raw_name = wire.file_name.clone().unwrap_or_default();
        let name = sanitize_file_name(&raw_name)
            .ok_or_else(|| OrchestratorError::InvalidFileName(raw_name.clone()))?;
        let content = wire.decode_file_body()?;
        let destination = self.download_dir.join(&name);

        let created = write_new_file(&destination, &content).await?;
        if created {
            info!(file = %name, path = %destination.display(), "Saved received file");
            self.emit(OrchestratorEvent::FileCreated {
                name: name.clone(),
                path: destination.clone(),
            });
        } else {
            debug!(path = %destination.display(), "File already exists");
        }

        Ok(ReceivedMessage {
            message: ClipboardMessage::File {
                path: destination,
                name,
            },
            file_created: Some(created),
        })
    }

    /// Record and serialize a local clipboard message for publishing.
    ///
    /// Returns the wire message (also emitted as
    /// [`OrchestratorEvent::Publish`]). Files that cannot be read and images
    /// that cannot be encoded are logged and the upload abandoned.
    pub async fn upload(&mut self, message: ClipboardMessage) -> Option<WireMessage> {
        self.sent.push(message.clone());

        let wire = match self.serialize(&message).await {
            Ok(wire) => wire,
            Err(e) => {
                error!(error = %e, summary = %message.summary(), "Upload abandoned");
                return None;
            }
        };

        debug!(kind = %wire.kind, summary = %message.summary(), "Uploading");
        self.emit(OrchestratorEvent::Publish(wire.clone()));
        Some(wire)
    }

    async fn serialize(&self, message: &ClipboardMessage) -> Result<WireMessage, OrchestratorError> {
        match message {
            ClipboardMessage::Text { body } => Ok(WireMessage::text(body.clone(), self.device_id.clone())),
            ClipboardMessage::Image { payload } => Ok(WireMessage::image(payload.to_data_url()?)),
            ClipboardMessage::File { path, name } => {
                let raw = path.to_string_lossy();
                let path = resolve_file_path(&raw).unwrap_or_else(|| path.clone());
                let content = tokio::fs::read(&path)
                    .await
                    .map_err(|source| OrchestratorError::FileIo {
                        path: path.clone(),
                        source,
                    })?;
                Ok(WireMessage::file(name.clone(), &content))
            }
        }
    }

    /// Up to `amount` most recently received messages, oldest first.
    pub fn latest_messages(&self, amount: usize) -> Vec<ClipboardMessage> {
        self.received.latest(amount).into_iter().cloned().collect()
    }

    /// The most recently received message of `kind`.
    pub fn latest(&self, kind: MessageKind) -> Option<ClipboardMessage> {
        self.received.last_matching(|m| m.kind() == kind).cloned()
    }

    /// Messages uploaded from this device, oldest first.
    pub fn sent_messages(&self) -> Vec<ClipboardMessage> {
        self.sent.iter().cloned().collect()
    }

    fn emit(&self, event: OrchestratorEvent) {
        if self.events.send(event).is_err() {
            debug!("Orchestrator event receiver dropped");
        }
    }
}

/// Keep only the final path component of a sender-provided name.
fn sanitize_file_name(name: &str) -> Option<String> {
    let candidate = name.trim_end_matches('\0').replace('\\', "/");
    let last = Path::new(&candidate).file_name()?.to_string_lossy().into_owned();
    if last.is_empty() || last == "." || last == ".." {
        None
    } else {
        Some(last)
    }
}

/// Write `content` to `path` only if nothing exists there yet.
///
/// Returns whether the file was created.
async fn write_new_file(path: &Path, content: &[u8]) -> Result<bool, OrchestratorError> {
    let io_err = |source| OrchestratorError::FileIo {
        path: path.to_path_buf(),
        source,
    };

    let file = match tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
    {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(io_err(e)),
    };
    write_or_remove(path, file, content).await.map_err(io_err)?;
    Ok(true)
}

/// Write `content` through `writer`, deleting `path` if the write fails.
async fn write_or_remove<W>(path: &Path, mut writer: W, content: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut written = writer.write_all(content).await;
    if written.is_ok() {
        written = writer.flush().await;
    }
    if written.is_err() {
        drop(writer);
        if let Err(e) = tokio::fs::remove_file(path).await {
            warn!(path = %path.display(), error = %e, "Failed to remove partial file");
        }
    }
    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use clip_types::{ImagePayload, PNG_DATA_URL_PREFIX};
    use serde_json::json;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tempfile::TempDir;

    fn orchestrator(dir: &Path) -> (MessageOrchestrator, mpsc::UnboundedReceiver<OrchestratorEvent>) {
        MessageOrchestrator::new(DeviceId::new("local").unwrap(), dir, 5, 5)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<OrchestratorEvent>) -> Vec<OrchestratorEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    // ===========================================
    // Receive Tests
    // ===========================================

    #[tokio::test]
    async fn receives_text() {
        let dir = TempDir::new().unwrap();
        let (mut orch, mut rx) = orchestrator(dir.path());

        let received = orch
            .receive(json!({ "type": "text", "body": "hello", "deviceId": "peer" }))
            .await
            .unwrap();

        assert_eq!(received.message, ClipboardMessage::text("hello"));
        assert_eq!(received.file_created, None);
        assert_eq!(drain(&mut rx), vec![OrchestratorEvent::Received(received)]);
    }

    #[tokio::test]
    async fn invalid_shapes_are_dropped() {
        let dir = TempDir::new().unwrap();
        let (mut orch, mut rx) = orchestrator(dir.path());

        assert!(orch.receive(json!({ "type": "video", "body": "x" })).await.is_none());
        assert!(orch.receive(json!(42)).await.is_none());
        assert!(orch.receive(json!({ "type": "file", "body": "aGk=" })).await.is_none());

        assert!(orch.latest_messages(5).is_empty());
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn received_file_is_written_once() {
        let dir = TempDir::new().unwrap();
        let (mut orch, mut rx) = orchestrator(dir.path());
        let msg = json!({ "type": "file", "body": "aGk=", "fileName": "notes.txt" });

        let first = orch.receive(msg.clone()).await.unwrap();
        assert_eq!(first.file_created, Some(true));
        let path = dir.path().join("notes.txt");
        assert_eq!(std::fs::read(&path).unwrap(), b"hi");

        // A second delivery with different content must not overwrite
        let again = json!({ "type": "file", "body": "Ynll", "fileName": "notes.txt" });
        let second = orch.receive(again).await.unwrap();
        assert_eq!(second.file_created, Some(false));
        assert_eq!(std::fs::read(&path).unwrap(), b"hi");

        let events = drain(&mut rx);
        let created = events
            .iter()
            .filter(|e| matches!(e, OrchestratorEvent::FileCreated { .. }))
            .count();
        assert_eq!(created, 1);
        assert_eq!(orch.latest_messages(5).len(), 2);
    }

    #[tokio::test]
    async fn file_names_cannot_escape_download_dir() {
        let dir = TempDir::new().unwrap();
        let (mut orch, _rx) = orchestrator(dir.path());

        let received = orch
            .receive(json!({ "type": "file", "body": "aGk=", "fileName": "../../evil.sh" }))
            .await
            .unwrap();

        match received.message {
            ClipboardMessage::File { path, name } => {
                assert_eq!(name, "evil.sh");
                assert_eq!(path, dir.path().join("evil.sh"));
            }
            other => panic!("Expected File, got {:?}", other),
        }
        assert!(orch
            .receive(json!({ "type": "file", "body": "aGk=", "fileName": ".." }))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn unwritable_download_dir_drops_file() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("does-not-exist");
        let (mut orch, _rx) = orchestrator(&missing);

        let result = orch
            .receive(json!({ "type": "file", "body": "aGk=", "fileName": "a.txt" }))
            .await;

        assert!(result.is_none());
        assert!(orch.latest_messages(5).is_empty());
    }

    /// Accepts nothing, like a full disk.
    struct FullDisk;

    impl AsyncWrite for FullDisk {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            Poll::Ready(Err(std::io::Error::other("no space left")))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn failed_write_leaves_no_partial_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("big.bin");
        std::fs::File::create(&path).unwrap();

        let result = write_or_remove(&path, FullDisk, b"payload").await;

        assert!(result.is_err());
        assert!(!path.exists());

        // A later copy of the same file can be saved under the name
        assert!(write_new_file(&path, b"payload").await.unwrap());
        assert_eq!(std::fs::read(&path).unwrap(), b"payload");
    }

    // ===========================================
    // History Tests
    // ===========================================

    #[tokio::test]
    async fn history_is_bounded() {
        let dir = TempDir::new().unwrap();
        let (mut orch, _rx) = orchestrator(dir.path());

        for i in 0..12 {
            orch.receive(json!({ "type": "text", "body": format!("m{}", i) }))
                .await
                .unwrap();
        }

        let latest = orch.latest_messages(100);
        assert_eq!(latest.len(), 5);
        assert_eq!(latest[0], ClipboardMessage::text("m7"));
        assert_eq!(latest[4], ClipboardMessage::text("m11"));
        assert_eq!(orch.latest_messages(2), vec![ClipboardMessage::text("m10"), ClipboardMessage::text("m11")]);
    }

    #[tokio::test]
    async fn latest_by_kind() {
        let dir = TempDir::new().unwrap();
        let (mut orch, _rx) = orchestrator(dir.path());
        let url = format!("{}AAAA", PNG_DATA_URL_PREFIX);

        orch.receive(json!({ "type": "text", "body": "first" })).await;
        orch.receive(json!({ "type": "image", "body": url })).await;
        orch.receive(json!({ "type": "text", "body": "second" })).await;

        assert_eq!(orch.latest(MessageKind::Text), Some(ClipboardMessage::text("second")));
        assert_eq!(
            orch.latest(MessageKind::Image),
            Some(ClipboardMessage::image(ImagePayload::Encoded(url)))
        );
        assert_eq!(orch.latest(MessageKind::File), None);
    }

    // ===========================================
    // Upload Tests
    // ===========================================

    #[tokio::test]
    async fn text_upload_carries_device_id() {
        let dir = TempDir::new().unwrap();
        let (mut orch, mut rx) = orchestrator(dir.path());

        let wire = orch.upload(ClipboardMessage::text("copy me")).await.unwrap();

        assert_eq!(
            wire.to_value().unwrap(),
            json!({ "type": "text", "body": "copy me", "deviceId": "local" })
        );
        assert_eq!(drain(&mut rx), vec![OrchestratorEvent::Publish(wire)]);
        assert_eq!(orch.sent_messages(), vec![ClipboardMessage::text("copy me")]);
    }

    #[tokio::test]
    async fn encoded_image_upload_passes_through() {
        let dir = TempDir::new().unwrap();
        let (mut orch, _rx) = orchestrator(dir.path());
        let url = format!("{}AAAA", PNG_DATA_URL_PREFIX);

        let wire = orch
            .upload(ClipboardMessage::image(ImagePayload::Encoded(url.clone())))
            .await
            .unwrap();

        assert_eq!(wire.kind, MessageKind::Image);
        assert_eq!(wire.body, url);
    }

    #[tokio::test]
    async fn file_upload_reads_content() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("report.txt");
        std::fs::write(&source, b"quarterly").unwrap();
        let (mut orch, _rx) = orchestrator(dir.path());

        let wire = orch.upload(ClipboardMessage::file(&source)).await.unwrap();

        assert_eq!(wire.file_name.as_deref(), Some("report.txt"));
        assert_eq!(wire.decode_file_body().unwrap(), b"quarterly");
    }

    #[tokio::test]
    async fn missing_file_upload_is_abandoned() {
        let dir = TempDir::new().unwrap();
        let (mut orch, mut rx) = orchestrator(dir.path());

        let wire = orch
            .upload(ClipboardMessage::file(dir.path().join("gone.bin")))
            .await;

        assert!(wire.is_none());
        assert!(drain(&mut rx).is_empty());
        assert_eq!(orch.sent_messages().len(), 1);
    }

    #[tokio::test]
    async fn sent_history_is_bounded() {
        let dir = TempDir::new().unwrap();
        let (mut orch, _rx) = orchestrator(dir.path());

        for i in 0..8 {
            orch.upload(ClipboardMessage::text(format!("s{}", i))).await;
        }

        let sent = orch.sent_messages();
        assert_eq!(sent.len(), 5);
        assert_eq!(sent[0], ClipboardMessage::text("s3"));
    }

    #[test]
    fn sanitize_rules() {
        assert_eq!(sanitize_file_name("a.txt").as_deref(), Some("a.txt"));
        assert_eq!(sanitize_file_name("dir/a.txt").as_deref(), Some("a.txt"));
        assert_eq!(sanitize_file_name("C:\\Users\\me\\a.txt").as_deref(), Some("a.txt"));
        assert_eq!(sanitize_file_name(""), None);
        assert_eq!(sanitize_file_name("../"), None);
    }
}

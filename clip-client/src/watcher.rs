//! Clipboard watcher.
//!
//! Polls a [`ClipboardBackend`], detects changes in the text, image and file
//! slots, and emits typed [`WatcherEvent`]s on a channel. Programmatic
//! writes can be silenced so that content Uniclip itself placed on the
//! clipboard is never reported back as a local change.
//!
//! # Architecture
//!
//! ```text
//! start_watching() → poll task: sleep → poll_once() → next delay → sleep ...
//!                                          ↓
//!                                clip-core diff + EchoGuard
//!                                          ↓
//!                                  WatcherEvent channel
//! ```
//!
//! The image comparison adapts to read latency (see [`clip_core::diff`]); a
//! slow read both switches to sampling and stretches the next delay.
//!
//! Backend calls are synchronous and may block on the OS clipboard, so they
//! run on the blocking pool. Images are kept decoded to RGBA, which makes a
//! written data URL and the bitmap the OS hands back compare equal.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use clip_core::{
    file_changed, image_differs_exact, image_differs_sampled, text_changed, EchoGuard,
    ImageComparison, ImageDiffPolicy, DEFAULT_SAMPLE_COUNT,
};
use clip_types::{truncate, ClipboardMessage, ImagePayload};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::clipboard::{ClipboardBackend, ClipboardError};

/// Watcher timing and comparison settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatcherConfig {
    /// Poll interval while image reads are fast.
    pub min_interval: Duration,
    /// Image reads slower than this switch to sampled comparison.
    pub slow_read_threshold: Duration,
    /// Offsets inspected by the sampled comparison.
    pub sample_count: usize,
    /// Suppression window after a silenced write.
    pub silence_window: Duration,
    /// Suppression window after a file copy is detected.
    pub file_copy_silence: Duration,
}

impl WatcherConfig {
    fn image_policy(&self) -> ImageDiffPolicy {
        ImageDiffPolicy {
            slow_read_threshold: self.slow_read_threshold,
            min_interval: self.min_interval,
            sample_count: self.sample_count,
        }
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(500),
            slow_read_threshold: Duration::from_millis(200),
            sample_count: DEFAULT_SAMPLE_COUNT,
            silence_window: Duration::from_millis(500),
            file_copy_silence: Duration::from_millis(700),
        }
    }
}

/// A detected local clipboard change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatcherEvent {
    /// New text was copied.
    TextChanged(String),
    /// A new image was copied.
    ImageChanged(ImagePayload),
    /// A file was copied.
    FileChanged {
        /// Resolved path of the file.
        path: PathBuf,
        /// File name without directories.
        name: String,
    },
}

impl WatcherEvent {
    /// The clipboard message this event describes.
    pub fn into_message(self) -> ClipboardMessage {
        match self {
            Self::TextChanged(body) => ClipboardMessage::Text { body },
            Self::ImageChanged(payload) => ClipboardMessage::Image { payload },
            Self::FileChanged { path, name } => ClipboardMessage::File { path, name },
        }
    }
}

struct Detection {
    previous_text: String,
    previous_image: Option<ImagePayload>,
    previous_file: Option<String>,
    latest: Option<ClipboardMessage>,
    guard: EchoGuard,
    rng: StdRng,
}

struct Shared<B> {
    backend: Arc<B>,
    config: WatcherConfig,
    /// Serializes poll cycles and writes across their backend calls.
    cycle: AsyncMutex<()>,
    detection: Mutex<Detection>,
    events: mpsc::UnboundedSender<WatcherEvent>,
}

impl<B> Shared<B> {
    fn detection(&self) -> MutexGuard<'_, Detection> {
        self.detection.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One read of every clipboard slot.
struct Snapshot {
    file: Result<Option<String>, ClipboardError>,
    text: Result<String, ClipboardError>,
    image: Result<Option<ImagePayload>, ClipboardError>,
    image_read: Duration,
}

impl Snapshot {
    fn read<B: ClipboardBackend>(backend: &B) -> Self {
        let file = backend.read_file_path();
        let text = backend.read_text();
        let started = std::time::Instant::now();
        let image = backend.read_image();
        let image_read = started.elapsed();
        Self {
            file,
            text,
            image: image.map(|image| image.map(canonical_image)),
            image_read,
        }
    }
}

/// Adaptive differential poller over a clipboard backend.
pub struct ClipboardWatcher<B: ClipboardBackend> {
    shared: Arc<Shared<B>>,
    task: Option<JoinHandle<()>>,
}

impl<B: ClipboardBackend> ClipboardWatcher<B> {
    /// Create a watcher and the receiver for its events.
    ///
    /// The current clipboard contents are taken as the baseline, so whatever
    /// is on the clipboard at startup is not reported.
    pub fn new(
        backend: Arc<B>,
        config: WatcherConfig,
    ) -> (Self, mpsc::UnboundedReceiver<WatcherEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let detection = Detection {
            previous_text: backend.read_text().unwrap_or_default(),
            previous_image: backend.read_image().unwrap_or_default().map(canonical_image),
            previous_file: backend.read_file_path().unwrap_or_default(),
            latest: None,
            guard: EchoGuard::new(),
            rng: StdRng::from_entropy(),
        };
        let shared = Arc::new(Shared {
            backend,
            config,
            cycle: AsyncMutex::new(()),
            detection: Mutex::new(detection),
            events,
        });
        (Self { shared, task: None }, rx)
    }

    /// The watcher settings.
    pub fn config(&self) -> &WatcherConfig {
        &self.shared.config
    }

    /// Whether the poll task is running.
    pub fn is_watching(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Start the poll task. Does nothing if already watching.
    pub fn start_watching(&mut self) {
        if self.is_watching() {
            return;
        }
        let shared = Arc::clone(&self.shared);
        self.task = Some(tokio::spawn(async move {
            let mut delay = shared.config.min_interval;
            loop {
                tokio::time::sleep(delay).await;
                delay = poll(&shared).await;
            }
        }));
        debug!("Clipboard watcher started");
    }

    /// Stop the poll task. Does nothing if not watching.
    pub fn stop_watching(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("Clipboard watcher stopped");
        }
    }

    /// Run one detection cycle and return the delay before the next one.
    pub async fn poll_once(&self) -> Duration {
        poll(&self.shared).await
    }

    /// Write a text or image message to the clipboard.
    ///
    /// With `silence`, change notifications are suppressed for the
    /// configured window starting before the write. The stored baseline is
    /// updated to the written content either way, so the write is never
    /// reported once the window ends. File messages are not written.
    pub async fn write(&self, message: &ClipboardMessage, silence: bool) -> Result<(), ClipboardError> {
        if let ClipboardMessage::File { name, .. } = message {
            debug!(file = %name, "File messages are not written to the clipboard");
            return Ok(());
        }

        let _cycle = self.shared.cycle.lock().await;
        if silence {
            self.shared
                .detection()
                .guard
                .activate(now(), self.shared.config.silence_window);
        }

        let backend = Arc::clone(&self.shared.backend);
        let owned = message.clone();
        let written = tokio::task::spawn_blocking(move || -> Result<_, ClipboardError> {
            match owned {
                ClipboardMessage::Text { body } => {
                    backend.write_text(&body)?;
                    Ok(ClipboardMessage::Text { body })
                }
                ClipboardMessage::Image { payload } => {
                    backend.write_image(&payload)?;
                    Ok(ClipboardMessage::Image {
                        payload: canonical_image(payload),
                    })
                }
                file @ ClipboardMessage::File { .. } => Ok(file),
            }
        })
        .await
        .map_err(|e| ClipboardError::WriteFailed(e.to_string()))??;

        let mut detection = self.shared.detection();
        match written {
            ClipboardMessage::Text { body } => {
                debug!(text = %truncate(&body, 30), "Wrote text to clipboard");
                detection.previous_text = body;
            }
            ClipboardMessage::Image { payload } => {
                debug!("Wrote image to clipboard");
                detection.previous_image = Some(payload);
            }
            ClipboardMessage::File { .. } => {}
        }
        Ok(())
    }

    /// Whether change notifications are currently suppressed.
    pub fn is_silenced(&self) -> bool {
        self.shared.detection().guard.is_active(now())
    }

    /// The most recent locally detected clipboard message.
    pub fn latest_contents(&self) -> Option<ClipboardMessage> {
        self.shared.detection().latest.clone()
    }
}

impl<B: ClipboardBackend> Drop for ClipboardWatcher<B> {
    fn drop(&mut self) {
        self.stop_watching();
    }
}

fn now() -> std::time::Instant {
    Instant::now().into_std()
}

/// Decode to RGBA so baselines compare equal whatever form the backend uses.
fn canonical_image(image: ImagePayload) -> ImagePayload {
    match image {
        ImagePayload::Bitmap(_) => image,
        ImagePayload::Encoded(_) if image.is_empty() => image,
        ImagePayload::Encoded(_) => match image.to_bitmap() {
            Ok(bitmap) => ImagePayload::Bitmap(bitmap),
            Err(e) => {
                warn!(error = %e, "Keeping undecodable image as-is");
                image
            }
        },
    }
}

async fn poll<B: ClipboardBackend>(shared: &Shared<B>) -> Duration {
    let policy = shared.config.image_policy();
    let _cycle = shared.cycle.lock().await;

    let backend = Arc::clone(&shared.backend);
    let snapshot = match tokio::task::spawn_blocking(move || Snapshot::read(&*backend)).await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            warn!(error = %e, "Clipboard read task failed");
            return policy.min_interval;
        }
    };

    let mut detection = shared.detection();
    let mut changes = Vec::new();

    // File first, so its silence window covers the same cycle
    match snapshot.file {
        Ok(raw) => {
            let cleaned = raw.map(|p| p.trim_end_matches('\0').to_string());
            if file_changed(detection.previous_file.as_deref(), cleaned.as_deref()) {
                if let Some(path) = cleaned.as_deref().and_then(resolve_file_path) {
                    let name = file_name(&path);
                    changes.push(WatcherEvent::FileChanged { path, name });
                }
            }
            detection.previous_file = cleaned;
        }
        Err(e) => warn!(error = %e, "Failed to read clipboard file"),
    }

    // Text
    match snapshot.text {
        Ok(text) => {
            if text_changed(&detection.previous_text, &text) {
                changes.push(WatcherEvent::TextChanged(text.clone()));
            }
            detection.previous_text = text;
        }
        Err(e) => warn!(error = %e, "Failed to read clipboard text"),
    }

    // Image
    let (comparison, next_delay) = policy.strategy(snapshot.image_read);
    match snapshot.image {
        Ok(image) => {
            if image_changed(&mut detection, image.as_ref(), comparison, policy.sample_count) {
                if let Some(image) = image.clone() {
                    changes.push(WatcherEvent::ImageChanged(image));
                }
            }
            detection.previous_image = image;
        }
        Err(e) => warn!(error = %e, "Failed to read clipboard image"),
    }

    for change in changes {
        if detection.guard.is_active(now()) {
            debug!("Clipboard change silenced");
            continue;
        }
        if matches!(change, WatcherEvent::FileChanged { .. }) {
            // Copying a file also changes the text/image slots on some platforms
            detection.guard.activate(now(), shared.config.file_copy_silence);
        }
        detection.latest = Some(change.clone().into_message());
        if shared.events.send(change).is_err() {
            debug!("Watcher event receiver dropped");
        }
    }

    next_delay
}

fn image_changed(
    detection: &mut Detection,
    next: Option<&ImagePayload>,
    comparison: ImageComparison,
    sample_count: usize,
) -> bool {
    let Some(next) = next else {
        return false;
    };
    match (comparison, detection.previous_image.as_ref()) {
        (_, None) => !next.is_empty(),
        (ImageComparison::Exact, Some(previous)) => match image_differs_exact(previous, next) {
            Ok(differs) => differs,
            Err(e) => {
                warn!(error = %e, "Image comparison failed");
                false
            }
        },
        (ImageComparison::Sampled, Some(previous)) => {
            image_differs_sampled(
                previous.raw_bytes(),
                next.raw_bytes(),
                sample_count,
                &mut detection.rng,
            )
        }
    }
}

/// Resolve a platform file path or `file://` URL to a local path.
pub(crate) fn resolve_file_path(raw: &str) -> Option<PathBuf> {
    let raw = raw.trim_end_matches('\0');
    if raw.is_empty() {
        return None;
    }
    if raw.starts_with("file:") {
        return url::Url::parse(raw).ok()?.to_file_path().ok();
    }
    Some(PathBuf::from(raw))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

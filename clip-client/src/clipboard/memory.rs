//! In-memory clipboard.

use super::{ClipboardBackend, ClipboardError};
use clip_types::ImagePayload;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// A clipboard held in memory.
///
/// Clones share state, so a test can keep a handle to simulate user copies
/// while the watcher owns another.
#[derive(Debug, Default, Clone)]
pub struct MemoryClipboard {
    inner: Arc<Mutex<MemoryClipboardInner>>,
}

#[derive(Debug, Default)]
struct MemoryClipboardInner {
    text: String,
    image: Option<ImagePayload>,
    file_path: Option<String>,
    fail_reads: Option<String>,
    image_read_delay: Option<Duration>,
    bitmap_images: bool,
    writes: usize,
}

impl MemoryClipboard {
    /// Create an empty clipboard.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryClipboardInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Simulate the user copying text.
    pub fn set_text(&self, text: &str) {
        self.lock().text = text.to_string();
    }

    /// Simulate the user copying an image.
    pub fn set_image(&self, image: Option<ImagePayload>) {
        self.lock().image = image;
    }

    /// Simulate the user copying a file.
    pub fn set_file_path(&self, path: Option<&str>) {
        self.lock().file_path = path.map(str::to_string);
    }

    /// Make every read fail until cleared.
    pub fn fail_reads(&self, error: Option<&str>) {
        self.lock().fail_reads = error.map(str::to_string);
    }

    /// Make image reads block for `delay`, like a large OS clipboard image.
    pub fn set_image_read_delay(&self, delay: Option<Duration>) {
        self.lock().image_read_delay = delay;
    }

    /// Store written images as decoded bitmaps, the way OS clipboards do.
    pub fn store_images_as_bitmaps(&self, enabled: bool) {
        self.lock().bitmap_images = enabled;
    }

    /// Number of writes made through the backend.
    pub fn writes(&self) -> usize {
        self.lock().writes
    }

    /// Current text slot.
    pub fn text(&self) -> String {
        self.lock().text.clone()
    }

    /// Current image slot.
    pub fn image(&self) -> Option<ImagePayload> {
        self.lock().image.clone()
    }

    fn check_reads(inner: &MemoryClipboardInner) -> Result<(), ClipboardError> {
        match &inner.fail_reads {
            Some(error) => Err(ClipboardError::Unavailable(error.clone())),
            None => Ok(()),
        }
    }
}

impl ClipboardBackend for MemoryClipboard {
    fn read_text(&self) -> Result<String, ClipboardError> {
        let inner = self.lock();
        Self::check_reads(&inner)?;
        Ok(inner.text.clone())
    }

    fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        let mut inner = self.lock();
        inner.text = text.to_string();
        inner.writes += 1;
        Ok(())
    }

    fn read_image(&self) -> Result<Option<ImagePayload>, ClipboardError> {
        let delay = self.lock().image_read_delay;
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        let inner = self.lock();
        Self::check_reads(&inner)?;
        Ok(inner.image.clone())
    }

    fn write_image(&self, image: &ImagePayload) -> Result<(), ClipboardError> {
        let mut inner = self.lock();
        let image = if inner.bitmap_images {
            ImagePayload::Bitmap(image.to_bitmap()?)
        } else {
            image.clone()
        };
        inner.image = Some(image);
        inner.writes += 1;
        Ok(())
    }

    fn read_file_path(&self) -> Result<Option<String>, ClipboardError> {
        let inner = self.lock();
        Self::check_reads(&inner)?;
        Ok(inner.file_path.clone())
    }
}

//! OS clipboard via arboard.

use super::{ClipboardBackend, ClipboardError};
use arboard::{Clipboard, ImageData};
use clip_types::{Bitmap, ImagePayload};
use std::borrow::Cow;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// The system clipboard.
pub struct SystemClipboard {
    inner: Mutex<Clipboard>,
}

impl SystemClipboard {
    /// Open the system clipboard.
    pub fn new() -> Result<Self, ClipboardError> {
        let clipboard = Clipboard::new().map_err(|e| ClipboardError::Unavailable(e.to_string()))?;
        Ok(Self {
            inner: Mutex::new(clipboard),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Clipboard> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for SystemClipboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemClipboard").finish_non_exhaustive()
    }
}

impl ClipboardBackend for SystemClipboard {
    fn read_text(&self) -> Result<String, ClipboardError> {
        match self.lock().get_text() {
            Ok(text) => Ok(text),
            Err(arboard::Error::ContentNotAvailable) => Ok(String::new()),
            Err(e) => Err(ClipboardError::Unavailable(e.to_string())),
        }
    }

    fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        self.lock()
            .set_text(text.to_string())
            .map_err(|e| ClipboardError::WriteFailed(e.to_string()))
    }

    fn read_image(&self) -> Result<Option<ImagePayload>, ClipboardError> {
        match self.lock().get_image() {
            Ok(image) => {
                let bitmap = Bitmap::new(
                    image.width as u32,
                    image.height as u32,
                    image.bytes.into_owned(),
                )?;
                Ok(Some(ImagePayload::Bitmap(bitmap)))
            }
            Err(arboard::Error::ContentNotAvailable) => Ok(None),
            Err(e) => Err(ClipboardError::Unavailable(e.to_string())),
        }
    }

    fn write_image(&self, image: &ImagePayload) -> Result<(), ClipboardError> {
        let bitmap = image.to_bitmap()?;
        let data = ImageData {
            width: bitmap.width as usize,
            height: bitmap.height as usize,
            bytes: Cow::Owned(bitmap.rgba),
        };
        self.lock()
            .set_image(data)
            .map_err(|e| ClipboardError::WriteFailed(e.to_string()))
    }

    fn read_file_path(&self) -> Result<Option<String>, ClipboardError> {
        match self.lock().get().file_list() {
            Ok(files) => Ok(files
                .into_iter()
                .next()
                .map(|path| path.to_string_lossy().into_owned())),
            Err(arboard::Error::ContentNotAvailable) => Ok(None),
            Err(e) => Err(ClipboardError::Unavailable(e.to_string())),
        }
    }
}

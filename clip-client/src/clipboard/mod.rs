//! Clipboard backends.
//!
//! The watcher talks to the OS clipboard through [`ClipboardBackend`], which
//! exposes the three slots Uniclip syncs: text, image and a copied file path.
//! [`MemoryClipboard`] is an in-process implementation for tests and the
//! demo mode; `SystemClipboard` (feature `system-clipboard`) wraps arboard.

mod memory;
#[cfg(feature = "system-clipboard")]
mod system;

pub use memory::MemoryClipboard;
#[cfg(feature = "system-clipboard")]
pub use system::SystemClipboard;

use clip_types::{ImageError, ImagePayload};
use thiserror::Error;

/// Clipboard access errors.
#[derive(Debug, Error)]
pub enum ClipboardError {
    /// The clipboard could not be opened or read.
    #[error("clipboard unavailable: {0}")]
    Unavailable(String),

    /// The content could not be written.
    #[error("clipboard write failed: {0}")]
    WriteFailed(String),

    /// Image conversion failed.
    #[error("clipboard image error: {0}")]
    Image(#[from] ImageError),
}

/// OS-level clipboard access.
///
/// Methods are synchronous and may block; the watcher calls them from the
/// blocking pool. An empty slot reads as an empty string or `None`, never as
/// an error.
pub trait ClipboardBackend: Send + Sync + 'static {
    /// Read the text slot.
    fn read_text(&self) -> Result<String, ClipboardError>;

    /// Replace the clipboard with `text`.
    fn write_text(&self, text: &str) -> Result<(), ClipboardError>;

    /// Read the image slot.
    fn read_image(&self) -> Result<Option<ImagePayload>, ClipboardError>;

    /// Replace the clipboard with `image`.
    fn write_image(&self, image: &ImagePayload) -> Result<(), ClipboardError>;

    /// Read the path of a copied file, as the platform reports it.
    ///
    /// The value may be a `file://` URL or carry trailing NUL characters.
    fn read_file_path(&self) -> Result<Option<String>, ClipboardError>;
}

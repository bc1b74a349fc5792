//! The typed clipboard model.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::ImagePayload;

/// Default length used by [`truncate`] for log lines.
const TRUNCATE_DEFAULT_LENGTH: usize = 30;

/// One clipboard item, local or received.
///
/// The variant is fixed at construction; consumers `match` on it instead of
/// inspecting a type tag.
#[derive(Clone, PartialEq, Eq)]
pub enum ClipboardMessage {
    /// Plain text.
    Text {
        /// The text content.
        body: String,
    },
    /// An image.
    Image {
        /// The image data.
        payload: ImagePayload,
    },
    /// A file on the local file system.
    File {
        /// Full path (or `file://` URL) of the file.
        path: PathBuf,
        /// File name without directories.
        name: String,
    },
}

impl ClipboardMessage {
    /// Create a text message.
    pub fn text(body: impl Into<String>) -> Self {
        Self::Text { body: body.into() }
    }

    /// Create an image message.
    pub fn image(payload: ImagePayload) -> Self {
        Self::Image { payload }
    }

    /// Create a file message, deriving the name from the path.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::File { path, name }
    }

    /// The kind of this message.
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Text { .. } => MessageKind::Text,
            Self::Image { .. } => MessageKind::Image,
            Self::File { .. } => MessageKind::File,
        }
    }

    /// Short human-readable summary for logs and menus.
    pub fn summary(&self) -> String {
        match self {
            Self::Text { body } => truncate(body, TRUNCATE_DEFAULT_LENGTH),
            Self::Image { .. } => "an image".to_string(),
            Self::File { name, .. } => name.clone(),
        }
    }
}

impl fmt::Debug for ClipboardMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text { body } => f
                .debug_struct("Text")
                .field("body", &format!("[{} chars]", body.chars().count()))
                .finish(),
            Self::Image { payload } => f.debug_struct("Image").field("payload", payload).finish(),
            Self::File { path, name } => f
                .debug_struct("File")
                .field("path", path)
                .field("name", name)
                .finish(),
        }
    }
}

/// The three clipboard channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Plain text.
    Text,
    /// Image.
    Image,
    /// File.
    File,
}

impl MessageKind {
    /// The wire tag for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::File => "file",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shorten `input` to at most `length` characters, appending `...` if cut.
pub fn truncate(input: &str, length: usize) -> String {
    if input.chars().count() > length {
        let head: String = input.chars().take(length).collect();
        format!("{}...", head)
    } else {
        input.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_message_derives_name() {
        let msg = ClipboardMessage::file("/home/me/Documents/report.pdf");
        match msg {
            ClipboardMessage::File { name, .. } => assert_eq!(name, "report.pdf"),
            other => panic!("Expected File, got {:?}", other),
        }
    }

    #[test]
    fn kind_matches_variant() {
        assert_eq!(ClipboardMessage::text("hi").kind(), MessageKind::Text);
        assert_eq!(ClipboardMessage::file("/a/b").kind(), MessageKind::File);
        assert_eq!(MessageKind::Image.to_string(), "image");
    }

    #[test]
    fn truncate_cuts_long_input() {
        assert_eq!(truncate("hello", 30), "hello");
        assert_eq!(truncate("abcdefgh", 3), "abc...");
        // multi-byte characters are counted, not bytes
        assert_eq!(truncate("ääää", 2), "ää...");
    }

    #[test]
    fn text_debug_redacts_body() {
        let debug = format!("{:?}", ClipboardMessage::text("my password"));
        assert!(!debug.contains("password"));
        assert!(debug.contains("[11 chars]"));
    }
}

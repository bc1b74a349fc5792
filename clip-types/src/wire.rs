//! Wire representation of clipboard messages.
//!
//! Peers exchange JSON objects of the shape
//! `{ "type": "text"|"image"|"file", "body": string, "fileName"?: string, "deviceId"?: string }`.
//! Text bodies are plain strings, image bodies are PNG data URLs and file
//! bodies are the base64-encoded file content.

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{ClipboardMessage, DeviceId, ImagePayload, MessageKind, WireError};

/// A validated wire message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireMessage {
    /// Message type tag.
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// Payload, interpreted according to `kind`.
    pub body: String,
    /// Sender-provided file name (file messages only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    /// Originating device (set on text messages).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<DeviceId>,
}

/// Unvalidated shape used for parsing; the tag is checked by hand so that
/// unknown tags produce [`WireError::UnsupportedType`].
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawWireMessage {
    #[serde(rename = "type")]
    kind: String,
    body: String,
    #[serde(default)]
    file_name: Option<String>,
    #[serde(default)]
    device_id: Option<String>,
}

impl WireMessage {
    /// Build a text message tagged with the sending device.
    pub fn text(body: impl Into<String>, device_id: DeviceId) -> Self {
        Self {
            kind: MessageKind::Text,
            body: body.into(),
            file_name: None,
            device_id: Some(device_id),
        }
    }

    /// Build an image message from a PNG data URL.
    pub fn image(data_url: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Image,
            body: data_url.into(),
            file_name: None,
            device_id: None,
        }
    }

    /// Build a file message from raw file content.
    pub fn file(file_name: impl Into<String>, content: &[u8]) -> Self {
        Self {
            kind: MessageKind::File,
            body: STANDARD.encode(content),
            file_name: Some(file_name.into()),
            device_id: None,
        }
    }

    /// Validate a JSON value against the wire shape.
    pub fn from_value(value: Value) -> Result<Self, WireError> {
        let raw: RawWireMessage = serde_json::from_value(value).map_err(WireError::Malformed)?;
        let kind = match raw.kind.as_str() {
            "text" => MessageKind::Text,
            "image" => MessageKind::Image,
            "file" => MessageKind::File,
            _ => return Err(WireError::UnsupportedType(raw.kind)),
        };
        if kind == MessageKind::File && raw.file_name.as_deref().map_or(true, str::is_empty) {
            return Err(WireError::MissingField {
                kind: "file",
                field: "fileName",
            });
        }
        Ok(Self {
            kind,
            body: raw.body,
            file_name: raw.file_name,
            device_id: raw.device_id.and_then(|id| DeviceId::new(id)),
        })
    }

    /// Serialize to a JSON value.
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// Decode the base64 body of a file message.
    pub fn decode_file_body(&self) -> Result<Vec<u8>, WireError> {
        Ok(STANDARD.decode(self.body.as_bytes())?)
    }

    /// Convert a text or image message into the typed model.
    ///
    /// File messages need to be persisted first, so they yield
    /// [`WireError::UnsupportedType`] here.
    pub fn into_inline_message(self) -> Result<ClipboardMessage, WireError> {
        match self.kind {
            MessageKind::Text => Ok(ClipboardMessage::Text { body: self.body }),
            MessageKind::Image => Ok(ClipboardMessage::Image {
                payload: ImagePayload::Encoded(self.body),
            }),
            MessageKind::File => Err(WireError::UnsupportedType("file".into())),
        }
    }
}

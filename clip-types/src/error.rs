//! Error types for Uniclip messages.

use thiserror::Error;

/// Errors raised while validating or converting a wire message.
#[derive(Debug, Error)]
pub enum WireError {
    /// The JSON value does not have the wire message shape.
    #[error("malformed wire message: {0}")]
    Malformed(#[source] serde_json::Error),

    /// The `type` field holds an unknown tag.
    #[error("unsupported message type: {0}")]
    UnsupportedType(String),

    /// A field required by the message type is missing.
    #[error("missing field `{field}` for {kind} message")]
    MissingField {
        /// The message type tag.
        kind: &'static str,
        /// The missing field name.
        field: &'static str,
    },

    /// The body is not valid base64.
    #[error("invalid base64 body: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    /// The image body could not be interpreted.
    #[error("invalid image body: {0}")]
    Image(#[from] ImageError),
}

/// Errors raised while encoding or decoding clipboard images.
#[derive(Debug, Error)]
pub enum ImageError {
    /// Bitmap dimensions do not match the pixel buffer.
    #[error("bitmap {width}x{height} does not match {len} bytes of RGBA data")]
    DimensionMismatch {
        /// Bitmap width in pixels.
        width: u32,
        /// Bitmap height in pixels.
        height: u32,
        /// Length of the pixel buffer.
        len: usize,
    },

    /// The data URL does not carry a base64 PNG.
    #[error("not a PNG data URL")]
    NotPngDataUrl,

    /// The base64 section of a data URL is invalid.
    #[error("invalid base64 image data: {0}")]
    Base64(#[from] base64::DecodeError),

    /// PNG encoding or decoding failed.
    #[error("image codec error: {0}")]
    Codec(#[from] image::ImageError),
}

//! # clip-types
//!
//! Clipboard message and wire format types for Uniclip.
//!
//! This crate provides the foundational types used across all Uniclip crates:
//! - [`DeviceId`], [`TransferId`] - Identity types
//! - [`ClipboardMessage`], [`ImagePayload`] - The typed clipboard model
//! - [`WireMessage`] - The JSON shape exchanged between peers
//! - [`WireError`], [`ImageError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod ids;
mod image;
mod message;
mod wire;

pub use error::{ImageError, WireError};
pub use ids::{DeviceId, TransferId};
pub use image::{Bitmap, ImagePayload, PNG_DATA_URL_PREFIX};
pub use message::{truncate, ClipboardMessage, MessageKind};
pub use wire::WireMessage;

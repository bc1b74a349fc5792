//! Transport abstraction for Uniclip.
//!
//! This module provides a pluggable pub/sub layer that abstracts the
//! underlying network client (a real pub/sub network, mock for testing).
//!
//! # Design
//!
//! The transport trait is async and subscription-oriented:
//! - `is_stored_stream()` asks whether the stream keeps history
//! - `connect()` authenticates and subscribes, yielding a [`Subscription`]
//! - `publish()` sends one JSON message to the stream
//! - `disconnect()` unsubscribes and tears the client down
//!
//! # Example
//!
//! ```ignore
//! let transport = MockTransport::new();
//! let mut sub = transport
//!     .connect("key", "0xabc/clipboard", SubscribeOptions::default())
//!     .await?;
//! transport.publish("0xabc/clipboard", &json!({"type": "text", "body": "hi"})).await?;
//! let inbound = sub.messages.recv().await;
//! ```

mod mock;

pub use mock::MockTransport;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

/// Transport errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The credential was rejected. Retrying cannot help.
    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    /// The client was destroyed while connecting. Retrying cannot help.
    #[error("client destroyed")]
    ClientDestroyed,

    /// Connection or subscription failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Not connected.
    #[error("not connected")]
    NotConnected,

    /// Publish failed.
    #[error("publish failed: {0}")]
    PublishFailed(String),
}

impl TransportError {
    /// Whether this error can never succeed on retry.
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::InvalidCredential(_) | Self::ClientDestroyed)
    }
}

/// Options passed when subscribing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscribeOptions {
    /// Ask the network to replay this many stored messages.
    pub resend_last: Option<u32>,
}

/// A live subscription.
///
/// Inbound messages arrive on `messages` exactly as the network delivered
/// them; the channel closes when the transport drops the subscription.
pub struct Subscription {
    /// Identifier used to unsubscribe.
    pub id: String,
    /// Inbound JSON messages.
    pub messages: mpsc::UnboundedReceiver<Value>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// Transport trait for the pub/sub network.
///
/// Implementations handle the underlying client (a real pub/sub network,
/// mock, etc).
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Whether the stream is backed by storage (so history can be replayed).
    async fn is_stored_stream(&self, stream: &str) -> Result<bool, TransportError>;

    /// Authenticate with `credential` and subscribe to `stream`.
    async fn connect(
        &self,
        credential: &str,
        stream: &str,
        options: SubscribeOptions,
    ) -> Result<Subscription, TransportError>;

    /// Publish one message to `stream`.
    async fn publish(&self, stream: &str, message: &Value) -> Result<(), TransportError>;

    /// Unsubscribe and tear the client down.
    async fn disconnect(&self, subscription_id: &str) -> Result<(), TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permanent_classification() {
        assert!(TransportError::InvalidCredential("bad".into()).is_permanent());
        assert!(TransportError::ClientDestroyed.is_permanent());
        assert!(!TransportError::ConnectionFailed("dns".into()).is_permanent());
        assert!(!TransportError::NotConnected.is_permanent());
    }

    #[test]
    fn subscription_debug_omits_channel() {
        let (_tx, rx) = mpsc::unbounded_channel();
        let sub = Subscription {
            id: "sub-1".into(),
            messages: rx,
        };
        let debug = format!("{:?}", sub);
        assert!(debug.contains("sub-1"));
    }
}

//! Mock transport for testing.
//!
//! Allows scripting connect failures, injecting inbound messages and
//! capturing published messages for verification.

use super::{SubscribeOptions, Subscription, Transport, TransportError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Mock transport for testing.
///
/// Clones share state, so a test can keep one handle while the connection
/// controller owns another.
#[derive(Debug, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

#[derive(Debug, Default)]
struct MockTransportInner {
    connect_calls: u32,
    last_options: Option<SubscribeOptions>,
    last_credential: Option<String>,
    stored_streams: HashSet<String>,
    connect_failures: VecDeque<TransportError>,
    fail_all_connects: Option<TransportError>,
    connect_delay: Option<Duration>,
    fail_next_publish: Option<String>,
    reflect_publishes: bool,
    subscribers: HashMap<String, mpsc::UnboundedSender<Value>>,
    published: Vec<(String, Value)>,
    disconnected: Vec<String>,
}

impl MockTransport {
    /// Create a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockTransportInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Deliver every published message back to the live subscriptions.
    ///
    /// This mirrors a real pub/sub network, where a device receives its own
    /// publications.
    pub fn with_reflection(self) -> Self {
        self.lock().reflect_publishes = true;
        self
    }

    /// Mark a stream as storage-backed.
    pub fn mark_stored(&self, stream: &str) {
        self.lock().stored_streams.insert(stream.to_string());
    }

    /// Cause the next connect() to fail with the given error.
    ///
    /// Calls queue up: three calls fail the next three connects.
    pub fn fail_next_connect(&self, error: TransportError) {
        self.lock().connect_failures.push_back(error);
    }

    /// Cause every connect() to fail with the given error until cleared.
    pub fn fail_all_connects(&self, error: Option<TransportError>) {
        self.lock().fail_all_connects = error;
    }

    /// Make each connect() take `delay` before answering.
    pub fn set_connect_delay(&self, delay: Option<Duration>) {
        self.lock().connect_delay = delay;
    }

    /// Cause the next publish() to fail with the given error.
    pub fn fail_next_publish(&self, error: &str) {
        self.lock().fail_next_publish = Some(error.to_string());
    }

    /// Push a message to every live subscription. Returns how many received it.
    pub fn inject(&self, message: Value) -> usize {
        let inner = self.lock();
        inner
            .subscribers
            .values()
            .filter(|tx| tx.send(message.clone()).is_ok())
            .count()
    }

    /// Number of connect() calls made so far.
    pub fn connect_calls(&self) -> u32 {
        self.lock().connect_calls
    }

    /// Options passed to the most recent connect().
    pub fn last_options(&self) -> Option<SubscribeOptions> {
        self.lock().last_options
    }

    /// Credential passed to the most recent connect().
    pub fn last_credential(&self) -> Option<String> {
        self.lock().last_credential.clone()
    }

    /// Get all messages that were published, with their stream.
    pub fn published(&self) -> Vec<(String, Value)> {
        self.lock().published.clone()
    }

    /// Get the last message that was published.
    pub fn last_published(&self) -> Option<Value> {
        self.lock().published.last().map(|(_, v)| v.clone())
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    /// Subscription ids that were disconnected.
    pub fn disconnected(&self) -> Vec<String> {
        self.lock().disconnected.clone()
    }

    /// Clear all state (scripts, messages, subscriptions).
    pub fn reset(&self) {
        *self.lock() = MockTransportInner::default();
    }
}

impl Clone for MockTransport {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn is_stored_stream(&self, stream: &str) -> Result<bool, TransportError> {
        Ok(self.lock().stored_streams.contains(stream))
    }

    async fn connect(
        &self,
        credential: &str,
        _stream: &str,
        options: SubscribeOptions,
    ) -> Result<Subscription, TransportError> {
        let delay = {
            let mut inner = self.lock();
            inner.connect_calls += 1;
            inner.last_options = Some(options);
            inner.last_credential = Some(credential.to_string());
            inner.connect_delay
        };

        // Never hold the lock across an await
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut inner = self.lock();

        // Check for forced failure
        if let Some(error) = inner.connect_failures.pop_front() {
            return Err(error);
        }
        if let Some(error) = inner.fail_all_connects.clone() {
            return Err(error);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4().to_string();
        inner.subscribers.insert(id.clone(), tx);
        Ok(Subscription { id, messages: rx })
    }

    async fn publish(&self, stream: &str, message: &Value) -> Result<(), TransportError> {
        let mut inner = self.lock();

        if inner.subscribers.is_empty() {
            return Err(TransportError::NotConnected);
        }

        // Check for forced failure
        if let Some(error) = inner.fail_next_publish.take() {
            return Err(TransportError::PublishFailed(error));
        }

        inner.published.push((stream.to_string(), message.clone()));
        if inner.reflect_publishes {
            for tx in inner.subscribers.values() {
                let _ = tx.send(message.clone());
            }
        }
        Ok(())
    }

    async fn disconnect(&self, subscription_id: &str) -> Result<(), TransportError> {
        let mut inner = self.lock();
        inner.subscribers.remove(subscription_id);
        inner.disconnected.push(subscription_id.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ===========================================
    // MockTransport Basic Tests
    // ===========================================

    #[tokio::test]
    async fn mock_transport_connects() {
        let transport = MockTransport::new();
        assert_eq!(transport.subscriber_count(), 0);

        let sub = transport
            .connect("key", "stream", SubscribeOptions::default())
            .await
            .unwrap();

        assert!(!sub.id.is_empty());
        assert_eq!(transport.subscriber_count(), 1);
        assert_eq!(transport.connect_calls(), 1);
        assert_eq!(transport.last_credential(), Some("key".to_string()));
    }

    #[tokio::test]
    async fn mock_transport_records_publishes() {
        let transport = MockTransport::new();
        let _sub = transport
            .connect("key", "stream", SubscribeOptions::default())
            .await
            .unwrap();

        transport.publish("stream", &json!({"n": 1})).await.unwrap();
        transport.publish("stream", &json!({"n": 2})).await.unwrap();

        let published = transport.published();
        assert_eq!(published.len(), 2);
        assert_eq!(published[0], ("stream".to_string(), json!({"n": 1})));
        assert_eq!(transport.last_published(), Some(json!({"n": 2})));
    }

    #[tokio::test]
    async fn mock_transport_delivers_injected_messages() {
        let transport = MockTransport::new();
        let mut sub = transport
            .connect("key", "stream", SubscribeOptions::default())
            .await
            .unwrap();

        assert_eq!(transport.inject(json!({"hello": "world"})), 1);

        let received = sub.messages.recv().await.unwrap();
        assert_eq!(received, json!({"hello": "world"}));
    }

    #[tokio::test]
    async fn mock_transport_stored_streams() {
        let transport = MockTransport::new();
        assert!(!transport.is_stored_stream("s").await.unwrap());
        transport.mark_stored("s");
        assert!(transport.is_stored_stream("s").await.unwrap());
    }

    // ===========================================
    // Failure Injection Tests
    // ===========================================

    #[tokio::test]
    async fn mock_transport_fail_next_connect() {
        let transport = MockTransport::new();
        transport.fail_next_connect(TransportError::ConnectionFailed("refused".into()));

        let result = transport
            .connect("key", "stream", SubscribeOptions::default())
            .await;
        assert!(matches!(result, Err(TransportError::ConnectionFailed(_))));

        // Next connect should succeed
        let result = transport
            .connect("key", "stream", SubscribeOptions::default())
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn mock_transport_fail_all_connects() {
        let transport = MockTransport::new();
        transport.fail_all_connects(Some(TransportError::ClientDestroyed));

        for _ in 0..3 {
            let result = transport
                .connect("key", "stream", SubscribeOptions::default())
                .await;
            assert_eq!(result.unwrap_err(), TransportError::ClientDestroyed);
        }

        transport.fail_all_connects(None);
        assert!(transport
            .connect("key", "stream", SubscribeOptions::default())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn mock_transport_publish_without_subscription_fails() {
        let transport = MockTransport::new();
        let result = transport.publish("stream", &json!({})).await;
        assert!(matches!(result, Err(TransportError::NotConnected)));
    }

    #[tokio::test]
    async fn mock_transport_fail_next_publish() {
        let transport = MockTransport::new();
        let _sub = transport
            .connect("key", "stream", SubscribeOptions::default())
            .await
            .unwrap();
        transport.fail_next_publish("quota");

        let result = transport.publish("stream", &json!({})).await;
        assert!(matches!(result, Err(TransportError::PublishFailed(_))));
        assert!(transport.publish("stream", &json!({})).await.is_ok());
    }

    // ===========================================
    // Reflection / Disconnect Tests
    // ===========================================

    #[tokio::test]
    async fn reflection_echoes_own_publishes() {
        let transport = MockTransport::new().with_reflection();
        let mut sub = transport
            .connect("key", "stream", SubscribeOptions::default())
            .await
            .unwrap();

        transport.publish("stream", &json!({"x": 1})).await.unwrap();
        assert_eq!(sub.messages.recv().await.unwrap(), json!({"x": 1}));
    }

    #[tokio::test]
    async fn disconnect_closes_subscription() {
        let transport = MockTransport::new();
        let mut sub = transport
            .connect("key", "stream", SubscribeOptions::default())
            .await
            .unwrap();

        transport.disconnect(&sub.id).await.unwrap();

        assert_eq!(transport.subscriber_count(), 0);
        assert_eq!(transport.disconnected(), vec![sub.id.clone()]);
        assert!(sub.messages.recv().await.is_none());
    }

    #[tokio::test]
    async fn mock_transport_clone_shares_state() {
        let transport1 = MockTransport::new();
        let transport2 = transport1.clone();

        let _sub = transport1
            .connect("key", "stream", SubscribeOptions::default())
            .await
            .unwrap();
        assert_eq!(transport2.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn mock_transport_reset() {
        let transport = MockTransport::new();
        let _sub = transport
            .connect("key", "stream", SubscribeOptions::default())
            .await
            .unwrap();
        transport.publish("stream", &json!({})).await.unwrap();

        transport.reset();

        assert_eq!(transport.subscriber_count(), 0);
        assert!(transport.published().is_empty());
        assert_eq!(transport.connect_calls(), 0);
    }
}

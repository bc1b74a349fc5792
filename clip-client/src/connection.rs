//! ConnectionController - the connection lifecycle for Uniclip.
//!
//! This module provides [`ConnectionController`], which owns the single
//! pub/sub connection: connecting with retries until a wall-clock
//! budget runs out, cancelling a connect in progress, publishing, and relaying
//! inbound messages as [`ConnectionEvent`]s.
//!
//! # Architecture
//!
//! The controller uses the pure state machine from clip-core for the
//! lifecycle logic and interprets its actions to perform the actual I/O via
//! the [`Transport`] trait.
//!
//! ```text
//! AppContext → ConnectionController → Transport → Network
//!                      ↓
//!            clip-core (pure state machine)
//! ```
//!
//! `connect` and `disconnect` are serialized by a lifecycle lock; `publish`
//! and message forwarding never take it. `disconnect` raises a halt flag
//! before queueing on the lock, so a connect stuck in its retry loop gives
//! up promptly.
//!
//! # Example
//!
//! ```ignore
//! let (controller, mut events) = ConnectionController::new(config, MockTransport::new());
//! controller.connect().await?;
//! controller.publish(&json!({"type": "text", "body": "hi"})).await?;
//! while let Some(event) = events.recv().await { /* ... */ }
//! ```

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use clip_core::{Action, ConnectionState, Event, Failure, LifecycleEvent, RetryPolicy};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::transport::{SubscribeOptions, Transport, TransportError};

/// Errors returned by [`ConnectionController::connect`].
#[derive(Debug, Error)]
pub enum ConnectError {
    /// A non-retryable error; the configuration must change.
    #[error("connection refused permanently: {0}")]
    Permanent(#[source] TransportError),

    /// The connect budget elapsed, whether attempts kept failing or hung.
    #[error("connection timed out")]
    Timeout,
}

/// Errors returned by [`ConnectionController::publish`].
#[derive(Debug, Error)]
pub enum PublishError {
    /// Publish called while not connected.
    #[error("publish called while not connected")]
    NotReady,

    /// The transport rejected the message.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Events surfaced by the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// Subscribed to the stream.
    Connected,
    /// Disconnected on request.
    Disconnected,
    /// An inbound message, exactly as the network delivered it.
    Message(Value),
}

/// Configuration for the [`ConnectionController`].
#[derive(Clone)]
pub struct ConnectionConfig {
    /// Credential used to authenticate with the network.
    pub credential: String,
    /// Stream to subscribe and publish to.
    pub stream: String,
    /// Retry and timeout settings.
    pub policy: RetryPolicy,
    /// Stored messages to replay on subscribe, for storage-backed streams.
    pub resend_last: u32,
}

impl ConnectionConfig {
    /// Create a configuration with the default policy.
    pub fn new(credential: impl Into<String>, stream: impl Into<String>) -> Self {
        Self {
            credential: credential.into(),
            stream: stream.into(),
            policy: RetryPolicy::default(),
            resend_last: 10,
        }
    }

    /// Set the retry policy.
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set how many stored messages to replay.
    pub fn with_resend_last(mut self, count: u32) -> Self {
        self.resend_last = count;
        self
    }
}

impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("credential", &"[REDACTED]")
            .field("stream", &self.stream)
            .field("policy", &self.policy)
            .field("resend_last", &self.resend_last)
            .finish()
    }
}

struct Session {
    subscription_id: String,
    forwarder: JoinHandle<()>,
}

enum AttemptError {
    Deadline,
    Transport(TransportError),
}

/// Owner of the pub/sub connection.
pub struct ConnectionController<T: Transport> {
    config: ConnectionConfig,
    transport: T,
    state: Mutex<ConnectionState>,
    lifecycle: Mutex<()>,
    session: Mutex<Option<Session>>,
    halt: AtomicBool,
    halt_notify: Notify,
    attempts: AtomicU32,
    events: mpsc::UnboundedSender<ConnectionEvent>,
}

impl<T: Transport> ConnectionController<T> {
    /// Create a controller and the receiver for its events.
    pub fn new(
        config: ConnectionConfig,
        transport: T,
    ) -> (Self, mpsc::UnboundedReceiver<ConnectionEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let controller = Self {
            config,
            transport,
            state: Mutex::new(ConnectionState::new()),
            lifecycle: Mutex::new(()),
            session: Mutex::new(None),
            halt: AtomicBool::new(false),
            halt_notify: Notify::new(),
            attempts: AtomicU32::new(0),
            events,
        };
        (controller, rx)
    }

    /// Connect with the configured timeout.
    pub async fn connect(&self) -> Result<(), ConnectError> {
        self.connect_with_timeout(self.config.policy.timeout).await
    }

    /// Connect, giving up after `timeout`.
    ///
    /// Returns `Ok(())` when connected, when already connected, and when a
    /// concurrent [`disconnect`](Self::disconnect) halted the attempt (the
    /// state is then Disconnected).
    pub async fn connect_with_timeout(&self, timeout: Duration) -> Result<(), ConnectError> {
        let deadline = Instant::now() + timeout;
        debug!(stream = %self.config.stream, "Waiting for the connection lock");
        let _guard = self.lifecycle.lock().await;

        if self.state.lock().await.is_connected() {
            debug!("Already connected");
            return Ok(());
        }
        self.halt.store(false, Ordering::SeqCst);
        self.attempts.store(0, Ordering::SeqCst);

        let mut last_error: Option<TransportError> = None;
        let mut actions = self.apply(Event::ConnectRequested).await;

        loop {
            let mut next = None;
            for action in actions {
                match action {
                    Action::Attempt { attempt } => {
                        if self.is_halted() {
                            next = Some(Event::Halted);
                            continue;
                        }
                        self.attempts.store(attempt, Ordering::SeqCst);
                        info!(attempt, stream = %self.config.stream, "Connecting");
                        next = Some(match self.attempt(deadline).await {
                            Ok(()) => Event::AttemptSucceeded,
                            Err(AttemptError::Deadline) => Event::TimedOut,
                            Err(AttemptError::Transport(e)) => {
                                warn!(attempt, error = %e, "Connection attempt failed");
                                let event = Event::AttemptFailed {
                                    error: e.to_string(),
                                    permanent: e.is_permanent(),
                                };
                                last_error = Some(e);
                                event
                            }
                        });
                    }
                    Action::WaitRetry { delay } => {
                        self.wait_retry(delay, deadline).await;
                        next = Some(if Instant::now() >= deadline {
                            Event::TimedOut
                        } else if self.is_halted() {
                            Event::Halted
                        } else {
                            Event::RetryTimer
                        });
                    }
                    Action::EmitEvent(LifecycleEvent::Connected) => {
                        info!(stream = %self.config.stream, "Connected");
                        self.emit(ConnectionEvent::Connected);
                        return Ok(());
                    }
                    Action::Fail(failure) => {
                        return Err(self.fail(failure, last_error.take()).await);
                    }
                    Action::Teardown | Action::EmitEvent(LifecycleEvent::Disconnected) => {}
                }
            }

            match next {
                Some(event) => actions = self.apply(event).await,
                None => {
                    debug!("Connecting halted");
                    return Ok(());
                }
            }
        }
    }

    /// Disconnect, cancelling any connect in progress.
    ///
    /// Teardown errors are logged, not returned.
    pub async fn disconnect(&self) {
        self.halt.store(true, Ordering::SeqCst);
        self.halt_notify.notify_waiters();

        let _guard = self.lifecycle.lock().await;
        debug!("Lock acquired by disconnect");

        let actions = self.apply(Event::DisconnectRequested).await;
        for action in actions {
            match action {
                Action::Teardown => self.teardown().await,
                Action::EmitEvent(LifecycleEvent::Disconnected) => {
                    info!(stream = %self.config.stream, "Disconnected");
                    self.emit(ConnectionEvent::Disconnected);
                }
                _ => {}
            }
        }
    }

    /// React to an external suspend signal.
    pub async fn suspend(&self) {
        debug!("Suspend requested");
        self.disconnect().await;
    }

    /// Publish one message to the stream.
    pub async fn publish(&self, message: &Value) -> Result<(), PublishError> {
        if !self.is_connected().await {
            return Err(PublishError::NotReady);
        }
        self.transport.publish(&self.config.stream, message).await?;
        Ok(())
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> ConnectionState {
        self.state.lock().await.clone()
    }

    /// Check if connected.
    pub async fn is_connected(&self) -> bool {
        self.state.lock().await.is_connected()
    }

    /// Attempts made by the last or current connect call.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// The stream this controller publishes to.
    pub fn stream(&self) -> &str {
        &self.config.stream
    }

    /// Get a reference to the underlying transport (for testing).
    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn is_halted(&self) -> bool {
        self.halt.load(Ordering::SeqCst)
    }

    fn emit(&self, event: ConnectionEvent) {
        if self.events.send(event).is_err() {
            debug!("Connection event receiver dropped");
        }
    }

    async fn apply(&self, event: Event) -> Vec<Action> {
        let mut state = self.state.lock().await;
        let (new_state, actions) = state.clone().on_event(event, &self.config.policy);
        *state = new_state;
        actions
    }

    async fn attempt(&self, deadline: Instant) -> Result<(), AttemptError> {
        let subscribe = async {
            let stored = self.transport.is_stored_stream(&self.config.stream).await?;
            debug!(stored, "Checked stream storage");
            let options = SubscribeOptions {
                resend_last: stored.then_some(self.config.resend_last),
            };
            self.transport
                .connect(&self.config.credential, &self.config.stream, options)
                .await
        };

        let mut subscription = match tokio::time::timeout_at(deadline, subscribe).await {
            Ok(Ok(subscription)) => subscription,
            Ok(Err(e)) => return Err(AttemptError::Transport(e)),
            Err(_) => return Err(AttemptError::Deadline),
        };

        let events = self.events.clone();
        let subscription_id = subscription.id.clone();
        let forwarder = tokio::spawn(async move {
            while let Some(message) = subscription.messages.recv().await {
                if events.send(ConnectionEvent::Message(message)).is_err() {
                    break;
                }
            }
        });

        *self.session.lock().await = Some(Session {
            subscription_id,
            forwarder,
        });
        Ok(())
    }

    async fn wait_retry(&self, delay: Duration, deadline: Instant) {
        let wake_at = (Instant::now() + delay).min(deadline);
        let halted = self.halt_notify.notified();
        tokio::pin!(halted);
        halted.as_mut().enable();
        if self.is_halted() {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep_until(wake_at) => {}
            _ = halted => debug!("Retry wait interrupted by halt"),
        }
    }

    async fn fail(&self, failure: Failure, last_error: Option<TransportError>) -> ConnectError {
        let err = match failure {
            Failure::Permanent { error } => ConnectError::Permanent(
                last_error.unwrap_or(TransportError::ConnectionFailed(error)),
            ),
            Failure::Timeout => ConnectError::Timeout,
        };
        error!(error = %err, "Giving up connecting");
        err
    }

    async fn teardown(&self) {
        let Some(session) = self.session.lock().await.take() else {
            return;
        };
        debug!(subscription = %session.subscription_id, "Unsubscribing");
        session.forwarder.abort();
        if let Err(e) = self.transport.disconnect(&session.subscription_id).await {
            error!(error = %e, "Teardown failed");
        }
    }
}

//! Connection state machine for Uniclip.
//!
//! This module provides a pure, side-effect-free state machine for managing
//! the connection lifecycle. The state machine takes events as input and
//! produces a new state plus a list of actions to execute.
//!
//! The actual I/O (connecting, subscribing, sleeping between retries) is
//! performed by clip-client, not by this module. This enables instant unit
//! testing without network mocks.

use std::time::Duration;

use crate::RetryPolicy;

/// Connection state machine - NO I/O, just state transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected.
    Disconnected,
    /// Connection sequence in progress.
    Connecting {
        /// The attempt currently in flight (1-based).
        attempt: u32,
    },
    /// Subscribed to the stream.
    Connected,
}

impl ConnectionState {
    /// Create a new state machine in the Disconnected state.
    pub fn new() -> Self {
        Self::Disconnected
    }

    /// Process an event and return the new state plus actions to execute.
    ///
    /// This is a pure function - no side effects. The caller (clip-client)
    /// is responsible for executing the returned actions.
    pub fn on_event(self, event: Event, policy: &RetryPolicy) -> (Self, Vec<Action>) {
        match (self, event) {
            // From Disconnected
            (Self::Disconnected, Event::ConnectRequested) => (
                Self::Connecting { attempt: 1 },
                vec![Action::Attempt { attempt: 1 }],
            ),

            // Already connected: connect is a no-op
            (Self::Connected, Event::ConnectRequested) => (Self::Connected, vec![]),

            // From Connecting
            (Self::Connecting { .. }, Event::AttemptSucceeded) => (
                Self::Connected,
                vec![Action::EmitEvent(LifecycleEvent::Connected)],
            ),
            (
                Self::Connecting { .. },
                Event::AttemptFailed {
                    error,
                    permanent: true,
                },
            ) => (
                Self::Disconnected,
                vec![Action::Fail(Failure::Permanent { error })],
            ),
            // Transient: retry until the caller's deadline fires TimedOut
            (
                Self::Connecting { attempt },
                Event::AttemptFailed {
                    permanent: false, ..
                },
            ) => (
                Self::Connecting { attempt },
                vec![Action::WaitRetry {
                    delay: policy.retry_delay,
                }],
            ),
            (Self::Connecting { attempt }, Event::RetryTimer) => {
                let next = attempt.saturating_add(1);
                (
                    Self::Connecting { attempt: next },
                    vec![Action::Attempt { attempt: next }],
                )
            }
            (Self::Connecting { .. }, Event::Halted) => (Self::Disconnected, vec![]),
            (Self::Connecting { .. }, Event::TimedOut) => {
                (Self::Disconnected, vec![Action::Fail(Failure::Timeout)])
            }

            // Disconnect always tears down, whatever the state
            (Self::Connected, Event::DisconnectRequested)
            | (Self::Connecting { .. }, Event::DisconnectRequested) => (
                Self::Disconnected,
                vec![
                    Action::Teardown,
                    Action::EmitEvent(LifecycleEvent::Disconnected),
                ],
            ),
            (Self::Disconnected, Event::DisconnectRequested) => {
                (Self::Disconnected, vec![Action::Teardown])
            }

            // Invalid transitions - stay in current state
            (state, _) => (state, vec![]),
        }
    }

    /// Check if currently connected.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Check if a connection sequence is in progress.
    pub fn is_connecting(&self) -> bool {
        matches!(self, Self::Connecting { .. })
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::new()
    }
}

/// Events that can occur in the connection lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Caller requested a connection.
    ConnectRequested,
    /// The transport connected and subscribed.
    AttemptSucceeded,
    /// The transport attempt failed.
    AttemptFailed {
        /// Error message describing the failure.
        error: String,
        /// Whether the error can never succeed on retry.
        permanent: bool,
    },
    /// The retry delay elapsed.
    RetryTimer,
    /// The halt flag was observed.
    Halted,
    /// The connect deadline passed.
    TimedOut,
    /// Caller requested a disconnect.
    DisconnectRequested,
}

/// Why a connect sequence gave up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// A non-retryable error (bad credential, destroyed client).
    Permanent {
        /// Error message from the transport.
        error: String,
    },
    /// The wall-clock budget elapsed.
    Timeout,
}

/// Actions to be executed by the clip-client connection controller.
///
/// These are instructions, not side effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Connect and subscribe (attempt number is 1-based).
    Attempt {
        /// Which attempt this is.
        attempt: u32,
    },
    /// Wait before the next attempt.
    WaitRetry {
        /// Delay before retrying.
        delay: Duration,
    },
    /// Unsubscribe and tear down the client.
    Teardown,
    /// Give up and report the failure to the caller.
    Fail(Failure),
    /// Emit an event to the application.
    EmitEvent(LifecycleEvent),
}

/// Lifecycle events surfaced to the application layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Successfully connected.
    Connected,
    /// Disconnected on request.
    Disconnected,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy::default()
    }

    fn transient(error: &str) -> Event {
        Event::AttemptFailed {
            error: error.into(),
            permanent: false,
        }
    }

    #[test]
    fn starts_disconnected() {
        let state = ConnectionState::new();
        assert!(matches!(state, ConnectionState::Disconnected));
    }

    #[test]
    fn connect_request_starts_first_attempt() {
        let (state, actions) = ConnectionState::Disconnected.on_event(Event::ConnectRequested, &policy());

        assert_eq!(state, ConnectionState::Connecting { attempt: 1 });
        assert_eq!(actions, vec![Action::Attempt { attempt: 1 }]);
    }

    #[test]
    fn connect_when_connected_is_noop() {
        let (state, actions) = ConnectionState::Connected.on_event(Event::ConnectRequested, &policy());

        assert!(state.is_connected());
        assert!(actions.is_empty());
    }

    #[test]
    fn attempt_success_transitions_to_connected() {
        let state = ConnectionState::Connecting { attempt: 2 };
        let (state, actions) = state.on_event(Event::AttemptSucceeded, &policy());

        assert!(state.is_connected());
        assert!(actions
            .iter()
            .any(|a| matches!(a, Action::EmitEvent(LifecycleEvent::Connected))));
    }

    #[test]
    fn permanent_failure_aborts_without_retry() {
        let state = ConnectionState::Connecting { attempt: 1 };
        let (state, actions) = state.on_event(
            Event::AttemptFailed {
                error: "bad key".into(),
                permanent: true,
            },
            &policy(),
        );

        assert_eq!(state, ConnectionState::Disconnected);
        assert_eq!(
            actions,
            vec![Action::Fail(Failure::Permanent {
                error: "bad key".into()
            })]
        );
    }

    #[test]
    fn transient_failure_schedules_retry() {
        let state = ConnectionState::Connecting { attempt: 1 };
        let (state, actions) = state.on_event(transient("network unreachable"), &policy());

        assert_eq!(state, ConnectionState::Connecting { attempt: 1 });
        assert_eq!(
            actions,
            vec![Action::WaitRetry {
                delay: Duration::from_secs(1)
            }]
        );
    }

    #[test]
    fn retry_timer_increments_attempt() {
        let state = ConnectionState::Connecting { attempt: 1 };
        let (state, actions) = state.on_event(Event::RetryTimer, &policy());

        assert_eq!(state, ConnectionState::Connecting { attempt: 2 });
        assert_eq!(actions, vec![Action::Attempt { attempt: 2 }]);
    }

    #[test]
    fn transient_failures_never_give_up_on_their_own() {
        // Only the deadline (TimedOut) ends a run of transient failures
        let state = ConnectionState::Connecting { attempt: 1000 };
        let (state, actions) = state.on_event(transient("still down"), &policy());

        assert_eq!(state, ConnectionState::Connecting { attempt: 1000 });
        assert_eq!(
            actions,
            vec![Action::WaitRetry {
                delay: Duration::from_secs(1)
            }]
        );
    }

    #[test]
    fn two_failures_then_success_flow() {
        let p = policy();
        let (state, _) = ConnectionState::Disconnected.on_event(Event::ConnectRequested, &p);
        let (state, _) = state.on_event(transient("e1"), &p);
        let (state, _) = state.on_event(Event::RetryTimer, &p);
        let (state, _) = state.on_event(transient("e2"), &p);
        let (state, actions) = state.on_event(Event::RetryTimer, &p);
        assert_eq!(actions, vec![Action::Attempt { attempt: 3 }]);

        let (state, _) = state.on_event(Event::AttemptSucceeded, &p);
        assert!(state.is_connected());
    }

    #[test]
    fn halt_returns_to_disconnected_silently() {
        let state = ConnectionState::Connecting { attempt: 2 };
        let (state, actions) = state.on_event(Event::Halted, &policy());

        assert_eq!(state, ConnectionState::Disconnected);
        assert!(actions.is_empty());
    }

    #[test]
    fn timeout_fails() {
        let state = ConnectionState::Connecting { attempt: 3 };
        let (state, actions) = state.on_event(Event::TimedOut, &policy());

        assert_eq!(state, ConnectionState::Disconnected);
        assert_eq!(actions, vec![Action::Fail(Failure::Timeout)]);
    }

    #[test]
    fn disconnect_from_connected_tears_down() {
        let (state, actions) = ConnectionState::Connected.on_event(Event::DisconnectRequested, &policy());

        assert_eq!(state, ConnectionState::Disconnected);
        assert!(actions.iter().any(|a| matches!(a, Action::Teardown)));
        assert!(actions
            .iter()
            .any(|a| matches!(a, Action::EmitEvent(LifecycleEvent::Disconnected))));
    }

    #[test]
    fn disconnect_when_disconnected_still_tears_down() {
        let (state, actions) =
            ConnectionState::Disconnected.on_event(Event::DisconnectRequested, &policy());

        assert_eq!(state, ConnectionState::Disconnected);
        assert_eq!(actions, vec![Action::Teardown]);
    }

    #[test]
    fn stray_events_are_ignored() {
        let (state, actions) = ConnectionState::Connected.on_event(Event::RetryTimer, &policy());
        assert!(state.is_connected());
        assert!(actions.is_empty());

        let (state, actions) = ConnectionState::Disconnected.on_event(Event::AttemptSucceeded, &policy());
        assert_eq!(state, ConnectionState::Disconnected);
        assert!(actions.is_empty());
    }

    #[test]
    fn is_connecting_helper() {
        assert!(!ConnectionState::Disconnected.is_connecting());
        assert!(ConnectionState::Connecting { attempt: 1 }.is_connecting());
        assert!(!ConnectionState::Connected.is_connecting());
    }
}

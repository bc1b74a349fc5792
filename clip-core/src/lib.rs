//! # clip-core
//!
//! Pure logic for Uniclip (no I/O, instant tests).
//!
//! This crate implements the state machines and algorithms for clipboard
//! sync without any network, clipboard or disk I/O, enabling fast unit tests.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input (including the
//! current time, where relevant) and produce output without side effects.
//! This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same input → same output)
//! - Easy reasoning about state transitions
//!
//! The actual I/O (network, clipboard, disk) is performed by `clip-client`,
//! which interprets the actions produced by these state machines.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod diff;
pub mod echo;
pub mod history;
pub mod retry;
pub mod state;

pub use diff::{
    file_changed, image_differs_exact, image_differs_sampled, text_changed, ImageComparison,
    ImageDiffPolicy, DEFAULT_SAMPLE_COUNT,
};
pub use echo::EchoGuard;
pub use history::{HistoryBuffer, DEFAULT_HISTORY_CAPACITY};
pub use retry::RetryPolicy;
pub use state::{Action, ConnectionState, Event, Failure, LifecycleEvent};

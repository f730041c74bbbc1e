//! Core primitives and the Action state machine for reactive-action
//!
//! This crate provides a small push-based reactive toolkit and, on top of it,
//! [`Action`]: a repeatable, mutually exclusive unit-of-work launcher with
//! observable state.
//!
//! # Core Concepts
//!
//! - **Signal**: hot multicast stream of [`Event`]s
//! - **SignalProducer**: cold, restartable stream; each start is one run
//! - **Disposable**: idempotent cancellation handle
//! - **Property**: value that can be read now and observed as it changes
//! - **Action**: accepts an attempt only when the caller's condition holds and
//!   nothing is in flight; republishes every accepted attempt's events
//!
//! # Basic Example
//!
//! ```
//! use reactive_action_core::prelude::*;
//! use std::convert::Infallible;
//!
//! let online = MutableProperty::new(true);
//! let sync: Action<u32, String, Infallible> = Action::enabled_if(&online, |batch: u32| {
//!     SignalProducer::values(vec![format!("batch {batch}"), "done".to_string()])
//! });
//!
//! let mut recorder = EventRecorder::new();
//! recorder.record_signal(&sync.values());
//! sync.apply(7).start_with(|_| {});
//!
//! assert_eq!(recorder.drain_values(), vec!["batch 7", "done"]);
//! assert!(sync.is_enabled().value());
//! ```
//!
//! # Async Work
//!
//! With the `tasks` feature (on by default), units of work can be Tokio
//! futures or streams, and any run can be awaited as a stream:
//!
//! ```ignore
//! use tokio_stream::StreamExt;
//!
//! let fetch = Action::always(|id: u64| {
//!     SignalProducer::from_future(move || async move { api::fetch(id).await })
//! });
//!
//! let outcome: Vec<_> = fetch.apply(42).into_stream().collect().await;
//! ```

pub mod action;
pub mod config;
pub mod disposable;
pub mod error;
pub mod log;
pub mod producer;
pub mod property;
mod serial;
pub mod signal;
#[cfg(feature = "tasks")]
pub mod streams;
#[cfg(feature = "tasks")]
pub mod tasks;
pub mod testing;

// Core type exports
pub use action::{Action, ActionEvent};
pub use config::{glob_match, ActionConfig, LogFilter, DEFAULT_ACTION_NAME};
pub use disposable::{CompositeDisposable, Disposable};
pub use error::ActionError;
pub use producer::SignalProducer;
pub use property::{MutableProperty, Property, PropertySource};
pub use signal::{Event, Observer, Signal};

// Execution log
pub use log::{ExecutionLog, ExecutionLogConfig, ExecutionLogEntry, Outcome};

// Async adapters
#[cfg(feature = "tasks")]
pub use streams::EventStream;

// Testing utilities
pub use testing::EventRecorder;

#[cfg(feature = "testing-time")]
pub use testing::{advance_time, pause_time, resume_time};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::action::{Action, ActionEvent};
    pub use crate::config::ActionConfig;
    pub use crate::disposable::{CompositeDisposable, Disposable};
    pub use crate::error::ActionError;
    pub use crate::log::{ExecutionLog, Outcome};
    pub use crate::producer::SignalProducer;
    pub use crate::property::{MutableProperty, Property, PropertySource};
    pub use crate::signal::{Event, Observer, Signal};
    pub use crate::testing::EventRecorder;

    #[cfg(feature = "tasks")]
    pub use crate::streams::EventStream;
}

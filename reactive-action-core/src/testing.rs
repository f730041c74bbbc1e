//! Test utilities for code built on actions
//!
//! - [`EventRecorder`]: captures the events of signals and producer runs on a
//!   channel, for synchronous draining or async awaiting
//! - Assertion macros for verifying recorded events
//! - With the `testing-time` feature: [`pause_time`], [`advance_time`] and
//!   [`resume_time`] for deterministic timers
//!
//! # Example
//!
//! ```
//! use reactive_action_core::testing::EventRecorder;
//! use reactive_action_core::{assert_emitted, Action, Event, SignalProducer};
//! use std::convert::Infallible;
//!
//! let action: Action<i32, i32, Infallible> = Action::always(|n| SignalProducer::value(n * 2));
//!
//! let mut recorder = EventRecorder::new();
//! recorder.record_signal(&action.values());
//! action.apply(21).start_with(|_| {});
//!
//! let events = recorder.drain();
//! assert_emitted!(events, Event::Value(42));
//! ```

#[cfg(feature = "testing-time")]
use std::time::Duration;

use tokio::sync::mpsc;

use crate::disposable::{CompositeDisposable, Disposable};
use crate::producer::SignalProducer;
use crate::signal::{Event, Observer, Signal};

/// Records events into a channel.
///
/// Subscriptions made through [`record_signal`](Self::record_signal) are
/// released when the recorder is dropped.
///
/// # Type Parameters
///
/// - `T`: value type of the recorded streams
/// - `E`: error type of the recorded streams
pub struct EventRecorder<T, E> {
    tx: mpsc::UnboundedSender<Event<T, E>>,
    rx: mpsc::UnboundedReceiver<Event<T, E>>,
    subscriptions: CompositeDisposable,
}

impl<T, E> EventRecorder<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx,
            subscriptions: CompositeDisposable::new(),
        }
    }

    /// An observer that records every event it receives.
    pub fn observer(&self) -> Observer<T, E> {
        let tx = self.tx.clone();
        Observer::new(move |event| {
            let _ = tx.send(event);
        })
    }

    /// Record the events a signal sends from now on.
    pub fn record_signal(&self, signal: &Signal<T, E>) {
        self.subscriptions.add(signal.observe(self.observer()));
    }

    /// Start a producer and record its run.
    pub fn record_producer(&self, producer: &SignalProducer<T, E>) -> Disposable {
        producer.start(self.observer())
    }

    /// Drain all recorded events.
    pub fn drain(&mut self) -> Vec<Event<T, E>> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }

    /// Drain all recorded events, keeping only the values.
    pub fn drain_values(&mut self) -> Vec<T> {
        self.drain()
            .into_iter()
            .filter_map(|event| match event {
                Event::Value(value) => Some(value),
                _ => None,
            })
            .collect()
    }

    /// Check if anything was recorded (drains).
    pub fn has_recorded(&mut self) -> bool {
        !self.drain().is_empty()
    }

    /// Wait for the next recorded event.
    pub async fn next(&mut self) -> Option<Event<T, E>> {
        self.rx.recv().await
    }

    /// Wait for the next recorded event, giving up after `timeout`.
    pub async fn next_timeout(&mut self, timeout: std::time::Duration) -> Option<Event<T, E>> {
        tokio::time::timeout(timeout, self.rx.recv())
            .await
            .ok()
            .flatten()
    }
}

impl<T, E> Default for EventRecorder<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> Drop for EventRecorder<T, E> {
    fn drop(&mut self) {
        self.subscriptions.dispose();
    }
}

/// Pause the Tokio clock for the current runtime.
#[cfg(feature = "testing-time")]
pub fn pause_time() {
    tokio::time::pause();
}

/// Move the paused Tokio clock forward, firing due timers.
#[cfg(feature = "testing-time")]
pub async fn advance_time(duration: Duration) {
    tokio::time::advance(duration).await;
}

/// Resume the Tokio clock.
#[cfg(feature = "testing-time")]
pub fn resume_time() {
    tokio::time::resume();
}

/// Assert that an event matching a pattern was recorded.
///
/// # Example
///
/// ```ignore
/// use reactive_action::assert_emitted;
///
/// let events = recorder.drain();
/// assert_emitted!(events, Event::Completed);
/// assert_emitted!(events, Event::Value(n) if *n > 3);
/// ```
#[macro_export]
macro_rules! assert_emitted {
    ($events:expr, $pattern:pat $(if $guard:expr)?) => {
        assert!(
            $events.iter().any(|e| matches!(e, $pattern $(if $guard)?)),
            "Expected event matching `{}` to be emitted, but got: {:?}",
            stringify!($pattern),
            $events
        );
    };
}

/// Assert that no event matching a pattern was recorded.
///
/// # Example
///
/// ```ignore
/// use reactive_action::assert_not_emitted;
///
/// let events = recorder.drain();
/// assert_not_emitted!(events, Event::Failed(_));
/// ```
#[macro_export]
macro_rules! assert_not_emitted {
    ($events:expr, $pattern:pat $(if $guard:expr)?) => {
        assert!(
            !$events.iter().any(|e| matches!(e, $pattern $(if $guard)?)),
            "Expected event matching `{}` NOT to be emitted, but it was: {:?}",
            stringify!($pattern),
            $events
        );
    };
}

/// Find and return the first recorded event matching a pattern.
///
/// # Example
///
/// ```ignore
/// use reactive_action::find_emitted;
///
/// let events = recorder.drain();
/// if let Some(Event::Failed(error)) = find_emitted!(events, Event::Failed(_)) {
///     assert!(error.is_disabled());
/// }
/// ```
#[macro_export]
macro_rules! find_emitted {
    ($events:expr, $pattern:pat $(if $guard:expr)?) => {
        $events.iter().find(|e| matches!(e, $pattern $(if $guard)?))
    };
}

/// Count how many recorded events match a pattern.
///
/// # Example
///
/// ```ignore
/// use reactive_action::count_emitted;
///
/// let events = recorder.drain();
/// assert_eq!(count_emitted!(events, Event::Value(_)), 2);
/// ```
#[macro_export]
macro_rules! count_emitted {
    ($events:expr, $pattern:pat $(if $guard:expr)?) => {
        $events.iter().filter(|e| matches!(e, $pattern $(if $guard)?)).count()
    };
}

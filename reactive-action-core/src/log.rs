//! In-memory execution history
//!
//! [`ExecutionLog`] is a bounded ring buffer recording what happened to the
//! actions attached to it: rejected attempts, starts, and how each execution
//! ended. It is cheap to clone and can be shared by many actions, e.g. to back
//! a debug view.
//!
//! # Example
//!
//! ```
//! use reactive_action_core::{Action, ActionConfig, ExecutionLog, Outcome, Property, SignalProducer};
//! use std::convert::Infallible;
//!
//! let action: Action<(), i32, Infallible> = Action::with_config(
//!     ActionConfig::named("refresh"),
//!     &Property::constant(true),
//!     |enabled: &bool| *enabled,
//!     |_, _| SignalProducer::value(1),
//! );
//!
//! let log = ExecutionLog::default();
//! let _attached = log.attach(&action);
//! action.apply_unit().start_with(|_| {});
//!
//! let outcomes: Vec<_> = log.entries().into_iter().map(|e| e.outcome).collect();
//! assert_eq!(outcomes, vec![Outcome::Started, Outcome::Completed]);
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::config::LogFilter;
use crate::disposable::Disposable;
use crate::signal::Event;

/// What happened to an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    /// An attempt was rejected because the action was disabled.
    Rejected,
    /// An attempt was accepted and its unit of work started.
    Started,
    /// The unit of work completed.
    Completed,
    /// The unit of work failed.
    Failed,
    /// The attempt was cancelled before its unit of work finished.
    Interrupted,
}

impl Outcome {
    pub(crate) fn from_terminal<T, E>(event: &Event<T, E>) -> Option<Self> {
        match event {
            Event::Value(_) => None,
            Event::Failed(_) => Some(Outcome::Failed),
            Event::Completed => Some(Outcome::Completed),
            Event::Interrupted => Some(Outcome::Interrupted),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Outcome::Rejected => "rejected",
            Outcome::Started => "started",
            Outcome::Completed => "completed",
            Outcome::Failed => "failed",
            Outcome::Interrupted => "interrupted",
        };
        f.write_str(label)
    }
}

/// An entry in the execution log
#[derive(Debug, Clone)]
pub struct ExecutionLogEntry {
    /// Name of the action, from its config
    pub action: Arc<str>,
    pub outcome: Outcome,
    /// Timestamp when the entry was recorded
    pub timestamp: Instant,
    /// Sequence number for ordering
    pub sequence: u64,
}

impl ExecutionLogEntry {
    /// Time since this entry was recorded
    pub fn elapsed(&self) -> Duration {
        self.timestamp.elapsed()
    }

    /// Format the elapsed time for display (e.g., "2.3s", "150ms")
    pub fn elapsed_display(&self) -> String {
        let elapsed = self.elapsed();
        if elapsed.as_secs() >= 1 {
            format!("{:.1}s", elapsed.as_secs_f64())
        } else {
            format!("{}ms", elapsed.as_millis())
        }
    }
}

/// Configuration for the execution log ring buffer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionLogConfig {
    /// Maximum number of entries to keep
    pub capacity: usize,
    /// Which action names are recorded
    pub filter: LogFilter,
}

impl Default for ExecutionLogConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            filter: LogFilter::default(),
        }
    }
}

impl ExecutionLogConfig {
    /// Create with custom capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Default::default()
        }
    }

    /// Create with custom capacity and filter
    pub fn new(capacity: usize, filter: LogFilter) -> Self {
        Self { capacity, filter }
    }
}

#[derive(Debug)]
struct Buffer {
    entries: VecDeque<ExecutionLogEntry>,
    next_sequence: u64,
}

/// Shared ring buffer of execution outcomes.
///
/// Older entries are discarded once capacity is reached.
#[derive(Debug, Clone)]
pub struct ExecutionLog {
    buffer: Arc<Mutex<Buffer>>,
    config: Arc<ExecutionLogConfig>,
}

impl Default for ExecutionLog {
    fn default() -> Self {
        Self::new(ExecutionLogConfig::default())
    }
}

impl ExecutionLog {
    pub fn new(config: ExecutionLogConfig) -> Self {
        Self {
            buffer: Arc::new(Mutex::new(Buffer {
                entries: VecDeque::with_capacity(config.capacity),
                next_sequence: 0,
            })),
            config: Arc::new(config),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Buffer> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record an outcome (if the action passes the filter)
    ///
    /// Returns the sequence number, or `None` if filtered out.
    pub fn record(&self, action: &str, outcome: Outcome) -> Option<u64> {
        if self.config.capacity == 0 || !self.config.filter.matches(action) {
            return None;
        }

        let mut buffer = self.lock();
        let sequence = buffer.next_sequence;
        buffer.next_sequence += 1;

        if buffer.entries.len() >= self.config.capacity {
            buffer.entries.pop_front();
        }
        buffer.entries.push_back(ExecutionLogEntry {
            action: Arc::from(action),
            outcome,
            timestamp: Instant::now(),
            sequence,
        });
        Some(sequence)
    }

    /// Follow an action, recording rejections, starts and terminations.
    ///
    /// Recording stops when the returned handle is disposed.
    pub fn attach<I, O, E>(&self, action: &Action<I, O, E>) -> Disposable
    where
        I: Send + 'static,
        O: Clone + Send + 'static,
        E: Clone + Send + 'static,
    {
        let name: Arc<str> = Arc::from(action.name());
        let log = self.clone();
        action.outcomes().observe_values(move |outcome| {
            log.record(&name, outcome);
        })
    }

    /// Get all entries (oldest first)
    pub fn entries(&self) -> Vec<ExecutionLogEntry> {
        self.lock().entries.iter().cloned().collect()
    }

    /// Get the most recent N entries (newest first)
    pub fn recent(&self, count: usize) -> Vec<ExecutionLogEntry> {
        self.lock().entries.iter().rev().take(count).cloned().collect()
    }

    /// Number of entries currently stored
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Whether the log is empty
    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Clear all entries
    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    /// Get configuration
    pub fn config(&self) -> &ExecutionLogConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ActionConfig;
    use crate::producer::SignalProducer;
    use crate::property::{MutableProperty, Property, PropertySource};
    use std::sync::atomic::{AtomicBool, Ordering};

    fn outcomes(log: &ExecutionLog) -> Vec<Outcome> {
        log.entries().into_iter().map(|e| e.outcome).collect()
    }

    fn named_action(
        name: &str,
        enabled: &MutableProperty<bool>,
        work: SignalProducer<i32, String>,
    ) -> Action<(), i32, String> {
        Action::with_config(
            ActionConfig::named(name),
            enabled,
            |enabled: &bool| *enabled,
            move |_, _| work.clone(),
        )
    }

    #[test]
    fn test_record_capacity() {
        let log = ExecutionLog::new(ExecutionLogConfig::with_capacity(3));

        for _ in 0..5 {
            log.record("save", Outcome::Started);
        }

        let entries = log.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].sequence, 2);
        assert_eq!(entries[2].sequence, 4);
    }

    #[test]
    fn test_record_filtered() {
        let log = ExecutionLog::new(ExecutionLogConfig::new(
            10,
            LogFilter::new(None, Some("poll*")),
        ));

        assert_eq!(log.record("pollInbox", Outcome::Started), None);
        assert_eq!(log.record("send", Outcome::Started), Some(0));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_recent_newest_first() {
        let log = ExecutionLog::default();
        log.record("a", Outcome::Started);
        log.record("b", Outcome::Completed);
        log.record("c", Outcome::Failed);

        let recent: Vec<_> = log.recent(2).into_iter().map(|e| e.action).collect();
        assert_eq!(recent, vec![Arc::from("c"), Arc::from("b")]);

        log.clear();
        assert!(log.is_empty());
    }

    #[test]
    fn test_attach_records_lifecycle() {
        let enabled = MutableProperty::new(false);
        let action = named_action("upload", &enabled, SignalProducer::failed("disk full".into()));
        let log = ExecutionLog::default();
        let attached = log.attach(&action);

        action.apply_unit().start_with(|_| {});
        enabled.set(true);
        action.apply_unit().start_with(|_| {});
        let cancelled = named_action("download", &enabled, SignalProducer::never());
        let _other = log.attach(&cancelled);
        cancelled.apply_unit().start_with(|_| {}).dispose();

        assert_eq!(
            outcomes(&log),
            vec![
                Outcome::Rejected,
                Outcome::Started,
                Outcome::Failed,
                Outcome::Started,
                Outcome::Interrupted,
            ]
        );
        assert_eq!(&*log.entries()[4].action, "download");

        attached.dispose();
        action.apply_unit().start_with(|_| {});
        assert_eq!(log.len(), 5);
    }

    #[test]
    fn test_start_recorded_before_its_outcome_on_reentry() {
        let action: Action<(), i32, String> = Action::with_config(
            ActionConfig::named("sync"),
            &Property::constant(true),
            |enabled: &bool| *enabled,
            |_, _| SignalProducer::value(1),
        );
        let log = ExecutionLog::default();
        let _attached = log.attach(&action);

        // Re-apply as soon as the first attempt re-enables the action
        let again = action.clone();
        let fired = Arc::new(AtomicBool::new(false));
        let reentry = action.is_enabled().signal().observe_values(move |enabled| {
            if enabled && !fired.swap(true, Ordering::SeqCst) {
                again.apply_unit().start_with(|_| {});
            }
        });

        action.apply_unit().start_with(|_| {});
        reentry.dispose();

        assert_eq!(
            outcomes(&log),
            vec![
                Outcome::Started,
                Outcome::Completed,
                Outcome::Started,
                Outcome::Completed,
            ]
        );
        assert!(log.entries().windows(2).all(|w| w[0].sequence < w[1].sequence));
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(Outcome::Interrupted.to_string(), "interrupted");
    }

    #[test]
    fn test_config_deserialize() {
        let config: ExecutionLogConfig = serde_json::from_str(r#"{"capacity": 8}"#).unwrap();
        assert_eq!(config.capacity, 8);
        assert_eq!(config.filter, LogFilter::default());
    }
}

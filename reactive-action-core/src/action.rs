//! The Action state machine
//!
//! An [`Action`] launches units of work one at a time. It tracks whether the
//! caller's enabling condition holds (`is_user_enabled`) and whether a unit of
//! work is in flight (`is_executing`); it accepts an attempt only when
//! `is_user_enabled && !is_executing`.
//!
//! # Example
//!
//! ```
//! use reactive_action_core::{Action, ActionError, Event, MutableProperty, SignalProducer};
//! use std::sync::{Arc, Mutex};
//!
//! let logged_in = MutableProperty::new(false);
//! let save: Action<String, usize, std::convert::Infallible> =
//!     Action::enabled_if(&logged_in, |text: String| SignalProducer::value(text.len()));
//!
//! let outcome = Arc::new(Mutex::new(Vec::new()));
//! let sink = outcome.clone();
//! save.apply("draft".to_string())
//!     .start_with(move |event| sink.lock().unwrap().push(event));
//! assert_eq!(*outcome.lock().unwrap(), vec![Event::Failed(ActionError::Disabled)]);
//!
//! logged_in.set(true);
//! let sink = outcome.clone();
//! save.apply("draft".to_string())
//!     .start_with(move |event| sink.lock().unwrap().push(event));
//! assert_eq!(outcome.lock().unwrap()[1..], [Event::Value(5), Event::Completed]);
//! ```

use std::convert::Infallible;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use tracing::{debug, trace};

use crate::config::ActionConfig;
use crate::disposable::Disposable;
use crate::error::ActionError;
use crate::log::Outcome;
use crate::producer::SignalProducer;
use crate::property::{Property, PropertySource};
use crate::serial::Serialized;
use crate::signal::{Event, Observer, Signal};

/// Event type republished on [`Action::events`].
pub type ActionEvent<O, E> = Event<O, ActionError<E>>;

#[derive(Debug)]
struct ActionState<S> {
    value: S,
    is_user_enabled: bool,
    is_executing: bool,
}

impl<S> ActionState<S> {
    fn is_enabled(&self) -> bool {
        self.is_user_enabled && !self.is_executing
    }

    fn flags(&self) -> (bool, bool) {
        (self.is_enabled(), self.is_executing)
    }

    /// Queue a notification for every derived flag that changed, enabled
    /// first.
    fn record_changes(&self, (was_enabled, was_executing): (bool, bool), out: &mut Vec<Transition>) {
        if self.is_enabled() != was_enabled {
            out.push(Transition::Enabled(self.is_enabled()));
        }
        if self.is_executing != was_executing {
            out.push(Transition::Executing(self.is_executing));
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    Enabled(bool),
    Executing(bool),
}

/// Log sink shared by an action and the producers it hands out.
#[derive(Clone)]
struct Tracer {
    name: Arc<str>,
    active: bool,
}

impl Tracer {
    fn new(config: &ActionConfig) -> Self {
        Self {
            name: Arc::from(config.name.as_str()),
            active: config.should_trace(),
        }
    }

    fn rejected(&self) {
        if self.active {
            debug!(action = %self.name, "Action disabled, attempt rejected");
        }
    }

    fn started(&self) {
        if self.active {
            debug!(action = %self.name, "Action started");
        }
    }

    fn finished<O, E>(&self, event: &ActionEvent<O, E>) {
        if self.active {
            debug!(action = %self.name, outcome = event.kind(), "Action finished");
        }
    }

    fn transition(&self, transition: Transition) {
        if self.active {
            match transition {
                Transition::Enabled(enabled) => {
                    trace!(action = %self.name, enabled, "Enabled status changed")
                }
                Transition::Executing(executing) => {
                    trace!(action = %self.name, executing, "Executing status changed")
                }
            }
        }
    }

    fn dropped(&self) {
        if self.active {
            debug!(action = %self.name, "Action dropped, closing event streams");
        }
    }
}

/// Type-erased access to the state machine, hiding the observed state type.
///
/// The hooks run right after the state changed, before the resulting
/// transitions reach status observers.
trait Gate<I, O, E>: Send + Sync {
    /// Atomically accept the attempt and build its unit of work, or reject it.
    fn try_begin(&self, input: I, started: &mut dyn FnMut()) -> Option<SignalProducer<O, E>>;

    /// Leave the executing state.
    fn end(&self, finished: &mut dyn FnMut());

    fn is_enabled(&self) -> bool;

    fn is_executing(&self) -> bool;
}

type EnabledIf<S> = Box<dyn Fn(&S) -> bool + Send + Sync>;
type Execute<S, I, O, E> = Box<dyn Fn(S, I) -> SignalProducer<O, E> + Send + Sync>;

struct ActionCore<S, I, O, E> {
    cell: Serialized<ActionState<S>, Transition>,
    enabled_if: EnabledIf<S>,
    execute: Execute<S, I, O, E>,
}

impl<S, I, O, E> ActionCore<S, I, O, E> {
    fn update_state(&self, value: S) {
        // The predicate runs outside the lock so it may read the action or
        // write to the state source.
        let is_user_enabled = (self.enabled_if)(&value);
        self.cell.modify(|state, out| {
            let before = state.flags();
            state.value = value;
            state.is_user_enabled = is_user_enabled;
            state.record_changes(before, out);
        });
    }
}

impl<S, I, O, E> Gate<I, O, E> for ActionCore<S, I, O, E>
where
    S: Clone + Send,
{
    fn try_begin(&self, input: I, started: &mut dyn FnMut()) -> Option<SignalProducer<O, E>> {
        let captured = self.cell.modify_then(
            |state, out| {
                if !state.is_enabled() {
                    return None;
                }
                let before = state.flags();
                state.is_executing = true;
                state.record_changes(before, out);
                Some(state.value.clone())
            },
            |captured: &Option<S>| {
                if captured.is_some() {
                    started();
                }
            },
        )?;
        Some((self.execute)(captured, input))
    }

    fn end(&self, finished: &mut dyn FnMut()) {
        self.cell.modify_then(
            |state, out| {
                let before = state.flags();
                state.is_executing = false;
                state.record_changes(before, out);
            },
            |_| finished(),
        );
    }

    fn is_enabled(&self) -> bool {
        self.cell.read(ActionState::is_enabled)
    }

    fn is_executing(&self) -> bool {
        self.cell.read(|state| state.is_executing)
    }
}

/// One accepted attempt.
struct Execution<I, O, E> {
    gate: Arc<dyn Gate<I, O, E>>,
    ended: AtomicBool,
}

impl<I, O, E> Execution<I, O, E> {
    /// Leave the executing state once; `publish` runs after the flag flipped.
    fn finish(&self, publish: &mut dyn FnMut()) {
        if self.ended.swap(true, Ordering::AcqRel) {
            publish();
        } else {
            self.gate.end(publish);
        }
    }
}

/// Owner of everything that must be torn down with the last action handle.
struct Shared<O, E> {
    config: ActionConfig,
    tracer: Tracer,
    events: Signal<ActionEvent<O, E>, Infallible>,
    events_input: Observer<ActionEvent<O, E>, Infallible>,
    values: Signal<O, Infallible>,
    errors: Signal<ActionError<E>, Infallible>,
    completed: Signal<(), Infallible>,
    disabled_errors: Signal<(), Infallible>,
    disabled_input: Observer<(), Infallible>,
    outcomes: Signal<Outcome, Infallible>,
    outcomes_input: Observer<Outcome, Infallible>,
    is_enabled: Property<bool>,
    enabled_input: Observer<bool, Infallible>,
    is_executing: Property<bool>,
    executing_input: Observer<bool, Infallible>,
    state_subscription: Disposable,
}

impl<O, E> Drop for Shared<O, E> {
    fn drop(&mut self) {
        self.tracer.dropped();
        self.state_subscription.dispose();
        self.events_input.send_completed();
        self.disabled_input.send_completed();
        self.outcomes_input.send_completed();
        self.enabled_input.send_completed();
        self.executing_input.send_completed();
    }
}

/// A repeatable, mutually exclusive unit-of-work launcher.
///
/// - `I`: input passed to each attempt
/// - `O`: values produced by the unit of work
/// - `E`: error produced by the unit of work
///
/// Clones share the same state. When the last clone is dropped, the action
/// stops observing its state source and completes every signal it exposes;
/// work still in flight runs to completion but its events are no longer
/// republished.
pub struct Action<I, O, E> {
    gate: Arc<dyn Gate<I, O, E>>,
    shared: Arc<Shared<O, E>>,
}

impl<I, O, E> Clone for Action<I, O, E> {
    fn clone(&self) -> Self {
        Self {
            gate: self.gate.clone(),
            shared: self.shared.clone(),
        }
    }
}

impl<I, O, E> fmt::Debug for Action<I, O, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("name", &self.shared.config.name)
            .field("is_enabled", &self.gate.is_enabled())
            .field("is_executing", &self.gate.is_executing())
            .finish()
    }
}

impl<I, O, E> Action<I, O, E>
where
    I: Send + 'static,
    O: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Create an action driven by an observed state.
    ///
    /// - `state`: source of the state; the action reads it now and follows
    ///   its changes, but does not keep it alive
    /// - `enabled_if`: whether the action is enabled for a given state
    /// - `execute`: builds the unit of work for the latest state and an input
    pub fn new<S, P, G, F>(state: &P, enabled_if: G, execute: F) -> Self
    where
        S: Clone + Send + 'static,
        P: PropertySource<S> + ?Sized,
        G: Fn(&S) -> bool + Send + Sync + 'static,
        F: Fn(S, I) -> SignalProducer<O, E> + Send + Sync + 'static,
    {
        Self::with_config(ActionConfig::default(), state, enabled_if, execute)
    }

    /// Same as [`new`](Self::new) with an explicit configuration.
    pub fn with_config<S, P, G, F>(config: ActionConfig, state: &P, enabled_if: G, execute: F) -> Self
    where
        S: Clone + Send + 'static,
        P: PropertySource<S> + ?Sized,
        G: Fn(&S) -> bool + Send + Sync + 'static,
        F: Fn(S, I) -> SignalProducer<O, E> + Send + Sync + 'static,
    {
        let tracer = Tracer::new(&config);

        let (enabled_signal, enabled_input) = Signal::pipe();
        let (executing_signal, executing_input) = Signal::pipe();
        let deliver = {
            let tracer = tracer.clone();
            let enabled_input = enabled_input.clone();
            let executing_input = executing_input.clone();
            move |transition: Transition| {
                tracer.transition(transition);
                match transition {
                    Transition::Enabled(enabled) => enabled_input.send_value(enabled),
                    Transition::Executing(executing) => executing_input.send_value(executing),
                }
            }
        };

        let initial = state.value();
        let is_user_enabled = enabled_if(&initial);
        let core = Arc::new(ActionCore {
            cell: Serialized::new(
                ActionState {
                    value: initial,
                    is_user_enabled,
                    is_executing: false,
                },
                deliver,
            ),
            enabled_if: Box::new(enabled_if),
            execute: Box::new(execute),
        });

        let weak: Weak<ActionCore<S, I, O, E>> = Arc::downgrade(&core);
        let state_subscription = state.signal().observe_values(move |value| {
            if let Some(core) = weak.upgrade() {
                core.update_state(value);
            }
        });

        let gate: Arc<dyn Gate<I, O, E>> = core;
        let is_enabled = {
            let gate = gate.clone();
            Property::new(move || gate.is_enabled(), enabled_signal)
        };
        let is_executing = {
            let gate = gate.clone();
            Property::new(move || gate.is_executing(), executing_signal)
        };

        let (events, events_input) = Signal::pipe();
        let values = events.filter_map(|event: ActionEvent<O, E>| match event {
            Event::Value(value) => Some(value),
            _ => None,
        });
        let errors = events.filter_map(|event: ActionEvent<O, E>| match event {
            Event::Failed(error) => Some(error),
            _ => None,
        });
        let completed = events.filter_map(|event: ActionEvent<O, E>| {
            matches!(event, Event::Completed).then_some(())
        });
        let (disabled_errors, disabled_input) = Signal::pipe();
        let (outcomes, outcomes_input) = Signal::pipe();

        Self {
            gate,
            shared: Arc::new(Shared {
                config,
                tracer,
                events,
                events_input,
                values,
                errors,
                completed,
                disabled_errors,
                disabled_input,
                outcomes,
                outcomes_input,
                is_enabled,
                enabled_input,
                is_executing,
                executing_input,
                state_subscription,
            }),
        }
    }

    /// An action enabled whenever `enabled` holds.
    pub fn enabled_if<P, F>(enabled: &P, execute: F) -> Self
    where
        P: PropertySource<bool> + ?Sized,
        F: Fn(I) -> SignalProducer<O, E> + Send + Sync + 'static,
    {
        Self::new(enabled, |enabled: &bool| *enabled, move |_, input| execute(input))
    }

    /// An always-enabled action whose work depends on an observed state.
    pub fn with_state<S, P, F>(state: &P, execute: F) -> Self
    where
        S: Clone + Send + 'static,
        P: PropertySource<S> + ?Sized,
        F: Fn(S, I) -> SignalProducer<O, E> + Send + Sync + 'static,
    {
        Self::new(state, |_: &S| true, execute)
    }

    /// An action that is enabled whenever it is not executing.
    pub fn always<F>(execute: F) -> Self
    where
        F: Fn(I) -> SignalProducer<O, E> + Send + Sync + 'static,
    {
        Self::new(&Property::constant(()), |_: &()| true, move |(), input| execute(input))
    }

    /// Build an execution attempt for `input`.
    ///
    /// Nothing happens until the returned producer is started; every start is
    /// one attempt. If the action is disabled at that moment, the attempt fails
    /// synchronously with [`ActionError::Disabled`] and one notification is
    /// sent on [`disabled_errors`](Self::disabled_errors). Otherwise the
    /// action enters the executing state, runs the unit of work, and forwards
    /// its events (failures wrapped in [`ActionError::ExecutionFailed`]) to
    /// both the caller and [`events`](Self::events). The action leaves the
    /// executing state exactly once, when the unit of work terminates or the
    /// attempt is disposed, and publishes the terminal event before
    /// [`is_enabled`](Self::is_enabled) and [`is_executing`](Self::is_executing)
    /// observers hear about it.
    pub fn apply(&self, input: I) -> SignalProducer<O, ActionError<E>>
    where
        I: Clone + Sync,
    {
        let gate = self.gate.clone();
        let tracer = self.shared.tracer.clone();
        let events = self.shared.events_input.clone();
        let disabled = self.shared.disabled_input.clone();
        let outcomes = self.shared.outcomes_input.clone();

        SignalProducer::new(move |observer, lifetime| {
            let mut announce = || {
                tracer.started();
                outcomes.send_value(Outcome::Started);
            };
            let Some(work) = gate.try_begin(input.clone(), &mut announce) else {
                tracer.rejected();
                observer.send_failed(ActionError::Disabled);
                disabled.send_value(());
                outcomes.send_value(Outcome::Rejected);
                return;
            };

            let execution = Arc::new(Execution {
                gate: gate.clone(),
                ended: AtomicBool::new(false),
            });
            let forward = {
                let execution = execution.clone();
                let events = events.clone();
                let outcomes = outcomes.clone();
                let tracer = tracer.clone();
                Observer::new(move |event: Event<O, E>| {
                    let event = event.map_error(ActionError::ExecutionFailed);
                    if !event.is_terminating() {
                        events.send_value(event.clone());
                        observer.send(event);
                        return;
                    }
                    execution.finish(&mut || {
                        tracer.finished(&event);
                        events.send_value(event.clone());
                        if let Some(outcome) = Outcome::from_terminal(&event) {
                            outcomes.send_value(outcome);
                        }
                        observer.send(event.clone());
                    });
                })
            };

            lifetime.add(work.start(forward));
            lifetime.add_fn(move || execution.finish(&mut || {}));
        })
    }

    /// Every event of every accepted attempt, in order.
    pub fn events(&self) -> Signal<ActionEvent<O, E>, Infallible> {
        self.shared.events.clone()
    }

    /// Values produced by accepted attempts.
    pub fn values(&self) -> Signal<O, Infallible> {
        self.shared.values.clone()
    }

    /// Failures of accepted attempts.
    pub fn errors(&self) -> Signal<ActionError<E>, Infallible> {
        self.shared.errors.clone()
    }

    /// Completions of accepted attempts.
    pub fn completed(&self) -> Signal<(), Infallible> {
        self.shared.completed.clone()
    }

    /// One notification per rejected attempt.
    pub fn disabled_errors(&self) -> Signal<(), Infallible> {
        self.shared.disabled_errors.clone()
    }

    /// Every rejection, start, and termination, in the order they happened.
    pub fn outcomes(&self) -> Signal<Outcome, Infallible> {
        self.shared.outcomes.clone()
    }

    /// Whether a unit of work is in flight.
    pub fn is_executing(&self) -> Property<bool> {
        self.shared.is_executing.clone()
    }

    /// Whether an attempt would currently be accepted.
    pub fn is_enabled(&self) -> Property<bool> {
        self.shared.is_enabled.clone()
    }

    pub fn name(&self) -> &str {
        &self.shared.config.name
    }

    pub fn config(&self) -> &ActionConfig {
        &self.shared.config
    }
}

impl<O, E> Action<(), O, E>
where
    O: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Input-less form of [`apply`](Self::apply).
    pub fn apply_unit(&self) -> SignalProducer<O, ActionError<E>> {
        self.apply(())
    }
}

//! Push-based event streams
//!
//! - [`Event`]: a value, a failure, a completion, or an interruption
//! - [`Observer`]: a cloneable sink of events
//! - [`Signal`]: a hot stream that multicasts every event it receives to all
//!   current observers
//!
//! Delivery is synchronous and FIFO: sending into a signal's input observer
//! calls every subscribed observer, in subscription order, before `send`
//! returns. An event sent while the signal is already delivering (from one of
//! its own observers, or from another thread) is queued and delivered by the
//! active sender once the current event has reached every observer. No
//! internal lock is held while observers run, so an observer may send into
//! (or subscribe to) the same signal again.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::disposable::Disposable;

/// A single event of a stream.
///
/// `Failed`, `Completed` and `Interrupted` are terminal: a stream delivers at
/// most one of them, and nothing after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event<T, E> {
    /// An interim value.
    Value(T),
    /// The stream failed.
    Failed(E),
    /// The stream finished successfully.
    Completed,
    /// The subscription was cancelled before the stream finished.
    Interrupted,
}

impl<T, E> Event<T, E> {
    /// Whether this event ends the stream.
    pub fn is_terminating(&self) -> bool {
        !matches!(self, Event::Value(_))
    }

    /// The carried value, if this is a `Value` event.
    pub fn value(&self) -> Option<&T> {
        match self {
            Event::Value(value) => Some(value),
            _ => None,
        }
    }

    /// The carried error, if this is a `Failed` event.
    pub fn error(&self) -> Option<&E> {
        match self {
            Event::Failed(error) => Some(error),
            _ => None,
        }
    }

    /// Transform the value of a `Value` event.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Event<U, E> {
        match self {
            Event::Value(value) => Event::Value(f(value)),
            Event::Failed(error) => Event::Failed(error),
            Event::Completed => Event::Completed,
            Event::Interrupted => Event::Interrupted,
        }
    }

    /// Transform the error of a `Failed` event.
    pub fn map_error<F>(self, f: impl FnOnce(E) -> F) -> Event<T, F> {
        match self {
            Event::Value(value) => Event::Value(value),
            Event::Failed(error) => Event::Failed(f(error)),
            Event::Completed => Event::Completed,
            Event::Interrupted => Event::Interrupted,
        }
    }

    /// Short lowercase name of the event kind, used in log records.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Value(_) => "value",
            Event::Failed(_) => "failed",
            Event::Completed => "completed",
            Event::Interrupted => "interrupted",
        }
    }
}

/// A cloneable sink of events.
pub struct Observer<T, E> {
    action: Arc<dyn Fn(Event<T, E>) + Send + Sync>,
}

impl<T, E> Clone for Observer<T, E> {
    fn clone(&self) -> Self {
        Self {
            action: self.action.clone(),
        }
    }
}

impl<T, E> fmt::Debug for Observer<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer").finish_non_exhaustive()
    }
}

impl<T, E> Observer<T, E> {
    /// Create an observer from an event handler.
    pub fn new<F>(action: F) -> Self
    where
        F: Fn(Event<T, E>) + Send + Sync + 'static,
    {
        Self {
            action: Arc::new(action),
        }
    }

    /// Deliver an event.
    pub fn send(&self, event: Event<T, E>) {
        (self.action)(event)
    }

    /// Deliver a value.
    pub fn send_value(&self, value: T) {
        self.send(Event::Value(value))
    }

    /// Deliver a failure.
    pub fn send_failed(&self, error: E) {
        self.send(Event::Failed(error))
    }

    /// Deliver a completion.
    pub fn send_completed(&self) {
        self.send(Event::Completed)
    }

    /// Deliver an interruption.
    pub fn send_interrupted(&self) {
        self.send(Event::Interrupted)
    }
}

struct SignalState<T, E> {
    observers: Vec<(u64, Observer<T, E>)>,
    next_id: u64,
    pending: VecDeque<Event<T, E>>,
    draining: bool,
    /// A terminal event has been accepted; later sends are ignored.
    closed: bool,
    /// The terminal event, once delivered.
    terminal: Option<Event<T, E>>,
    connected: bool,
    upstream: Option<Disposable>,
}

type Connect<T, E> = Box<dyn Fn(Observer<T, E>) -> Disposable + Send + Sync>;

struct SignalCore<T, E> {
    state: Mutex<SignalState<T, E>>,
    /// Subscribes a derived signal to its parent while it has observers.
    connect: Option<Connect<T, E>>,
}

impl<T, E> SignalCore<T, E> {
    fn new(connect: Option<Connect<T, E>>) -> Self {
        Self {
            state: Mutex::new(SignalState {
                observers: Vec::new(),
                next_id: 0,
                pending: VecDeque::new(),
                draining: false,
                closed: false,
                terminal: None,
                connected: false,
                upstream: None,
            }),
            connect,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SignalState<T, E>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remove(&self, id: u64) {
        let upstream = {
            let mut state = self.lock();
            state.observers.retain(|(observer_id, _)| *observer_id != id);
            if state.observers.is_empty() && state.connected {
                state.connected = false;
                state.upstream.take()
            } else {
                None
            }
        };
        if let Some(upstream) = upstream {
            upstream.dispose();
        }
    }
}

impl<T, E> SignalCore<T, E>
where
    T: Clone,
    E: Clone,
{
    /// Queue an event, then deliver the queue unless a delivery is already
    /// in progress, in which case the active drainer picks it up.
    fn deliver(&self, event: Event<T, E>) {
        {
            let mut state = self.lock();
            if state.closed {
                return;
            }
            state.closed = event.is_terminating();
            state.pending.push_back(event);
            if state.draining {
                return;
            }
            state.draining = true;
        }

        let _guard = DeliveryGuard { core: self };
        loop {
            let (event, observers, upstream) = {
                let mut state = self.lock();
                let Some(event) = state.pending.pop_front() else {
                    state.draining = false;
                    return;
                };
                if event.is_terminating() {
                    state.terminal = Some(event.clone());
                    state.connected = false;
                    let observers = std::mem::take(&mut state.observers);
                    (event, observers, state.upstream.take())
                } else {
                    (event, state.observers.clone(), None)
                }
            };
            if let Some(upstream) = upstream {
                upstream.dispose();
            }
            // Every observer gets this event before any event queued meanwhile
            for (_, observer) in observers {
                observer.send(event.clone());
            }
        }
    }
}

/// Releases the drainer role if an observer panics.
struct DeliveryGuard<'a, T, E> {
    core: &'a SignalCore<T, E>,
}

impl<T, E> Drop for DeliveryGuard<'_, T, E> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.core.lock().draining = false;
        }
    }
}

/// A hot, multicast stream of events.
///
/// Created together with its input [`Observer`] by [`Signal::pipe`]. Events
/// sent before an observer subscribes are not replayed, except for the
/// terminal event, which every later subscriber receives immediately.
///
/// Signals derived with [`map`](Self::map) and friends subscribe to their
/// parent only while they have observers of their own.
pub struct Signal<T, E> {
    core: Arc<SignalCore<T, E>>,
}

impl<T, E> Clone for Signal<T, E> {
    fn clone(&self) -> Self {
        Self {
            core: self.core.clone(),
        }
    }
}

impl<T, E> fmt::Debug for Signal<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.core.lock();
        f.debug_struct("Signal")
            .field("observers", &state.observers.len())
            .field("pending", &state.pending.len())
            .field("terminated", &state.closed)
            .finish()
    }
}

impl<T, E> Signal<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Create a signal and the observer that feeds it.
    pub fn pipe() -> (Self, Observer<T, E>) {
        let signal = Self {
            core: Arc::new(SignalCore::new(None)),
        };
        let input = signal.input();
        (signal, input)
    }

    fn derived<F>(connect: F) -> Self
    where
        F: Fn(Observer<T, E>) -> Disposable + Send + Sync + 'static,
    {
        Self {
            core: Arc::new(SignalCore::new(Some(Box::new(connect)))),
        }
    }

    fn input(&self) -> Observer<T, E> {
        let core = self.core.clone();
        Observer::new(move |event| core.deliver(event))
    }

    fn connect(&self) {
        let Some(connect) = &self.core.connect else {
            return;
        };
        let upstream = connect(self.input());
        let stale = {
            let mut state = self.core.lock();
            if state.connected && state.upstream.is_none() {
                state.upstream = Some(upstream);
                None
            } else {
                // Terminated or lost every observer while connecting
                Some(upstream)
            }
        };
        if let Some(stale) = stale {
            stale.dispose();
        }
    }

    /// Subscribe an observer.
    ///
    /// Disposing the returned handle detaches the observer. If the signal has
    /// already terminated, the observer receives the terminal event right away.
    pub fn observe(&self, observer: Observer<T, E>) -> Disposable {
        let (id, connect) = {
            let mut state = self.core.lock();
            if let Some(terminal) = state.terminal.clone() {
                drop(state);
                observer.send(terminal);
                return Disposable::empty();
            }

            let id = state.next_id;
            state.next_id += 1;
            state.observers.push((id, observer));
            let connect = self.core.connect.is_some() && !state.connected;
            if connect {
                state.connected = true;
            }
            (id, connect)
        };
        if connect {
            self.connect();
        }

        let core: Weak<SignalCore<T, E>> = Arc::downgrade(&self.core);
        Disposable::new(move || {
            if let Some(core) = core.upgrade() {
                core.remove(id);
            }
        })
    }

    /// Subscribe a plain event handler.
    pub fn observe_with<F>(&self, action: F) -> Disposable
    where
        F: Fn(Event<T, E>) + Send + Sync + 'static,
    {
        self.observe(Observer::new(action))
    }

    /// Subscribe to values only.
    pub fn observe_values<F>(&self, action: F) -> Disposable
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        self.observe_with(move |event| {
            if let Event::Value(value) = event {
                action(value);
            }
        })
    }

    /// Whether a terminal event has been sent.
    pub fn is_terminated(&self) -> bool {
        self.core.lock().closed
    }

    /// Number of attached observers.
    pub fn observer_count(&self) -> usize {
        self.core.lock().observers.len()
    }

    /// Derive a signal that maps values and drops those mapped to `None`.
    ///
    /// The derived signal terminates together with this one.
    pub fn filter_map<U, F>(&self, f: F) -> Signal<U, E>
    where
        U: Clone + Send + 'static,
        F: Fn(T) -> Option<U> + Send + Sync + 'static,
    {
        let parent = self.clone();
        let f = Arc::new(f);
        Signal::derived(move |input: Observer<U, E>| {
            let f = f.clone();
            parent.observe_with(move |event| match event {
                Event::Value(value) => {
                    if let Some(mapped) = f(value) {
                        input.send_value(mapped);
                    }
                }
                Event::Failed(error) => input.send_failed(error),
                Event::Completed => input.send_completed(),
                Event::Interrupted => input.send_interrupted(),
            })
        })
    }

    /// Derive a signal of mapped values.
    pub fn map<U, F>(&self, f: F) -> Signal<U, E>
    where
        U: Clone + Send + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        self.filter_map(move |value| Some(f(value)))
    }

    /// Derive a signal that only forwards values matching `predicate`.
    pub fn filter<F>(&self, predicate: F) -> Signal<T, E>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.filter_map(move |value| predicate(&value).then_some(value))
    }

    /// Derive a signal with mapped failures.
    pub fn map_error<E2, F>(&self, f: F) -> Signal<T, E2>
    where
        E2: Clone + Send + 'static,
        F: Fn(E) -> E2 + Send + Sync + 'static,
    {
        let parent = self.clone();
        let f = Arc::new(f);
        Signal::derived(move |input: Observer<T, E2>| {
            let f = f.clone();
            parent.observe_with(move |event| input.send(event.map_error(|error| f(error))))
        })
    }
}

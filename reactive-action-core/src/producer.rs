//! Cold, restartable streams
//!
//! A [`SignalProducer`] describes a unit of work without running it. Each call
//! to [`SignalProducer::start`] runs the body again with a fresh observer and a
//! fresh lifetime, and returns the [`Disposable`] that cancels that run.
//!
//! Every run obeys the same contract:
//! - at most one terminal event reaches the observer, whichever of natural
//!   termination and cancellation happens first
//! - after the terminal event the run's lifetime is disposed, so resources the
//!   body registered with it are released deterministically
//! - disposing a run that has not terminated delivers `Interrupted`

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::disposable::{CompositeDisposable, Disposable};
use crate::signal::{Event, Observer};

type Body<T, E> = dyn Fn(Observer<T, E>, &CompositeDisposable) + Send + Sync;

/// A lazily started, restartable stream of events.
pub struct SignalProducer<T, E> {
    body: Arc<Body<T, E>>,
}

impl<T, E> Clone for SignalProducer<T, E> {
    fn clone(&self) -> Self {
        Self {
            body: self.body.clone(),
        }
    }
}

impl<T, E> fmt::Debug for SignalProducer<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalProducer").finish_non_exhaustive()
    }
}

impl<T, E> SignalProducer<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Create a producer from a body.
    ///
    /// The body receives the run's observer and its lifetime. Anything added to
    /// the lifetime is disposed when the run terminates or is cancelled.
    ///
    /// # Example
    ///
    /// ```
    /// use reactive_action_core::SignalProducer;
    /// use std::convert::Infallible;
    ///
    /// let countdown = SignalProducer::<u32, Infallible>::new(|observer, _lifetime| {
    ///     for n in (1..=3).rev() {
    ///         observer.send_value(n);
    ///     }
    ///     observer.send_completed();
    /// });
    ///
    /// let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
    /// let sink = seen.clone();
    /// countdown.start_with(move |event| sink.lock().unwrap().push(event));
    /// assert_eq!(seen.lock().unwrap().len(), 4);
    /// ```
    pub fn new<F>(body: F) -> Self
    where
        F: Fn(Observer<T, E>, &CompositeDisposable) + Send + Sync + 'static,
    {
        Self {
            body: Arc::new(body),
        }
    }

    /// Run the producer, delivering its events to `observer`.
    pub fn start(&self, observer: Observer<T, E>) -> Disposable {
        let lifetime = CompositeDisposable::new();
        let handle = lifetime.as_disposable();
        let terminated = Arc::new(AtomicBool::new(false));

        let guarded = {
            let handle = handle.clone();
            Observer::new(move |event: Event<T, E>| {
                if event.is_terminating() {
                    if terminated.swap(true, Ordering::AcqRel) {
                        return;
                    }
                    observer.send(event);
                    handle.dispose();
                } else if !terminated.load(Ordering::Acquire) {
                    observer.send(event);
                }
            })
        };

        (self.body)(guarded.clone(), &lifetime);

        // Registered last so the body's own resources are released before the
        // interruption is observed.
        lifetime.add_fn(move || guarded.send_interrupted());
        handle
    }

    /// Run the producer with a plain event handler.
    pub fn start_with<F>(&self, action: F) -> Disposable
    where
        F: Fn(Event<T, E>) + Send + Sync + 'static,
    {
        self.start(Observer::new(action))
    }

    /// A producer that sends one value and completes.
    pub fn value(value: T) -> Self
    where
        T: Sync,
    {
        Self::new(move |observer, _| {
            observer.send_value(value.clone());
            observer.send_completed();
        })
    }

    /// A producer that sends every value in order and completes.
    pub fn values(values: Vec<T>) -> Self
    where
        T: Sync,
    {
        Self::new(move |observer, _| {
            for value in &values {
                observer.send_value(value.clone());
            }
            observer.send_completed();
        })
    }

    /// A producer that fails immediately.
    pub fn failed(error: E) -> Self
    where
        E: Sync,
    {
        Self::new(move |observer, _| observer.send_failed(error.clone()))
    }

    /// A producer that completes immediately.
    pub fn empty() -> Self {
        Self::new(|observer, _| observer.send_completed())
    }

    /// A producer that never sends anything until it is disposed.
    pub fn never() -> Self {
        Self::new(|_, _| {})
    }

    /// Map every value.
    pub fn map<U, F>(&self, f: F) -> SignalProducer<U, E>
    where
        U: Clone + Send + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        let source = self.clone();
        let f = Arc::new(f);
        SignalProducer::new(move |observer: Observer<U, E>, lifetime| {
            let f = f.clone();
            lifetime.add(source.start(Observer::new(move |event: Event<T, E>| {
                observer.send(event.map(|value| f(value)))
            })));
        })
    }

    /// Map the failure.
    pub fn map_error<E2, F>(&self, f: F) -> SignalProducer<T, E2>
    where
        E2: Clone + Send + 'static,
        F: Fn(E) -> E2 + Send + Sync + 'static,
    {
        let source = self.clone();
        let f = Arc::new(f);
        SignalProducer::new(move |observer: Observer<T, E2>, lifetime| {
            let f = f.clone();
            lifetime.add(source.start(Observer::new(move |event: Event<T, E>| {
                observer.send(event.map_error(|error| f(error)))
            })));
        })
    }
}

//! Observable scalar values
//!
//! A property is a value that changes over time: it can be read at any moment
//! and its subsequent changes can be observed as a [`Signal`].
//!
//! - [`PropertySource`]: the read-and-observe capability an
//!   [`Action`](crate::Action) consumes
//! - [`MutableProperty`]: a writable property, safe to write from observers of
//!   its own changes
//! - [`Property`]: a read-only view, possibly derived with [`Property::map`]

use std::convert::Infallible;
use std::fmt;
use std::sync::{Arc, Weak};

use crate::disposable::Disposable;
use crate::producer::SignalProducer;
use crate::serial::Serialized;
use crate::signal::Signal;

/// A value that can be read now and observed as it changes.
pub trait PropertySource<T>: Send + Sync {
    /// The latest value.
    fn value(&self) -> T;

    /// A signal of every value set after subscription.
    fn signal(&self) -> Signal<T, Infallible>;
}

/// A thread-safe, writable property.
///
/// Writes are linearized and their change notifications are delivered in
/// write order. A write issued from inside a change notification of the same
/// property is queued and delivered once the current notification returns,
/// so feedback loops through a property never deadlock.
///
/// # Example
///
/// ```
/// use reactive_action_core::{MutableProperty, PropertySource};
///
/// let count = MutableProperty::new(0);
/// let doubled = count.read_only().map(|n| n * 2);
///
/// count.set(21);
/// assert_eq!(doubled.value(), 42);
/// ```
pub struct MutableProperty<T> {
    cell: Arc<Serialized<T, T>>,
    signal: Signal<T, Infallible>,
}

impl<T> Clone for MutableProperty<T> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
            signal: self.signal.clone(),
        }
    }
}

impl<T> MutableProperty<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a property holding `initial`.
    pub fn new(initial: T) -> Self {
        let (signal, input) = Signal::pipe();
        let cell = Serialized::new(initial, move |value: T| input.send_value(value));
        Self {
            cell: Arc::new(cell),
            signal,
        }
    }

    /// Replace the value and notify observers.
    pub fn set(&self, value: T) {
        store(&self.cell, value);
    }

    /// Mutate the value in place and notify observers with the result.
    pub fn modify<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        self.cell.modify(|value, changes| {
            let result = f(value);
            changes.push(value.clone());
            result
        })
    }

    /// A read-only view sharing this property's value and changes.
    pub fn read_only(&self) -> Property<T> {
        let cell = self.cell.clone();
        Property::new(move || cell.read(T::clone), self.signal.clone())
    }

    /// Take the source's current value and follow its changes.
    ///
    /// The binding holds this property weakly; it stops when the returned
    /// handle is disposed or the property is dropped.
    pub fn bind(&self, source: &impl PropertySource<T>) -> Disposable {
        let target: Weak<Serialized<T, T>> = Arc::downgrade(&self.cell);
        let disposable = source.signal().observe_values(move |value| {
            if let Some(cell) = target.upgrade() {
                store(&cell, value);
            }
        });
        self.set(source.value());
        disposable
    }
}

fn store<T: Clone>(cell: &Serialized<T, T>, value: T) {
    cell.modify(|current, changes| {
        *current = value.clone();
        changes.push(value);
    });
}

impl<T> PropertySource<T> for MutableProperty<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn value(&self) -> T {
        self.cell.read(T::clone)
    }

    fn signal(&self) -> Signal<T, Infallible> {
        self.signal.clone()
    }
}

impl<T: fmt::Debug> fmt::Debug for MutableProperty<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutableProperty")
            .field("cell", &self.cell)
            .finish()
    }
}

/// A read-only property.
pub struct Property<T> {
    get: Arc<dyn Fn() -> T + Send + Sync>,
    signal: Signal<T, Infallible>,
}

impl<T> Clone for Property<T> {
    fn clone(&self) -> Self {
        Self {
            get: self.get.clone(),
            signal: self.signal.clone(),
        }
    }
}

impl<T> Property<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Build a property from a getter and the signal of its changes.
    pub fn new<G>(get: G, signal: Signal<T, Infallible>) -> Self
    where
        G: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            get: Arc::new(get),
            signal,
        }
    }

    /// A property that never changes.
    pub fn constant(value: T) -> Self {
        let (signal, input) = Signal::pipe();
        input.send_completed();
        Self::new(move || value.clone(), signal)
    }

    /// A producer that sends the current value, then every change.
    pub fn producer(&self) -> SignalProducer<T, Infallible> {
        let property = self.clone();
        SignalProducer::new(move |observer, lifetime| {
            let changes = observer.clone();
            lifetime.add(property.signal.observe_values(move |value| changes.send_value(value)));
            observer.send_value(property.value());
        })
    }

    /// Derive a property by mapping every value.
    pub fn map<U, F>(&self, f: F) -> Property<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        let get = self.get.clone();
        let map = f.clone();
        Property::new(move || map(get()), self.signal.map(move |value| f(value)))
    }
}

impl<T> PropertySource<T> for Property<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn value(&self) -> T {
        (self.get)()
    }

    fn signal(&self) -> Signal<T, Infallible> {
        self.signal.clone()
    }
}

impl<T: fmt::Debug> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("value", &(self.get)())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::Event;
    use std::sync::Mutex;

    fn changes<T>(property: &impl PropertySource<T>) -> Arc<Mutex<Vec<T>>>
    where
        T: Clone + Send + 'static,
    {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        property
            .signal()
            .observe_values(move |value| sink.lock().unwrap().push(value));
        seen
    }

    #[test]
    fn test_set_and_observe() {
        let property = MutableProperty::new(1);
        let seen = changes(&property);

        property.set(2);
        property.modify(|v| *v += 10);

        assert_eq!(property.value(), 12);
        assert_eq!(*seen.lock().unwrap(), vec![2, 12]);
    }

    #[test]
    fn test_write_from_own_observer() {
        let property = MutableProperty::new(0);
        let seen = changes(&property);
        let feedback = property.clone();
        property.signal().observe_values(move |v| {
            if v < 3 {
                feedback.set(v + 1);
            }
        });

        property.set(1);

        assert_eq!(property.value(), 3);
        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_read_only_map() {
        let property = MutableProperty::new(2);
        let squared = property.read_only().map(|v| v * v);
        let seen = changes(&squared);

        property.set(3);

        assert_eq!(squared.value(), 9);
        assert_eq!(*seen.lock().unwrap(), vec![9]);
    }

    #[test]
    fn test_unobserved_map_does_not_subscribe() {
        let property = MutableProperty::new(1);
        for _ in 0..1000 {
            let negated = property.read_only().map(|v| -v);
            assert_eq!(negated.value(), -1);
        }
        assert_eq!(property.signal().observer_count(), 0);

        let binding = MutableProperty::new(0).bind(&property.read_only().map(|v| v * 10));
        assert_eq!(property.signal().observer_count(), 1);
        binding.dispose();
        assert_eq!(property.signal().observer_count(), 0);
    }

    #[test]
    fn test_producer_sends_current_then_changes() {
        let property = MutableProperty::new("a".to_string());
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let disposable = property
            .read_only()
            .producer()
            .start_with(move |event| sink.lock().unwrap().push(event));

        property.set("b".to_string());
        disposable.dispose();
        property.set("c".to_string());

        assert_eq!(
            *events.lock().unwrap(),
            vec![
                Event::Value("a".to_string()),
                Event::Value("b".to_string()),
                Event::Interrupted
            ]
        );
    }

    #[test]
    fn test_bind() {
        let source = MutableProperty::new(true);
        let target = MutableProperty::new(false);

        let binding = target.bind(&source.read_only().map(|v| !v));
        assert!(!target.value());

        source.set(false);
        assert!(target.value());

        binding.dispose();
        source.set(true);
        assert!(target.value());
    }

    #[test]
    fn test_constant() {
        let property = Property::constant(7);
        assert_eq!(property.value(), 7);
        assert!(property.signal().is_terminated());
    }
}

//! Async stream adapters
//!
//! [`EventStream`] exposes a signal or a producer run as a
//! [`tokio_stream::Stream`] of [`Event`]s, so async code can `await` an
//! action's outcome:
//!
//! ```ignore
//! use tokio_stream::StreamExt;
//!
//! let events: Vec<_> = action.apply(4).into_stream().collect().await;
//! ```

use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::mpsc;
use tokio_stream::{Stream, StreamExt};

use crate::disposable::Disposable;
use crate::producer::SignalProducer;
use crate::signal::{Event, Observer, Signal};

/// An async stream of events, ending after the terminal event.
///
/// Dropping the stream disposes the underlying subscription; for a producer
/// run that means cancelling it.
#[derive(Debug)]
pub struct EventStream<T, E> {
    receiver: mpsc::UnboundedReceiver<Event<T, E>>,
    subscription: Disposable,
    done: bool,
}

impl<T, E> EventStream<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn attach(subscribe: impl FnOnce(Observer<T, E>) -> Disposable) -> Self {
        let (tx, receiver) = mpsc::unbounded_channel();
        let subscription = subscribe(Observer::new(move |event| {
            let _ = tx.send(event);
        }));
        Self {
            receiver,
            subscription,
            done: false,
        }
    }

    /// Only the values, ending at the terminal event.
    pub fn values(self) -> impl Stream<Item = T> {
        self.filter_map(|event| match event {
            Event::Value(value) => Some(value),
            _ => None,
        })
    }
}

impl<T, E> Stream for EventStream<T, E> {
    type Item = Event<T, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }
        match self.receiver.poll_recv(cx) {
            Poll::Ready(Some(event)) => {
                if event.is_terminating() {
                    self.done = true;
                }
                Poll::Ready(Some(event))
            }
            Poll::Ready(None) => {
                self.done = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T, E> Drop for EventStream<T, E> {
    fn drop(&mut self) {
        self.subscription.dispose();
    }
}

impl<T, E> Signal<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Events sent after this call, as an async stream.
    pub fn into_stream(&self) -> EventStream<T, E> {
        EventStream::attach(|observer| self.observe(observer))
    }
}

impl<T, E> SignalProducer<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Start the producer and expose the run as an async stream.
    pub fn into_stream(&self) -> EventStream<T, E> {
        EventStream::attach(|observer| self.start(observer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_producer_into_stream() {
        let events: Vec<_> = SignalProducer::<i32, Infallible>::values(vec![1, 2])
            .into_stream()
            .collect()
            .await;

        assert_eq!(events, vec![Event::Value(1), Event::Value(2), Event::Completed]);
    }

    #[tokio::test]
    async fn test_stream_ends_after_failure() {
        let events: Vec<_> = SignalProducer::<i32, &'static str>::failed("nope")
            .into_stream()
            .collect()
            .await;

        assert_eq!(events, vec![Event::Failed("nope")]);
    }

    #[tokio::test]
    async fn test_signal_into_stream() {
        let (signal, input) = Signal::<&'static str, Infallible>::pipe();
        let stream = signal.into_stream();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            input.send_value("a");
            input.send_value("b");
            input.send_completed();
        });

        let values: Vec<_> = tokio::time::timeout(Duration::from_millis(500), stream.values().collect())
            .await
            .expect("timeout");
        assert_eq!(values, vec!["a", "b"]);
    }

    #[test]
    fn test_drop_detaches_and_cancels() {
        let (signal, _input) = Signal::<i32, Infallible>::pipe();
        let events = signal.into_stream();
        assert_eq!(signal.observer_count(), 1);
        drop(events);
        assert_eq!(signal.observer_count(), 0);

        let released = Arc::new(AtomicBool::new(false));
        let r = released.clone();
        let producer = SignalProducer::<i32, Infallible>::new(move |_, lifetime| {
            let r = r.clone();
            lifetime.add_fn(move || r.store(true, Ordering::SeqCst));
        });
        drop(producer.into_stream());
        assert!(released.load(Ordering::SeqCst));
    }
}

//! Async work as producers
//!
//! Bridges Tokio futures and streams into [`SignalProducer`]s so they can serve
//! as an action's unit of work. Every start spawns a fresh task onto the
//! current runtime; disposing the run cancels it.
//!
//! # Example
//!
//! ```ignore
//! use reactive_action::{Action, SignalProducer};
//!
//! let fetch = Action::always(|user_id: u64| {
//!     SignalProducer::from_future(move || async move { api::fetch_profile(user_id).await })
//! });
//! ```

use std::future::Future;

use tokio::task::JoinHandle;
use tokio_stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::producer::SignalProducer;

impl<T, E> SignalProducer<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// A producer that runs a future on each start.
    ///
    /// `Ok` sends the value and completes, `Err` fails. Disposing the run
    /// aborts the task; nothing is sent after the interruption.
    ///
    /// # Panics
    ///
    /// Starting the producer outside a Tokio runtime panics, as
    /// [`tokio::spawn`] does.
    pub fn from_future<F, Fut>(make: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self::new(move |observer, lifetime| {
            let future = make();
            let handle: JoinHandle<()> = tokio::spawn(async move {
                match future.await {
                    Ok(value) => {
                        observer.send_value(value);
                        observer.send_completed();
                    }
                    Err(error) => observer.send_failed(error),
                }
            });

            let abort = handle.abort_handle();
            lifetime.add_fn(move || abort.abort());
        })
    }

    /// A producer that forwards a stream on each start.
    ///
    /// Items are forwarded until the first `Err`, which fails the run, or the
    /// end of the stream, which completes it.
    ///
    /// # Panics
    ///
    /// Starting the producer outside a Tokio runtime panics, as
    /// [`tokio::spawn`] does.
    pub fn from_stream<F, S>(make: F) -> Self
    where
        F: Fn() -> S + Send + Sync + 'static,
        S: Stream<Item = Result<T, E>> + Send + 'static,
    {
        Self::new(move |observer, lifetime| {
            let stream = make();
            let cancel_token = CancellationToken::new();
            let token = cancel_token.clone();

            tokio::spawn(async move {
                tokio::pin!(stream);
                loop {
                    tokio::select! {
                        _ = token.cancelled() => {
                            trace!("Stream producer cancelled");
                            break;
                        }
                        item = stream.next() => match item {
                            Some(Ok(value)) => observer.send_value(value),
                            Some(Err(error)) => {
                                observer.send_failed(error);
                                break;
                            }
                            None => {
                                observer.send_completed();
                                break;
                            }
                        },
                    }
                }
            });

            lifetime.add_fn(move || cancel_token.cancel());
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::Event;
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn channel_start<T, E>(
        producer: &SignalProducer<T, E>,
    ) -> (mpsc::UnboundedReceiver<Event<T, E>>, crate::Disposable)
    where
        T: Clone + Send + 'static,
        E: Clone + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let disposable = producer.start_with(move |event| {
            let _ = tx.send(event);
        });
        (rx, disposable)
    }

    async fn recv<T, E>(rx: &mut mpsc::UnboundedReceiver<Event<T, E>>) -> Event<T, E> {
        tokio::time::timeout(Duration::from_millis(500), rx.recv())
            .await
            .expect("timeout")
            .expect("channel closed")
    }

    #[tokio::test]
    async fn test_from_future_value() {
        let producer = SignalProducer::<i32, String>::from_future(|| async { Ok(42) });
        let (mut rx, _) = channel_start(&producer);

        assert_eq!(recv(&mut rx).await, Event::Value(42));
        assert_eq!(recv(&mut rx).await, Event::Completed);
    }

    #[tokio::test]
    async fn test_from_future_error() {
        let producer =
            SignalProducer::<i32, String>::from_future(|| async { Err("offline".to_string()) });
        let (mut rx, _) = channel_start(&producer);

        assert_eq!(recv(&mut rx).await, Event::Failed("offline".to_string()));
    }

    #[tokio::test]
    async fn test_from_future_runs_per_start() {
        let runs = Arc::new(AtomicUsize::new(0));
        let r = runs.clone();
        let producer = SignalProducer::<usize, Infallible>::from_future(move || {
            let r = r.clone();
            async move { Ok(r.fetch_add(1, Ordering::SeqCst)) }
        });

        let (mut first, _) = channel_start(&producer);
        assert_eq!(recv(&mut first).await, Event::Value(0));
        let (mut second, _) = channel_start(&producer);
        assert_eq!(recv(&mut second).await, Event::Value(1));
    }

    #[tokio::test]
    async fn test_dispose_aborts_future() {
        let finished = Arc::new(AtomicBool::new(false));
        let f = finished.clone();
        let producer = SignalProducer::<i32, Infallible>::from_future(move || {
            let f = f.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                f.store(true, Ordering::SeqCst);
                Ok(1)
            }
        });

        let (mut rx, disposable) = channel_start(&producer);
        disposable.dispose();
        assert_eq!(recv(&mut rx).await, Event::Interrupted);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!finished.load(Ordering::SeqCst));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_from_stream_forwards_until_end() {
        let producer = SignalProducer::<i32, String>::from_stream(|| {
            tokio_stream::iter(vec![Ok(1), Ok(2), Ok(3)])
        });
        let (mut rx, _) = channel_start(&producer);

        assert_eq!(recv(&mut rx).await, Event::Value(1));
        assert_eq!(recv(&mut rx).await, Event::Value(2));
        assert_eq!(recv(&mut rx).await, Event::Value(3));
        assert_eq!(recv(&mut rx).await, Event::Completed);
    }

    #[tokio::test]
    async fn test_from_stream_stops_at_error() {
        let producer = SignalProducer::<i32, String>::from_stream(|| {
            tokio_stream::iter(vec![Ok(1), Err("bad frame".to_string()), Ok(3)])
        });
        let (mut rx, _) = channel_start(&producer);

        assert_eq!(recv(&mut rx).await, Event::Value(1));
        assert_eq!(recv(&mut rx).await, Event::Failed("bad frame".to_string()));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_from_stream_cancelled() {
        let producer = SignalProducer::<i32, Infallible>::from_stream(|| {
            tokio_stream::pending::<Result<i32, Infallible>>()
        });
        let (mut rx, disposable) = channel_start(&producer);

        disposable.dispose();
        assert_eq!(recv(&mut rx).await, Event::Interrupted);
    }
}

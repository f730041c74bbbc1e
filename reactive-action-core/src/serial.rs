//! Reentrancy-tolerant atomic state cell
//!
//! [`Serialized`] couples a piece of state with a FIFO of change
//! notifications. Mutations run under a mutex and only enqueue notifications;
//! delivery happens afterwards with the mutex released, performed by a single
//! "drainer" at a time:
//!
//! - the first caller that finds notifications pending and no active drainer
//!   becomes the drainer and delivers until the queue is empty
//! - a nested `modify` issued from inside a delivery (same thread) only
//!   enqueues; the outer drainer picks it up after the current delivery
//! - a concurrent `modify` from another thread also only enqueues while a
//!   drainer is active
//!
//! Every mutation is therefore linearized by the mutex, and notifications are
//! delivered exactly once, in that same order, without a lock ever being held
//! across a callback.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

struct Inner<S, N> {
    state: S,
    pending: VecDeque<N>,
    draining: bool,
}

pub(crate) struct Serialized<S, N> {
    inner: Mutex<Inner<S, N>>,
    deliver: Box<dyn Fn(N) + Send + Sync>,
}

impl<S, N> Serialized<S, N> {
    pub(crate) fn new<F>(state: S, deliver: F) -> Self
    where
        F: Fn(N) + Send + Sync + 'static,
    {
        Self {
            inner: Mutex::new(Inner {
                state,
                pending: VecDeque::new(),
                draining: false,
            }),
            deliver: Box::new(deliver),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<S, N>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mutate the state atomically.
    ///
    /// `f` pushes the notifications its mutation produces; they are delivered
    /// after the lock is released, before this call returns unless another
    /// delivery is already in progress further up the stack or on another
    /// thread.
    pub(crate) fn modify<R>(&self, f: impl FnOnce(&mut S, &mut Vec<N>) -> R) -> R {
        self.modify_then(f, |_| {})
    }

    /// Like [`modify`](Self::modify), running `then` once the lock is released
    /// and before the notifications this call queued are delivered.
    pub(crate) fn modify_then<R>(
        &self,
        f: impl FnOnce(&mut S, &mut Vec<N>) -> R,
        then: impl FnOnce(&R),
    ) -> R {
        let mut produced = Vec::new();
        let (result, drain) = {
            let mut inner = self.lock();
            let result = f(&mut inner.state, &mut produced);
            inner.pending.extend(produced);
            let drain = !inner.draining && !inner.pending.is_empty();
            if drain {
                inner.draining = true;
            }
            (result, drain)
        };
        if drain {
            let _guard = DrainGuard { cell: self };
            then(&result);
            self.drain();
        } else {
            then(&result);
        }
        result
    }

    /// Inspect the state atomically.
    pub(crate) fn read<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.lock().state)
    }

    fn drain(&self) {
        loop {
            let next = {
                let mut inner = self.lock();
                match inner.pending.pop_front() {
                    Some(next) => next,
                    None => {
                        inner.draining = false;
                        return;
                    }
                }
            };
            (self.deliver)(next);
        }
    }
}

impl<S: fmt::Debug, N> fmt::Debug for Serialized<S, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("Serialized")
            .field("state", &inner.state)
            .field("pending", &inner.pending.len())
            .field("draining", &inner.draining)
            .finish()
    }
}

/// Releases the drainer role if a delivery callback panics.
struct DrainGuard<'a, S, N> {
    cell: &'a Serialized<S, N>,
}

impl<S, N> Drop for DrainGuard<'_, S, N> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.cell.lock().draining = false;
        }
    }
}

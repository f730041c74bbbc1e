//! Cancellation handles returned from every subscription
//!
//! A [`Disposable`] wraps a teardown closure that runs at most once, no matter
//! how many clones of the handle call [`Disposable::dispose`] or from which
//! thread. A [`CompositeDisposable`] groups several handles so a whole
//! subscription tree can be torn down with one call.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

type Teardown = Box<dyn FnOnce() + Send>;

struct DisposableInner {
    disposed: AtomicBool,
    teardown: Mutex<Option<Teardown>>,
}

/// Handle that cancels a subscription or releases a resource.
///
/// Cloning the handle shares the same underlying teardown; disposing any
/// clone disposes all of them.
#[derive(Clone)]
pub struct Disposable {
    inner: Arc<DisposableInner>,
}

impl Disposable {
    /// Create a handle that runs `teardown` the first time it is disposed.
    pub fn new<F>(teardown: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            inner: Arc::new(DisposableInner {
                disposed: AtomicBool::new(false),
                teardown: Mutex::new(Some(Box::new(teardown))),
            }),
        }
    }

    /// Create a handle with nothing to tear down.
    pub fn empty() -> Self {
        Self {
            inner: Arc::new(DisposableInner {
                disposed: AtomicBool::new(false),
                teardown: Mutex::new(None),
            }),
        }
    }

    /// Run the teardown if it has not run yet.
    ///
    /// The teardown runs outside any internal lock, so it may itself dispose
    /// other handles (or this one again, which is a no-op).
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let teardown = self
            .inner
            .teardown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(teardown) = teardown {
            teardown();
        }
    }

    /// Whether [`dispose`](Self::dispose) has been called on any clone.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }
}

impl fmt::Debug for Disposable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Disposable")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl Default for Disposable {
    fn default() -> Self {
        Self::empty()
    }
}

/// Ordered bag of disposables torn down together.
///
/// Adding to a composite that was already disposed disposes the new item
/// immediately.
#[derive(Clone)]
pub struct CompositeDisposable {
    items: Arc<Mutex<Option<Vec<Disposable>>>>,
}

impl CompositeDisposable {
    /// Create an empty composite.
    pub fn new() -> Self {
        Self {
            items: Arc::new(Mutex::new(Some(Vec::new()))),
        }
    }

    /// Add a disposable to the bag.
    pub fn add(&self, disposable: Disposable) {
        let rejected = {
            let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
            match items.as_mut() {
                Some(items) => {
                    items.push(disposable);
                    None
                }
                None => Some(disposable),
            }
        };
        if let Some(disposable) = rejected {
            disposable.dispose();
        }
    }

    /// Add a teardown closure to the bag.
    pub fn add_fn<F>(&self, teardown: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.add(Disposable::new(teardown));
    }

    /// Dispose every item in insertion order.
    pub fn dispose(&self) {
        let items = self
            .items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        for item in items.into_iter().flatten() {
            item.dispose();
        }
    }

    /// Whether the composite has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// A single handle that disposes the whole composite.
    pub fn as_disposable(&self) -> Disposable {
        let composite = self.clone();
        Disposable::new(move || composite.dispose())
    }
}

impl Default for CompositeDisposable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CompositeDisposable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("CompositeDisposable")
            .field("items", &items.as_ref().map(Vec::len))
            .finish()
    }
}

//! reactive-action: Repeatable, cancellable, mutually exclusive units of work
//!
//! An [`Action`] wraps a unit-of-work factory. Applying it starts one attempt;
//! while that attempt is in flight every other attempt is rejected with
//! [`ActionError::Disabled`]. The action's enabled and executing status are
//! observable properties, and every accepted attempt's events are republished
//! on action-wide streams.
//!
//! # Example
//! ```
//! use reactive_action::prelude::*;
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct InvalidInput(u32);
//!
//! let form_valid = MutableProperty::new(false);
//! let submit: Action<u32, u32, InvalidInput> = Action::enabled_if(&form_valid, |n: u32| {
//!     if n == 0 {
//!         SignalProducer::failed(InvalidInput(n))
//!     } else {
//!         SignalProducer::value(n * 10)
//!     }
//! });
//!
//! let mut recorder = EventRecorder::new();
//! recorder.record_producer(&submit.apply(3));
//! assert_eq!(recorder.drain(), vec![Event::Failed(ActionError::Disabled)]);
//!
//! form_valid.set(true);
//! recorder.record_producer(&submit.apply(3));
//! assert_eq!(recorder.drain(), vec![Event::Value(30), Event::Completed]);
//! ```

// Re-export everything from core
pub use reactive_action_core::*;

/// Prelude for convenient imports
pub mod prelude {
    // Action
    pub use reactive_action_core::{Action, ActionConfig, ActionError, ActionEvent};

    // Reactive primitives
    pub use reactive_action_core::{
        CompositeDisposable, Disposable, Event, MutableProperty, Observer, Property,
        PropertySource, Signal, SignalProducer,
    };

    // Execution log
    pub use reactive_action_core::{ExecutionLog, ExecutionLogConfig, Outcome};

    // Testing
    pub use reactive_action_core::testing::EventRecorder;

    // Async adapters
    #[cfg(feature = "tasks")]
    pub use reactive_action_core::EventStream;
}

//! Actions whose state source is fed from their own status.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reactive_action::prelude::*;
use tokio_stream::StreamExt;

fn delayed(value: u32) -> SignalProducer<u32, String> {
    SignalProducer::from_future(move || async move {
        tokio::time::sleep(Duration::from_millis(5)).await;
        Ok(value)
    })
}

#[tokio::test]
async fn test_negated_executing_bound_into_state() {
    let state = MutableProperty::new(true);
    let action: Action<u32, u32, String> = Action::enabled_if(&state, delayed);
    let _binding = state.bind(&action.is_executing().map(|executing| !executing));

    let events: Vec<_> = tokio::time::timeout(Duration::from_secs(1), action.apply(1).into_stream().collect())
        .await
        .expect("deadlocked");

    assert_eq!(events, vec![Event::Value(1), Event::Completed]);
    assert!(state.value());
    assert!(action.is_enabled().value());
    assert!(!action.is_executing().value());
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Enabled(bool),
    Executing(bool),
}

fn record_status<I, O, E>(action: &Action<I, O, E>) -> Arc<Mutex<Vec<Status>>>
where
    I: Send + 'static,
    O: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    action
        .is_enabled()
        .signal()
        .observe_values(move |enabled| sink.lock().unwrap().push(Status::Enabled(enabled)));
    let sink = seen.clone();
    action
        .is_executing()
        .signal()
        .observe_values(move |executing| sink.lock().unwrap().push(Status::Executing(executing)));
    seen
}

async fn run(action: &Action<u32, u32, String>, n: u32) -> Vec<ActionEvent<u32, String>> {
    tokio::time::timeout(Duration::from_secs(1), action.apply(n).into_stream().collect())
        .await
        .expect("deadlocked")
}

#[tokio::test]
async fn test_filtered_feedback_follows_external_flag() {
    use Status::{Enabled, Executing};

    let source = MutableProperty::new(true);
    let locked = MutableProperty::new(false);
    let action: Action<u32, u32, String> = Action::enabled_if(&source, delayed);
    let status = record_status(&action);

    // Whenever the action becomes enabled while locked, switch the source off
    let (target, flag) = (source.clone(), locked.clone());
    let _feedback = action
        .is_enabled()
        .signal()
        .filter(move |enabled| *enabled && flag.value())
        .observe_values(move |_| target.set(false));

    assert_eq!(run(&action, 1).await, vec![Event::Value(1), Event::Completed]);
    assert!(source.value());
    assert_eq!((action.is_enabled().value(), action.is_executing().value()), (true, false));

    locked.set(true);
    assert_eq!(run(&action, 2).await, vec![Event::Value(2), Event::Completed]);
    assert!(!source.value());
    assert_eq!((action.is_enabled().value(), action.is_executing().value()), (false, false));
    assert_eq!(
        run(&action, 3).await,
        vec![Event::Failed(ActionError::Disabled)]
    );

    locked.set(false);
    source.set(true);
    assert_eq!((action.is_enabled().value(), action.is_executing().value()), (true, false));

    assert_eq!(
        *status.lock().unwrap(),
        vec![
            Enabled(false),
            Executing(true),
            Enabled(true),
            Executing(false),
            Enabled(false),
            Executing(true),
            Enabled(true),
            Executing(false),
            Enabled(false),
            Enabled(true),
        ]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_attempts_across_threads() {
    let state = MutableProperty::new(true);
    let started = Arc::new(AtomicUsize::new(0));
    let in_flight = Arc::new(AtomicUsize::new(0));
    let most_in_flight = Arc::new(AtomicUsize::new(0));

    let (counter, current, most) = (started.clone(), in_flight.clone(), most_in_flight.clone());
    let action: Action<u32, u32, String> = Action::enabled_if(&state, move |n| {
        counter.fetch_add(1, Ordering::SeqCst);
        let (current, most) = (current.clone(), most.clone());
        SignalProducer::from_future(move || {
            let (current, most) = (current.clone(), most.clone());
            async move {
                let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                most.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                current.fetch_sub(1, Ordering::SeqCst);
                Ok(n)
            }
        })
    });
    let _binding = state.bind(&action.is_executing().map(|executing| !executing));

    let attempts: Vec<_> = (0..16)
        .map(|n| {
            let action = action.clone();
            tokio::spawn(async move { action.apply(n).into_stream().collect::<Vec<_>>().await })
        })
        .collect();

    let mut accepted = 0;
    let mut rejected = 0;
    for attempt in attempts {
        let events = tokio::time::timeout(Duration::from_secs(2), attempt)
            .await
            .expect("deadlocked")
            .expect("task panicked");
        match events.as_slice() {
            [Event::Failed(ActionError::Disabled)] => rejected += 1,
            [Event::Value(_), Event::Completed] => accepted += 1,
            other => panic!("unexpected events: {other:?}"),
        }
    }

    assert_eq!(accepted + rejected, 16);
    assert_eq!(accepted, started.load(Ordering::SeqCst));
    assert!(accepted >= 1);
    assert_eq!(most_in_flight.load(Ordering::SeqCst), 1);
    assert_eq!(in_flight.load(Ordering::SeqCst), 0);
    assert!(!action.is_executing().value());
    assert!(action.is_enabled().value());
}

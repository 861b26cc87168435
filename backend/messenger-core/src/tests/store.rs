use crate::contract::StateContract;
use crate::error::store::StoreError;
use crate::store::{Schedule, SubscriptionTicket, ValueStore};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::{Value, json};

fn counter_store() -> ValueStore {
    ValueStore::new([("counter", json!(0))])
}

/// Collects every value an observer sees.
fn recorder() -> (Arc<Mutex<Vec<Value>>>, impl Fn(&Value) + Send + Sync + 'static) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    (seen, move |value: &Value| sink.lock().unwrap().push(value.clone()))
}

struct Counter;

impl StateContract for Counter {
    const KEY: &'static str = "counter";
    type Value = u32;
}

/// Counts how many jobs ran through it.
#[derive(Default)]
struct CountingScheduler {
    runs: AtomicUsize,
}

impl Schedule for CountingScheduler {
    fn run(&self, job: &mut dyn FnMut()) {
        self.runs.fetch_add(1, Ordering::SeqCst);
        job()
    }
}

/// Never runs the job it is given.
struct DroppingScheduler;

impl Schedule for DroppingScheduler {
    fn run(&self, _job: &mut dyn FnMut()) {}
}

/// **VALUE**: Verifies the full watch → update → unsubscribe lifecycle on one key.
///
/// **WHY THIS MATTERS**: This is the store's reason to exist. A renderer that
/// misses the replayed value starts with a blank UI; one that keeps receiving after
/// unsubscribing leaks work into torn-down views.
#[test]
fn given_counter_store_when_watched_updated_and_unsubscribed_then_sees_exactly_two_values() {
    // GIVEN: A store initialized with { counter: 0 } and an observer
    let store = counter_store();
    let (seen, observer) = recorder();

    // WHEN: Watching, updating, unsubscribing, updating again
    let ticket = store.watch("counter", observer).expect("counter is declared");
    assert_eq!(*seen.lock().unwrap(), vec![json!(0)], "Replay must happen before watch returns");
    store.update("counter", json!(5));
    store.unsubscribe(&ticket);
    store.update("counter", json!(9));

    // THEN: Observer saw the replay and the first update only
    assert_eq!(*seen.lock().unwrap(), vec![json!(0), json!(5)]);
    assert_eq!(store.value("counter"), Some(json!(9)), "Value still advances");
}

/// **VALUE**: Verifies observers receive updates in call order without skips.
#[test]
fn given_observer_when_many_updates_then_receives_all_in_order() {
    // GIVEN: A watched key
    let store = counter_store();
    let (seen, observer) = recorder();
    store.watch("counter", observer).unwrap();

    // WHEN: Publishing a sequence
    for n in 1..=50 {
        store.update("counter", json!(n));
    }

    // THEN: Replay plus every update, in order
    let expected: Vec<Value> = (0..=50).map(|n| json!(n)).collect();
    assert_eq!(*seen.lock().unwrap(), expected);
}

/// **VALUE**: Verifies unsubscribe releases exactly one subscription.
#[test]
fn given_two_observers_when_one_unsubscribes_then_other_keeps_receiving() {
    // GIVEN: Two observers on the same key
    let store = counter_store();
    let (first_seen, first) = recorder();
    let (second_seen, second) = recorder();
    let first_ticket = store.watch("counter", first).unwrap();
    store.watch("counter", second).unwrap();

    // WHEN: The first unsubscribes and a value is published
    store.unsubscribe(&first_ticket);
    store.update("counter", json!(1));

    // THEN: Only the second sees it
    assert_eq!(*first_seen.lock().unwrap(), vec![json!(0)]);
    assert_eq!(*second_seen.lock().unwrap(), vec![json!(0), json!(1)]);
    assert_eq!(store.subscriber_count("counter"), 1);
}

/// **VALUE**: Verifies unsubscribe is idempotent and ignores tickets from other stores.
///
/// **BUG THIS CATCHES**: A foreign ticket whose tick collides with a local one would
/// silently cancel somebody else's subscription.
#[test]
fn given_released_or_foreign_ticket_when_unsubscribed_then_nothing_changes() {
    // GIVEN: Two stores with one observer each
    let store = counter_store();
    let other = counter_store();
    let ticket = store.watch("counter", |_| {}).unwrap();
    other.watch("counter", |_| {}).unwrap();

    // WHEN: Releasing twice, and handing the ticket to the other store
    store.unsubscribe(&ticket);
    store.unsubscribe(&ticket);
    other.unsubscribe(&ticket);

    // THEN: Only the original subscription is gone
    assert_eq!(store.subscriber_count("counter"), 0);
    assert_eq!(other.subscriber_count("counter"), 1);
}

/// **VALUE**: Verifies watching an undeclared key is a configuration error.
#[test]
fn given_unknown_key_when_watched_then_returns_unknown_key_error() {
    // GIVEN: A store without "missing"
    let store = counter_store();

    // WHEN: Watching it
    let result = store.watch("missing", |_| panic!("must not be called"));

    // THEN: UnknownKey naming the key
    match result {
        Err(StoreError::UnknownKey { key, .. }) => assert_eq!(key, "missing"),
        other => panic!("Expected UnknownKey, got {:?}", other.map(|t| t.to_string())),
    }
}

/// **VALUE**: Verifies updating an undeclared key neither errors nor notifies.
#[test]
fn given_unknown_key_when_updated_then_is_silent_no_op() {
    // GIVEN: An observer on a declared key
    let store = counter_store();
    let (seen, observer) = recorder();
    store.watch("counter", observer).unwrap();

    // WHEN: Updating an undeclared key
    store.update("missing", json!("ignored"));

    // THEN: Nothing observed, nothing created
    assert_eq!(*seen.lock().unwrap(), vec![json!(0)]);
    assert_eq!(store.value("missing"), None);
    assert_eq!(store.keys(), vec![String::from("counter")]);
}

/// **VALUE**: Verifies dispose releases everything, is idempotent, and silences updates.
#[test]
fn given_watched_store_when_disposed_twice_then_no_further_notifications() {
    // GIVEN: Observers on a store
    let store = counter_store();
    let (seen, observer) = recorder();
    store.watch("counter", observer).unwrap();
    store.watch("counter", |_| {}).unwrap();

    // WHEN: Disposing twice and updating
    store.dispose();
    store.dispose();
    store.update("counter", json!(3));

    // THEN: Subscriptions are gone and no value was delivered
    assert!(store.is_disposed());
    assert_eq!(store.subscriber_count("counter"), 0);
    assert_eq!(*seen.lock().unwrap(), vec![json!(0)]);
    assert_eq!(store.value("counter"), Some(json!(0)), "Disposed store ignores updates");
}

/// **VALUE**: Verifies watch on a disposed store is refused instead of leaking.
#[test]
fn given_disposed_store_when_watched_then_returns_disposed_error() {
    // GIVEN: A disposed store
    let store = counter_store();
    store.dispose();

    // WHEN: Watching
    let result = store.watch("counter", |_| panic!("must not be called"));

    // THEN: Disposed error
    assert!(matches!(result, Err(StoreError::Disposed { .. })));
}

/// **VALUE**: Verifies observers may re-enter the store without deadlocking.
///
/// **BUG THIS CATCHES**: Calling observers while holding the store lock would hang
/// the first time a handler mirrors one key into another.
#[test]
fn given_observer_that_updates_other_key_when_notified_then_both_keys_change() {
    // GIVEN: An observer on "a" that mirrors into "b"
    let store = ValueStore::new([("a", json!(0)), ("b", json!(0))]);
    let mirror = store.clone();
    store
        .watch("a", move |value| mirror.update("b", json!(value.as_i64().unwrap_or(0) * 10)))
        .unwrap();

    // WHEN: Updating "a"
    store.update("a", json!(4));

    // THEN: "b" followed
    assert_eq!(store.value("b"), Some(json!(40)));
}

/// **VALUE**: Verifies an observer released mid-notification does not get that value.
///
/// **BUG THIS CATCHES**: Would catch delivery from the snapshot of observers taken
/// before the first callback ran, which reaches subscribers already unsubscribed.
#[test]
fn given_observer_that_unsubscribes_later_one_when_notified_then_later_one_is_skipped() {
    // GIVEN: Observer A that releases observer B on the first real update
    let store = counter_store();
    let victim: Arc<Mutex<Option<SubscriptionTicket>>> = Arc::new(Mutex::new(None));
    let releaser = store.clone();
    let target = Arc::clone(&victim);
    store
        .watch("counter", move |value| {
            if value == &json!(1) {
                if let Some(ticket) = target.lock().unwrap().take() {
                    releaser.unsubscribe(&ticket);
                }
            }
        })
        .unwrap();
    let (seen, observer) = recorder();
    *victim.lock().unwrap() = Some(store.watch("counter", observer).unwrap());

    // WHEN: Updating
    store.update("counter", json!(1));
    store.update("counter", json!(2));

    // THEN: B saw only its replay
    assert_eq!(*seen.lock().unwrap(), vec![json!(0)]);
    assert_eq!(store.subscriber_count("counter"), 1);
}

/// **VALUE**: Verifies a dispose from inside an observer stops the rest of the delivery.
#[test]
fn given_observer_that_disposes_store_when_notified_then_later_observers_are_skipped() {
    // GIVEN: First observer disposes on update, second records
    let store = counter_store();
    let disposer = store.clone();
    store
        .watch("counter", move |value| {
            if value == &json!(1) {
                disposer.dispose();
            }
        })
        .unwrap();
    let (seen, observer) = recorder();
    store.watch("counter", observer).unwrap();

    // WHEN: Updating
    store.update("counter", json!(1));

    // THEN: Second observer saw only its replay
    assert_eq!(*seen.lock().unwrap(), vec![json!(0)]);
    assert!(store.is_disposed());
}

/// **VALUE**: Verifies tickets are unique and render with their key.
#[test]
fn given_several_watches_when_tickets_issued_then_each_is_distinct() {
    // GIVEN: A store
    let store = counter_store();

    // WHEN: Watching three times
    let tickets: Vec<_> = (0..3).map(|_| store.watch("counter", |_| {}).unwrap()).collect();

    // THEN: All distinct and keyed
    assert_ne!(tickets[0], tickets[1]);
    assert_ne!(tickets[1], tickets[2]);
    assert!(tickets.iter().all(|t| t.key() == "counter"));
    assert!(tickets[0].to_string().starts_with("Messenger::counter::"));
}

/// **VALUE**: Verifies the reactive stream always holds the latest value.
#[tokio::test]
async fn given_value_stream_when_updated_then_receiver_observes_change() {
    // GIVEN: A stream on the counter
    let store = counter_store();
    let mut stream = store.value_stream("counter").unwrap();
    assert_eq!(*stream.borrow(), json!(0));

    // WHEN: Updating
    store.update("counter", json!(7));

    // THEN: The receiver is notified with the new value
    stream.changed().await.expect("sender alive");
    assert_eq!(*stream.borrow_and_update(), json!(7));
    assert!(store.value_stream("missing").is_err());
}

/// **VALUE**: Verifies registration and updates run through the scheduling hook.
#[test]
fn given_scheduler_when_watching_and_updating_then_each_runs_through_hook() {
    // GIVEN: A store with a counting scheduler
    let scheduler = Arc::new(CountingScheduler::default());
    let store = ValueStore::with_scheduler([("counter", json!(0))], scheduler.clone());
    let (seen, observer) = recorder();

    // WHEN: One watch and two updates
    store.watch("counter", observer).unwrap();
    store.update("counter", json!(1));
    store.update("counter", json!(2));

    // THEN: Three scheduled jobs, ordering unchanged
    assert_eq!(scheduler.runs.load(Ordering::SeqCst), 3);
    assert_eq!(*seen.lock().unwrap(), vec![json!(0), json!(1), json!(2)]);
}

#[test]
fn given_closure_scheduler_when_updating_then_closure_wraps_each_job() {
    // GIVEN: A closure that records entry and exit around each job
    let trace = Arc::new(Mutex::new(Vec::new()));
    let hook_trace = Arc::clone(&trace);
    let scheduler = move |job: &mut dyn FnMut()| {
        hook_trace.lock().unwrap().push("enter");
        job();
        hook_trace.lock().unwrap().push("exit");
    };
    let store = ValueStore::with_scheduler([("counter", json!(0))], Arc::new(scheduler));
    let job_trace = Arc::clone(&trace);
    store
        .watch("counter", move |_| job_trace.lock().unwrap().push("notify"))
        .unwrap();

    // WHEN: One update
    trace.lock().unwrap().clear();
    store.update("counter", json!(1));

    // THEN: Notification ran inside the closure
    assert_eq!(*trace.lock().unwrap(), vec!["enter", "notify", "exit"]);
}

/// **VALUE**: Verifies a scheduler that drops work surfaces as an error, not a lost ticket.
#[test]
fn given_scheduler_that_never_runs_when_watching_then_returns_unscheduled_error() {
    // GIVEN: A store whose scheduler drops jobs
    let store = ValueStore::with_scheduler([("counter", json!(0))], Arc::new(DroppingScheduler));

    // WHEN: Watching
    let result = store.watch("counter", |_| {});

    // THEN: Unscheduled
    assert!(matches!(result, Err(StoreError::Unscheduled { .. })));
}

/// **VALUE**: Verifies typed access through the context view.
#[test]
fn given_context_host_when_using_typed_slot_then_values_round_trip_through_store() {
    // GIVEN: A context over the counter store
    let store = counter_store();
    let context = store.host();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    context
        .watch_state::<Counter, _>(move |n| sink.lock().unwrap().push(n))
        .unwrap();

    // WHEN: Setting through the typed API and publishing junk through the raw one
    context.set::<Counter>(&11).unwrap();
    context.update("counter", json!("not a number"));

    // THEN: Typed watcher saw decodable values only; get reports the decode failure
    assert_eq!(*seen.lock().unwrap(), vec![0, 11]);
    assert!(matches!(context.get::<Counter>(), Err(StoreError::Decode { .. })));
}

/// **VALUE**: Verifies the per-key slot view mirrors the store.
#[test]
fn given_slot_when_updated_then_store_and_watchers_follow() {
    // GIVEN: A slot on the counter
    let store = counter_store();
    let context = store.host();
    let slot = context.slot("counter").expect("declared");
    let (seen, observer) = recorder();
    slot.watch(observer).unwrap();

    // WHEN: Updating through the slot
    slot.update(json!(2));

    // THEN: Everything agrees
    assert_eq!(slot.value(), json!(2));
    assert_eq!(store.value("counter"), Some(json!(2)));
    assert_eq!(*seen.lock().unwrap(), vec![json!(0), json!(2)]);
    assert!(context.slot("missing").is_none());
}

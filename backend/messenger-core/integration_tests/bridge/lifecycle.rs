use crate::helpers::{Add, HostRecord, Log, Tick, host_contract, host_handlers};

use messenger_core::client::{ClientCallbacks, ClientMessenger, ClientOptions};
use messenger_core::contract::{Contract, Mode};
use messenger_core::error::contract::ContractError;
use messenger_core::error::store::StoreError;
use messenger_core::host::{HandlerFault, ServiceHandlers, ServiceMessenger};
use messenger_core::transport::memory::MemoryBridge;

use std::sync::{Arc, Mutex};

use serde_json::{Value, json};

const CLIENT_EVENT: &str = "Messenger::Message::ClientEvent";
const SERVICE_RESPONSE: &str = "Messenger::Message::ServiceResponse";
const ADD_CHANNEL: &str = "Messenger::Invoke::Ipc::add";

/// **VALUE**: Verifies installing the host dispatcher repeatedly replaces delivery.
///
/// **WHY THIS MATTERS**: Hot reload re-runs installation. If listeners stacked, every
/// reload would multiply each message the host receives.
///
/// **BUG THIS CATCHES**: Would catch if install skipped `remove_all_listeners` before `on`.
#[tokio::test]
async fn given_host_installed_three_times_when_client_sends_once_then_handler_runs_once() {
    // GIVEN: Three installations on the same transport
    let bridge = MemoryBridge::new();
    let record = HostRecord::default();
    let messenger = ServiceMessenger::new([("last_log", Value::Null)]);
    let _targets: Vec<_> = (0..3)
        .map(|_| {
            messenger
                .install(bridge.host(), &host_contract(), host_handlers(&record))
                .expect("install")
        })
        .collect();

    let client = ClientMessenger::new(Vec::<(String, Value)>::new(), ClientOptions::default())
        .install(bridge.connect(), &host_contract(), ClientCallbacks::new());

    // WHEN: One send
    client
        .dispatcher()
        .send::<Log>(&String::from("once"))
        .expect("send");

    // THEN: Observed exactly once
    assert_eq!(record.logs(), vec![String::from("once")]);
    assert_eq!(bridge.host().listener_count(CLIENT_EVENT), 1);
}

/// **VALUE**: Verifies the renderer listener is also replaced on reinstall.
#[tokio::test]
async fn given_client_installed_twice_when_host_broadcasts_then_callback_runs_once() {
    // GIVEN: Host plus a renderer installed twice
    let bridge = MemoryBridge::new();
    let record = HostRecord::default();
    let _service = ServiceMessenger::new([("last_log", Value::Null)])
        .install(bridge.host(), &host_contract(), host_handlers(&record))
        .expect("install");

    let renderer = bridge.connect();
    let messenger = ClientMessenger::new([("ticks", json!(0))], ClientOptions::default());
    let callbacks = || {
        ClientCallbacks::new().on::<Tick, _>(|delegate| {
            let ticks = delegate.context.value("ticks").and_then(|v| v.as_i64()).unwrap_or(0);
            delegate.context.update("ticks", json!(ticks + 1));
        })
    };
    let _first = messenger.install(renderer.clone(), &host_contract(), callbacks());
    let second = messenger.install(renderer.clone(), &host_contract(), callbacks());

    // WHEN: One invoke that broadcasts once
    second
        .dispatcher()
        .invoke::<Add>(&(1, 2))
        .await
        .expect("invoke");

    // THEN: One callback run
    assert_eq!(second.context().value("ticks"), Some(json!(1)));
    assert_eq!(renderer.listener_count(SERVICE_RESPONSE), 1);
}

/// **VALUE**: Verifies dispose unregisters everything the installation registered.
#[tokio::test]
async fn given_installed_targets_when_disposed_then_registrations_and_store_are_released() {
    // GIVEN: Host and renderer installed, renderer watching a key
    let bridge = MemoryBridge::new();
    let record = HostRecord::default();
    let service = ServiceMessenger::new([("last_log", Value::Null)])
        .install(bridge.host(), &host_contract(), host_handlers(&record))
        .expect("install");
    let renderer = bridge.connect();
    let client = ClientMessenger::new([("total", json!(0))], ClientOptions::default()).install(
        renderer.clone(),
        &host_contract(),
        ClientCallbacks::new(),
    );
    client.context().watch("total", |_| {}).expect("watch");

    // WHEN: Disposing both, twice
    service.dispose();
    service.dispose();
    client.dispose();
    client.dispose();

    // THEN: Nothing registered, stores closed
    let host = bridge.host();
    assert_eq!(host.listener_count(CLIENT_EVENT), 0);
    assert!(!host.has_handler(ADD_CHANNEL));
    assert!(!host.has_handler("Messenger::Invoke::Ipc::fail"));
    assert_eq!(renderer.listener_count(SERVICE_RESPONSE), 0);
    assert!(matches!(
        client.context().watch("total", |_| {}),
        Err(StoreError::Disposed { .. })
    ));
    assert!(matches!(
        service.context().watch("last_log", |_| {}),
        Err(StoreError::Disposed { .. })
    ));
}

/// **VALUE**: Verifies disposing a superseded installation leaves the newer one working.
///
/// **BUG THIS CATCHES**: Would catch the hot-reload race where the old target's cleanup
/// runs after the new installation and tears down its listener, its handlers, or the
/// store both installations share.
#[tokio::test]
async fn given_superseded_target_when_disposed_then_newer_installation_keeps_working() {
    // GIVEN: Two host installations, each with a watch through its own context
    let bridge = MemoryBridge::new();
    let messenger = ServiceMessenger::new([("last_log", Value::Null)]);
    let record = HostRecord::default();
    let old = messenger
        .install(bridge.host(), &host_contract(), host_handlers(&record))
        .expect("install");
    let current = messenger
        .install(bridge.host(), &host_contract(), host_handlers(&record))
        .expect("install");

    let old_seen = Arc::new(Mutex::new(Vec::new()));
    let old_sink = Arc::clone(&old_seen);
    old.context()
        .watch("last_log", move |value| old_sink.lock().unwrap().push(value.clone()))
        .expect("watch");
    let current_seen = Arc::new(Mutex::new(Vec::new()));
    let current_sink = Arc::clone(&current_seen);
    current
        .context()
        .watch("last_log", move |value| current_sink.lock().unwrap().push(value.clone()))
        .expect("watch");

    // WHEN: Disposing the older one, then sending through a renderer
    old.dispose();
    let client = ClientMessenger::new(Vec::<(String, Value)>::new(), ClientOptions::default())
        .install(bridge.connect(), &host_contract(), ClientCallbacks::new());
    client
        .dispatcher()
        .send::<Log>(&String::from("after-reload"))
        .expect("send");

    // THEN: Registrations and the shared store remain live for the newer target
    let host = bridge.host();
    assert_eq!(host.listener_count(CLIENT_EVENT), 1);
    assert!(host.has_handler(ADD_CHANNEL));
    assert!(current.invoke_channels().iter().any(|c| c == ADD_CHANNEL));
    assert_eq!(record.logs(), vec![String::from("after-reload")]);
    assert_eq!(
        current.context().value("last_log"),
        Some(json!("after-reload"))
    );
    assert!(current.context().watch("last_log", |_| {}).is_ok());

    // AND: Only the old target's own subscription was released
    assert_eq!(*old_seen.lock().unwrap(), vec![Value::Null]);
    assert_eq!(
        *current_seen.lock().unwrap(),
        vec![Value::Null, json!("after-reload")]
    );

    current.dispose();
    assert_eq!(host.listener_count(CLIENT_EVENT), 0);
    assert!(!host.has_handler(ADD_CHANNEL));
    assert!(matches!(
        current.context().watch("last_log", |_| {}),
        Err(StoreError::Disposed { .. })
    ));
}

/// **VALUE**: Verifies the renderer side survives disposal of a superseded target too.
#[tokio::test]
async fn given_superseded_client_target_when_disposed_then_newer_target_receives_broadcasts() {
    // GIVEN: Host plus a renderer installed twice on one messenger
    let bridge = MemoryBridge::new();
    let record = HostRecord::default();
    let _service = ServiceMessenger::new([("last_log", Value::Null)])
        .install(bridge.host(), &host_contract(), host_handlers(&record))
        .expect("install");
    let renderer = bridge.connect();
    let messenger = ClientMessenger::new([("total", json!(0))], ClientOptions::default());
    let callbacks = || {
        ClientCallbacks::new().on::<Tick, _>(|delegate| {
            delegate.context.update("total", json!(delegate.data));
        })
    };
    let old = messenger.install(renderer.clone(), &host_contract(), callbacks());
    let current = messenger.install(renderer.clone(), &host_contract(), callbacks());

    // WHEN: Disposing the older target, then invoking through the newer one
    old.dispose();
    let sum = current
        .dispatcher()
        .invoke::<Add>(&(3, 4))
        .await
        .expect("invoke");

    // THEN: Listener and store still work
    assert_eq!(sum, 7);
    assert_eq!(renderer.listener_count(SERVICE_RESPONSE), 1);
    assert_eq!(current.context().value("total"), Some(json!(7)));
    assert!(current.context().watch("total", |_| {}).is_ok());
}

/// **VALUE**: Verifies installation refuses handler sets that do not match the contract.
///
/// **WHY THIS MATTERS**: A mismatch would otherwise surface only when the renderer calls
/// the key, as a silent drop or a `NoHandler` far from the cause.
#[tokio::test]
async fn given_mismatched_handlers_when_installing_then_returns_contract_error() {
    let bridge = MemoryBridge::new();
    let messenger = ServiceMessenger::new(Vec::<(String, Value)>::new());
    let contract = Contract::new().message::<Log>().invoke::<Add>();

    // Missing "add"
    let missing = ServiceHandlers::new().message::<Log, _>(|_| {});
    assert!(matches!(
        messenger.install(bridge.host(), &contract, missing),
        Err(ContractError::MissingHandler { ref key, mode: Mode::Invoke, .. }) if key == "add"
    ));

    // "add" registered as a message handler
    let wrong_direction = ServiceHandlers::new()
        .message::<Log, _>(|_| {})
        .message_raw("add", |_| {});
    assert!(matches!(
        messenger.install(bridge.host(), &contract, wrong_direction),
        Err(ContractError::DirectionMismatch {
            declared: Mode::Invoke,
            registered: Mode::Message,
            ..
        })
    ));

    // Extra "reset" nobody declared
    let undeclared = ServiceHandlers::new()
        .message::<Log, _>(|_| {})
        .invoke::<Add, _, _>(|d| async move { Ok::<i64, HandlerFault>(d.data.0 + d.data.1) })
        .message_raw("reset", |_| {});
    assert!(matches!(
        messenger.install(bridge.host(), &contract, undeclared),
        Err(ContractError::UndeclaredHandler { ref key, .. }) if key == "reset"
    ));

    // Nothing was registered by the failed attempts
    assert_eq!(bridge.host().listener_count(CLIENT_EVENT), 0);
    assert!(!bridge.host().has_handler(ADD_CHANNEL));
}

use crate::helpers::{Add, Boom, Fail, HostRecord, Log, Tick, host_contract, host_handlers};

use messenger_core::client::{ClientCallbacks, ClientMessenger, ClientOptions, ClientTarget};
use messenger_core::contract::{Contract, Mode};
use messenger_core::error::dispatch::DispatchError;
use messenger_core::error::transport::TransportError;
use messenger_core::host::{ServiceMessenger, ServiceTarget};
use messenger_core::transport::memory::{MemoryBridge, MemoryClient};
use messenger_core::transport::{HostHandler, HostTransport, PeerRef};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::future::BoxFuture;
use serde_json::{Value, json};

struct Harness {
    bridge: MemoryBridge,
    renderer: Arc<MemoryClient>,
    record: HostRecord,
    service: ServiceTarget,
    client: ClientTarget,
}

fn harness(options: ClientOptions) -> Harness {
    let bridge = MemoryBridge::new();
    let record = HostRecord::default();

    let host = ServiceMessenger::new([("last_log", Value::Null)]);
    let service = host
        .install(bridge.host(), &host_contract(), host_handlers(&record))
        .expect("host install");

    let renderer = bridge.connect();
    let messenger = ClientMessenger::new([("total", json!(0))], options);
    let callbacks = ClientCallbacks::new().on::<Tick, _>(|delegate| {
        delegate.context.update("total", json!(delegate.data));
    });
    let client = messenger.install(renderer.clone(), &host_contract(), callbacks);

    Harness {
        bridge,
        renderer,
        record,
        service,
        client,
    }
}

/// **VALUE**: Verifies a fire-and-forget send reaches the host handler with its payload.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - The envelope is sent on the wrong channel
/// - The host listener fails to decode `{key, data}`
/// - The handler does not get the host's context
#[tokio::test]
async fn given_installed_pair_when_client_sends_then_host_handler_runs_once() {
    // GIVEN: Host and renderer installed on one bridge
    let h = harness(ClientOptions::default());

    // WHEN: Renderer sends a log line
    h.client
        .dispatcher()
        .send::<Log>(&String::from("hello"))
        .expect("send");

    // THEN: Host saw it once and mirrored it into its store
    assert_eq!(h.record.logs(), vec![String::from("hello")]);
    assert_eq!(h.service.context().value("last_log"), Some(json!("hello")));
    assert_eq!(h.record.tokens(), vec![None]);
}

/// **VALUE**: Verifies the token source is called per envelope and reaches the handler.
#[tokio::test]
async fn given_token_source_when_calling_host_then_each_envelope_carries_fresh_token() {
    // GIVEN: A token source that counts calls
    let issued = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&issued);
    let options = ClientOptions {
        token: Some(Arc::new(move || {
            format!("token-{}", counter.fetch_add(1, Ordering::SeqCst))
        })),
        ..ClientOptions::default()
    };
    let h = harness(options);

    // WHEN: One send and one invoke
    h.client
        .dispatcher()
        .send::<Log>(&String::from("a"))
        .expect("send");
    h.client
        .dispatcher()
        .invoke::<Add>(&(1, 1))
        .await
        .expect("invoke");

    // THEN: Two distinct tokens were attached
    assert_eq!(
        h.record.tokens(),
        vec![Some(String::from("token-0")), Some(String::from("token-1"))]
    );
    assert_eq!(issued.load(Ordering::SeqCst), 2);
}

/// **VALUE**: Verifies invoke returns the handler's value and its broadcast reaches the renderer.
///
/// **WHY THIS MATTERS**: Request/response plus host push is the core round trip. The
/// broadcast must land in the renderer store before the invoke resolves on this bridge.
#[tokio::test]
async fn given_invoke_handler_when_client_invokes_then_returns_result_and_broadcast_updates_store()
{
    // GIVEN: Renderer watching its total
    let h = harness(ClientOptions::default());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    h.client
        .context()
        .watch("total", move |value| sink.lock().unwrap().push(value.clone()))
        .expect("watch");

    // WHEN: Invoking add(2, 3)
    let sum = h
        .client
        .dispatcher()
        .invoke::<Add>(&(2, 3))
        .await
        .expect("invoke");

    // THEN: Result and broadcast both arrived
    assert_eq!(sum, 5);
    assert_eq!(*seen.lock().unwrap(), vec![json!(0), json!(5)]);
}

/// **VALUE**: Verifies a handler fault reaches the caller as a `Remote` error with its message.
///
/// **BUG THIS CATCHES**: Would catch if a failure reply were returned as data, or if the
/// fault message were replaced with a generic one.
#[tokio::test]
async fn given_faulting_handler_when_invoked_then_caller_gets_remote_error_with_message() {
    // GIVEN: Installed pair
    let h = harness(ClientOptions::default());

    // WHEN: Invoking the faulting key
    let result = h
        .client
        .dispatcher()
        .invoke::<Fail>(&String::from("x"))
        .await;

    // THEN: Remote error carrying "x"
    match result {
        Err(DispatchError::Remote { message, .. }) => assert_eq!(message, "x"),
        other => panic!("Expected Remote error, got {:?}", other),
    }
}

/// **VALUE**: Verifies a panicking handler still answers the caller.
///
/// **BUG THIS CATCHES**: Would catch an unwinding handler that drops the reply, leaving
/// the caller waiting on a request that never settles.
#[tokio::test]
async fn given_panicking_handler_when_invoked_then_caller_gets_remote_error() {
    // GIVEN: Installed pair
    let h = harness(ClientOptions::default());

    // WHEN: Invoking the panicking key
    let result = h.client.dispatcher().invoke::<Boom>(&()).await;

    // THEN: Remote error naming the panic, and the host keeps serving
    match result {
        Err(DispatchError::Remote { message, .. }) => assert!(message.contains("handler bug")),
        other => panic!("Expected Remote error, got {:?}", other),
    }
    let sum = h.client.dispatcher().invoke::<Add>(&(1, 2)).await.unwrap();
    assert_eq!(sum, 3);
}

#[tokio::test]
async fn given_remote_error_when_displayed_then_prefixed_with_invoke_error() {
    let h = harness(ClientOptions::default());

    let error = h
        .client
        .dispatcher()
        .invoke::<Fail>(&String::from("disk full"))
        .await
        .unwrap_err();

    assert!(error.to_string().starts_with("InvokeError: disk full"));
}

/// **VALUE**: Verifies the dispatcher rejects undeclared keys and wrong directions locally.
#[tokio::test]
async fn given_dispatcher_when_misused_then_returns_key_and_mode_errors() {
    let h = harness(ClientOptions::default());
    let dispatcher = h.client.dispatcher();

    assert!(matches!(
        dispatcher.send_raw("nope", Value::Null),
        Err(DispatchError::UnknownKey { .. })
    ));
    assert!(matches!(
        dispatcher.send_raw("add", json!([1, 2])),
        Err(DispatchError::ModeMismatch {
            declared: Mode::Invoke,
            attempted: Mode::Message,
            ..
        })
    ));
    assert!(matches!(
        dispatcher.invoke_raw("log", json!("x")).await,
        Err(DispatchError::ModeMismatch {
            declared: Mode::Message,
            attempted: Mode::Invoke,
            ..
        })
    ));
    assert!(dispatcher.endpoint("add").is_some());
    assert_eq!(h.record.calls(), 0);
}

/// **VALUE**: Verifies invoking a key the host never registered fails with `NoHandler`.
#[tokio::test]
async fn given_key_host_does_not_handle_when_invoked_then_returns_no_handler() {
    // GIVEN: Renderer contract with an extra invoke key
    let h = harness(ClientOptions::default());
    let contract = host_contract().declare("missing", Mode::Invoke);
    let target = ClientMessenger::new([("total", json!(0))], ClientOptions::default()).install(
        h.renderer.clone(),
        &contract,
        ClientCallbacks::new(),
    );

    // WHEN: Invoking it
    let result = target.dispatcher().invoke_raw("missing", Value::Null).await;

    // THEN: Transport-level NoHandler
    match result {
        Err(DispatchError::Transport(TransportError::NoHandler { channel, .. })) => {
            assert_eq!(channel, "Messenger::Invoke::Ipc::missing");
        }
        other => panic!("Expected NoHandler, got {:?}", other),
    }
}

/// **VALUE**: Verifies replies in the older `{ "__error": true }` shape still surface as errors.
#[tokio::test]
async fn given_peer_answering_legacy_error_shape_when_invoked_then_returns_remote_error() {
    // GIVEN: A raw handler that answers in the legacy shape
    let bridge = MemoryBridge::new();
    let legacy: HostHandler = Arc::new(|_peer: PeerRef, _payload: Value| {
        let reply: BoxFuture<'static, Value> =
            Box::pin(async { json!({ "__error": true, "message": "legacy failure" }) });
        reply
    });
    bridge.host().handle("Messenger::Invoke::Ipc::old", legacy);

    let contract = Contract::new().declare("old", Mode::Invoke);
    let target = ClientMessenger::new(Vec::<(String, Value)>::new(), ClientOptions::default())
        .install(bridge.connect(), &contract, ClientCallbacks::new());

    // WHEN: Invoking
    let result = target.dispatcher().invoke_raw("old", Value::Null).await;

    // THEN: Remote error
    assert!(matches!(
        result,
        Err(DispatchError::Remote { ref message, .. }) if message == "legacy failure"
    ));
}

/// **VALUE**: Verifies broadcasts for keys the renderer has no callback for are dropped quietly.
#[tokio::test]
async fn given_no_callback_for_key_when_host_broadcasts_then_renderer_ignores_it() {
    // GIVEN: Renderer without any callbacks
    let bridge = MemoryBridge::new();
    let record = HostRecord::default();
    let _service = ServiceMessenger::new([("last_log", Value::Null)])
        .install(bridge.host(), &host_contract(), host_handlers(&record))
        .expect("host install");
    let client = ClientMessenger::new([("total", json!(0))], ClientOptions::default()).install(
        bridge.connect(),
        &host_contract(),
        ClientCallbacks::new(),
    );

    // WHEN: Host handler broadcasts `tick` during add
    let sum = client
        .dispatcher()
        .invoke::<Add>(&(4, 4))
        .await
        .expect("invoke");

    // THEN: Invoke succeeded and the renderer store is untouched
    assert_eq!(sum, 8);
    assert_eq!(client.context().value("total"), Some(json!(0)));
}

/// **VALUE**: Verifies a closed renderer surfaces `Closed` instead of silently dropping calls.
#[tokio::test]
async fn given_closed_renderer_when_sending_then_returns_transport_closed() {
    let h = harness(ClientOptions::default());
    h.renderer.close();

    let result = h.client.dispatcher().send::<Log>(&String::from("late"));

    assert!(matches!(
        result,
        Err(DispatchError::Transport(TransportError::Closed { .. }))
    ));
    assert!(h.record.logs().is_empty());
    assert_eq!(h.bridge.host().listener_count("Messenger::Message::ClientEvent"), 1);
}

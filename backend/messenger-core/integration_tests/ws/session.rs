//! Host and renderer over a real localhost socket.
//!
//! Every test binds port 0 so tests can run in parallel.

use crate::helpers::{Add, Boom, Fail, HostRecord, Log, Tick, host_contract, host_handlers, wait_until};

use messenger_core::client::{ClientCallbacks, ClientMessenger, ClientOptions, ClientTarget};
use messenger_core::contract::Mode;
use messenger_core::error::dispatch::DispatchError;
use messenger_core::error::transport::TransportError;
use messenger_core::host::{ServiceMessenger, ServiceTarget};
use messenger_core::transport::ws::{WsClient, WsHost};

use common::RedactedToken;

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

const TEST_AUTH_TOKEN: &str = "test-token-12345";

async fn start_host(record: &HostRecord) -> (Arc<WsHost>, ServiceTarget) {
    let host = WsHost::bind(0, RedactedToken::new(TEST_AUTH_TOKEN))
        .await
        .expect("Failed to bind host");
    let target = ServiceMessenger::new([("last_log", Value::Null)])
        .install(host.clone(), &host_contract(), host_handlers(record))
        .expect("host install");
    (host, target)
}

fn host_url(host: &WsHost) -> Url {
    Url::parse(&format!("ws://{}", host.local_addr())).expect("valid url")
}

async fn connect_renderer(host: &WsHost) -> (Arc<WsClient>, ClientTarget) {
    let client = WsClient::connect(&host_url(host), &RedactedToken::new(TEST_AUTH_TOKEN))
        .await
        .expect("Failed to connect renderer");
    let callbacks = ClientCallbacks::new().on::<Tick, _>(|delegate| {
        delegate.context.update("total", json!(delegate.data));
    });
    let target = ClientMessenger::new([("total", json!(0))], ClientOptions::default()).install(
        client.clone(),
        &host_contract(),
        callbacks,
    );
    (client, target)
}

/// **VALUE**: Verifies a renderer with the right token can call the host over the socket.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - `request_id` correlation between `invoke` and `reply` frames breaks
/// - `event` frames are not routed to renderer listeners
/// - The typed response fails to decode after the round trip
#[tokio::test]
async fn given_authenticated_renderer_when_invoking_then_receives_result_and_broadcast() {
    // GIVEN: Host and authenticated renderer
    let record = HostRecord::default();
    let (host, _service) = start_host(&record).await;
    let (_client, target) = connect_renderer(&host).await;

    // WHEN: Invoking add
    let sum = target
        .dispatcher()
        .invoke::<Add>(&(20, 22))
        .await
        .expect("invoke");

    // THEN: Reply plus the broadcast that preceded it
    assert_eq!(sum, 42);
    assert_eq!(target.context().value("total"), Some(json!(42)));
}

/// **VALUE**: Verifies fire-and-forget sends arrive at the host listener.
#[tokio::test]
async fn given_authenticated_renderer_when_sending_then_host_handler_receives_payload() {
    // GIVEN: Host and authenticated renderer
    let record = HostRecord::default();
    let (host, service) = start_host(&record).await;
    let (_client, target) = connect_renderer(&host).await;

    // WHEN: Sending two lines
    target
        .dispatcher()
        .send::<Log>(&String::from("first"))
        .expect("send");
    target
        .dispatcher()
        .send::<Log>(&String::from("second"))
        .expect("send");

    // THEN: Host saw both, in order
    assert!(wait_until(|| record.logs().len() == 2).await);
    assert_eq!(
        record.logs(),
        vec![String::from("first"), String::from("second")]
    );
    assert_eq!(service.context().value("last_log"), Some(json!("second")));
}

/// **VALUE**: Verifies handler faults cross the socket as `Remote` errors.
#[tokio::test]
async fn given_faulting_handler_when_invoked_over_socket_then_returns_remote_error() {
    let record = HostRecord::default();
    let (host, _service) = start_host(&record).await;
    let (_client, target) = connect_renderer(&host).await;

    let result = target
        .dispatcher()
        .invoke::<Fail>(&String::from("x"))
        .await;

    match result {
        Err(DispatchError::Remote { message, .. }) => assert_eq!(message, "x"),
        other => panic!("Expected Remote error, got {:?}", other),
    }
}

/// **VALUE**: Verifies a panicking handler answers over the socket instead of hanging.
#[tokio::test]
async fn given_panicking_handler_when_invoked_over_socket_then_returns_remote_error() {
    let record = HostRecord::default();
    let (host, _service) = start_host(&record).await;
    let (_client, target) = connect_renderer(&host).await;

    let result = tokio::time::timeout(
        Duration::from_secs(2),
        target.dispatcher().invoke::<Boom>(&()),
    )
    .await
    .expect("invoke must settle");

    match result {
        Err(DispatchError::Remote { message, .. }) => assert!(message.contains("handler bug")),
        other => panic!("Expected Remote error, got {:?}", other),
    }
}

/// **VALUE**: Verifies an invoke on a channel without a handler gets a `fault` frame.
///
/// **BUG THIS CATCHES**: Would catch if the host ignored such invokes, leaving the caller
/// waiting forever.
#[tokio::test]
async fn given_unhandled_channel_when_invoked_then_returns_no_handler() {
    // GIVEN: Renderer whose contract declares an extra key
    let record = HostRecord::default();
    let (host, _service) = start_host(&record).await;
    let client = WsClient::connect(&host_url(&host), &RedactedToken::new(TEST_AUTH_TOKEN))
        .await
        .expect("connect");
    let contract = host_contract().declare("ghost", Mode::Invoke);
    let target = ClientMessenger::new(Vec::<(String, Value)>::new(), ClientOptions::default())
        .install(client.clone(), &contract, ClientCallbacks::new());

    // WHEN: Invoking it
    let result = tokio::time::timeout(
        Duration::from_secs(2),
        target.dispatcher().invoke_raw("ghost", Value::Null),
    )
    .await
    .expect("invoke should not hang");

    // THEN: NoHandler naming the channel
    match result {
        Err(DispatchError::Transport(TransportError::NoHandler { channel, .. })) => {
            assert_eq!(channel, "Messenger::Invoke::Ipc::ghost");
        }
        other => panic!("Expected NoHandler, got {:?}", other),
    }
}

/// **VALUE**: Verifies a wrong token is rejected during connect.
///
/// **WHY THIS MATTERS**: The token is the only thing keeping other local processes from
/// driving the host.
#[tokio::test]
async fn given_wrong_token_when_connecting_then_returns_auth_error() {
    let record = HostRecord::default();
    let (host, _service) = start_host(&record).await;

    let result = WsClient::connect(&host_url(&host), &RedactedToken::new("wrong-token")).await;

    match result {
        Err(TransportError::Auth { message, .. }) => {
            assert_eq!(message, "Invalid authentication token");
        }
        Err(other) => panic!("Expected Auth error, got {:?}", other),
        Ok(_) => panic!("Expected Auth error, connection succeeded"),
    }
}

/// **VALUE**: Verifies the host drops connections whose first frame is not `auth`.
#[tokio::test]
async fn given_unauthenticated_socket_when_sending_first_then_host_closes_connection() {
    // GIVEN: A raw socket
    let record = HostRecord::default();
    let (host, _service) = start_host(&record).await;
    let (mut ws, _) = connect_async(host_url(&host).as_str())
        .await
        .expect("connect");

    // WHEN: Sending a message frame before auth
    let frame = json!({
        "type": "send",
        "channel": "Messenger::Message::ClientEvent",
        "payload": { "key": "log", "data": "sneaky" }
    });
    ws.send(Message::Text(frame.to_string().into()))
        .await
        .expect("send");

    // THEN: Connection closes and the handler never ran
    let closed = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match ws.next().await {
                None | Some(Err(_)) => break true,
                Some(Ok(message)) if message.is_close() => break true,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await
    .unwrap_or(false);
    assert!(closed, "Host should close the connection");
    assert!(record.logs().is_empty());
}

/// **VALUE**: Verifies calls after the host target is disposed fail instead of hanging.
#[tokio::test]
async fn given_host_target_disposed_when_renderer_invokes_then_returns_no_handler() {
    // GIVEN: Renderer connected, then the host target disposed
    let record = HostRecord::default();
    let (host, service) = start_host(&record).await;
    let (client, target) = connect_renderer(&host).await;
    service.dispose();

    // WHEN: Invoking a key whose handler was removed
    let result = tokio::time::timeout(
        Duration::from_secs(2),
        target.dispatcher().invoke::<Add>(&(1, 1)),
    )
    .await
    .expect("invoke should not hang");

    // THEN: NoHandler, connection still usable
    assert!(matches!(
        result,
        Err(DispatchError::Transport(TransportError::NoHandler { .. }))
    ));
    assert!(!client.is_closed());
}

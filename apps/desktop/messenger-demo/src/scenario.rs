//! The demo contract and a scripted host/renderer conversation.
//!
//! [`run`] works over any pair of transports: the binary drives it over the
//! WebSocket bridge, the tests over the in-process bridge.

use crate::error::DemoError;

use messenger_core::client::{ClientCallbacks, ClientMessenger, ClientOptions};
use messenger_core::config::ChannelNames;
use messenger_core::contract::{Contract, InvokeContract, MessageContract, StateContract};
use messenger_core::error::DispatchError;
use messenger_core::host::{HandlerFault, ServiceHandlers, ServiceMessenger};
use messenger_core::transport::{ClientTransport, HostTransport};

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use log::{info, warn};
use serde::Serialize;
use serde_json::json;

const BROADCAST_TIMEOUT: Duration = Duration::from_secs(5);

/// Renderer greets the host; the host bumps its counter and broadcasts it.
pub struct Greet;

impl MessageContract for Greet {
    const KEY: &'static str = "greet";
    type Payload = String;
}

pub struct Sum;

impl InvokeContract for Sum {
    const KEY: &'static str = "sum";
    type Request = Vec<i64>;
    type Response = i64;
}

/// Always fails with `exploded: <request>`.
pub struct Explode;

impl InvokeContract for Explode {
    const KEY: &'static str = "explode";
    type Request = String;
    type Response = ();
}

pub struct CounterChanged;

impl MessageContract for CounterChanged {
    const KEY: &'static str = "counter_changed";
    type Payload = i64;
}

pub struct Counter;

impl StateContract for Counter {
    const KEY: &'static str = "counter";
    type Value = i64;
}

/// Keys the renderer may call on the host.
pub fn contract() -> Contract {
    Contract::new()
        .message::<Greet>()
        .invoke::<Sum>()
        .invoke::<Explode>()
}

pub fn host_handlers() -> ServiceHandlers {
    ServiceHandlers::new()
        .message::<Greet, _>(|delegate| {
            info!(
                "Renderer {} says: {} (token {})",
                delegate.send.peer_id(),
                delegate.data,
                if delegate.token.is_some() { "present" } else { "absent" }
            );

            let next = delegate.context.get::<Counter>().unwrap_or(0) + 1;
            if let Err(e) = delegate.context.set::<Counter>(&next) {
                warn!("Failed to store counter: {}", e);
                return;
            }
            if let Err(e) = delegate.send.send::<CounterChanged>(&next) {
                warn!("Failed to broadcast counter: {}", e);
            }
        })
        .invoke::<Sum, _, _>(|delegate| async move {
            Ok::<i64, HandlerFault>(delegate.data.iter().sum())
        })
        .invoke::<Explode, _, _>(|delegate| async move {
            Err::<(), HandlerFault>(HandlerFault::from(format!("exploded: {}", delegate.data)))
        })
}

pub fn client_callbacks() -> ClientCallbacks {
    ClientCallbacks::new().on::<CounterChanged, _>(|delegate| {
        if let Err(e) = delegate.context.set::<Counter>(&delegate.data) {
            warn!("Failed to mirror counter: {}", e);
        }
    })
}

/// What the renderer observed during one [`run`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioReport {
    /// Every counter value the renderer's watch saw, initial value first.
    pub counter_seen: Vec<i64>,
    pub sum: i64,
    /// Message of the failure `explode` answered with.
    pub fault: String,
}

/// Install both sides, exchange one of each call kind, then dispose.
///
/// # Errors
///
/// Returns [`DemoError`] if installation fails, a call fails unexpectedly,
/// or the counter broadcast does not arrive in time.
pub async fn run(
    host: Arc<dyn HostTransport>,
    renderer: Arc<dyn ClientTransport>,
    channels: &ChannelNames,
) -> Result<ScenarioReport, DemoError> {
    let service = ServiceMessenger::new([(Counter::KEY, json!(0))])
        .with_channels(channels.clone())
        .install(host, &contract(), host_handlers())?;

    let options = ClientOptions {
        token: Some(Arc::new(|| String::from("demo-renderer"))),
        channels: channels.clone(),
        ..ClientOptions::default()
    };
    let client = ClientMessenger::new([(Counter::KEY, json!(0))], options).install(
        renderer,
        &contract(),
        client_callbacks(),
    );

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let ticket = client.context().watch_state::<Counter, _>(move |value| {
        sink.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(value)
    })?;
    let mut counter_stream = client.context().value_stream(Counter::KEY)?;

    client
        .dispatcher()
        .send::<Greet>(&String::from("hello from the renderer"))?;

    tokio::time::timeout(
        BROADCAST_TIMEOUT,
        counter_stream.wait_for(|value| value == &json!(1)),
    )
    .await
    .map_err(|_| DemoError::demo("Counter broadcast did not arrive"))?
    .map_err(|_| DemoError::demo("Counter stream closed"))?;

    let sum = client.dispatcher().invoke::<Sum>(&vec![1, 2, 3, 4]).await?;
    info!("Host summed to {}", sum);

    let fault = match client
        .dispatcher()
        .invoke::<Explode>(&String::from("boom"))
        .await
    {
        Err(DispatchError::Remote { message, .. }) => message,
        Err(e) => return Err(e.into()),
        Ok(()) => return Err(DemoError::demo("explode answered with success")),
    };
    info!("Host failed as expected: {}", fault);

    client.context().unsubscribe(&ticket);
    client.dispose();
    service.dispose();

    let counter_seen = seen
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();

    Ok(ScenarioReport {
        counter_seen,
        sum,
        fault,
    })
}

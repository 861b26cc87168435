//! Shared contract and handlers for messenger integration tests.
//!
//! - `Log`: renderer → host message, recorded and mirrored into `last_log`
//! - `Add`: invoke that also broadcasts `Tick` with the sum
//! - `Fail`: invoke that always faults with the request text
//! - `Boom`: invoke whose handler panics
//! - `Tick`: host → renderer broadcast

use messenger_core::contract::{Contract, InvokeContract, MessageContract};
use messenger_core::host::{HandlerFault, ServiceHandlers};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;

pub struct Log;

impl MessageContract for Log {
    const KEY: &'static str = "log";
    type Payload = String;
}

pub struct Add;

impl InvokeContract for Add {
    const KEY: &'static str = "add";
    type Request = (i64, i64);
    type Response = i64;
}

pub struct Fail;

impl InvokeContract for Fail {
    const KEY: &'static str = "fail";
    type Request = String;
    type Response = ();
}

pub struct Boom;

impl InvokeContract for Boom {
    const KEY: &'static str = "boom";
    type Request = ();
    type Response = ();
}

pub struct Tick;

impl MessageContract for Tick {
    const KEY: &'static str = "tick";
    type Payload = i64;
}

/// What the renderer may call on the host.
pub fn host_contract() -> Contract {
    Contract::new()
        .message::<Log>()
        .invoke::<Add>()
        .invoke::<Fail>()
        .invoke::<Boom>()
}

/// Everything the host handlers observed.
#[derive(Clone, Default)]
pub struct HostRecord {
    pub logs: Arc<Mutex<Vec<String>>>,
    pub tokens: Arc<Mutex<Vec<Option<String>>>>,
    pub calls: Arc<AtomicUsize>,
}

impl HostRecord {
    pub fn logs(&self) -> Vec<String> {
        self.logs.lock().unwrap().clone()
    }

    pub fn tokens(&self) -> Vec<Option<String>> {
        self.tokens.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn host_handlers(record: &HostRecord) -> ServiceHandlers {
    let log_record = record.clone();
    let add_record = record.clone();

    ServiceHandlers::new()
        .message::<Log, _>(move |delegate| {
            log_record.calls.fetch_add(1, Ordering::SeqCst);
            log_record.tokens.lock().unwrap().push(delegate.token.clone());
            log_record.logs.lock().unwrap().push(delegate.data.clone());
            delegate.context.update("last_log", json!(delegate.data));
        })
        .invoke::<Add, _, _>(move |delegate| {
            let record = add_record.clone();
            async move {
                record.calls.fetch_add(1, Ordering::SeqCst);
                record.tokens.lock().unwrap().push(delegate.token.clone());
                let (a, b) = delegate.data;
                delegate.send.send::<Tick>(&(a + b))?;
                Ok::<i64, HandlerFault>(a + b)
            }
        })
        .invoke::<Fail, _, _>(|delegate| async move {
            Err::<(), HandlerFault>(HandlerFault::from(delegate.data))
        })
        .invoke::<Boom, _, _>(|_delegate| async move { explode() })
}

fn explode() -> Result<(), HandlerFault> {
    panic!("handler bug")
}

/// Poll `condition` until it holds or two seconds pass.
pub async fn wait_until(condition: impl Fn() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

//! Host-side dispatcher.
//!
//! [`ServiceMessenger`] owns the host's value store and installs a
//! [`ServiceHandlers`] set on a [`HostTransport`]:
//!
//! - one listener on the client-event channel routes fire-and-forget envelopes
//!   by key to message handlers
//! - one handler per invoke key on `<invoke-namespace>::<key>` answers with an
//!   [`InvokeReply`]; handler faults become `failure` replies, never transport
//!   errors
//!
//! Installation removes whatever was registered on those channels first, so
//! installing again (hot reload) replaces delivery instead of doubling it.

mod delegate;
mod handlers;

pub use delegate::{Broadcaster, ServiceDelegate};
pub use handlers::{HandlerFault, ServiceHandlers};

use crate::config::ChannelNames;
use crate::contract::{Contract, Mode};
use crate::envelope::{ClientEnvelope, InvokeReply};
use crate::error::contract::ContractError;
use crate::store::{ContextHost, Schedule, Scope, ValueStore};
use crate::transport::{HostHandler, HostListener, HostTransport, PeerRef};

use handlers::{CallScope, Handler, InvokeFn, MessageFn};

use common::ErrorLocation;

use std::collections::HashMap;
use std::panic::Location;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use futures_util::future::BoxFuture;
use log::{debug, info, warn};
use serde_json::{Value, json};

/// Host half of the messenger.
///
/// Create once per process; call [`install`](Self::install) whenever the
/// handler set is (re)built. Every installation shares the same store.
pub struct ServiceMessenger {
    store: ValueStore,
    channels: ChannelNames,
    generation: Arc<AtomicU64>,
}

impl ServiceMessenger {
    pub fn new<I, K>(initial_state: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self::from_store(ValueStore::new(initial_state))
    }

    pub fn with_scheduler<I, K>(initial_state: I, scheduler: Arc<dyn Schedule>) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self::from_store(ValueStore::with_scheduler(initial_state, scheduler))
    }

    fn from_store(store: ValueStore) -> Self {
        Self {
            store,
            channels: ChannelNames::default(),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Use non-default channel names.
    pub fn with_channels(mut self, channels: ChannelNames) -> Self {
        self.channels = channels;
        self
    }

    pub fn context(&self) -> ContextHost {
        self.store.host()
    }

    /// Register `handlers` on `transport` after checking them against `contract`.
    ///
    /// # Errors
    ///
    /// - [`ContractError::MissingHandler`] if a declared key has no handler
    /// - [`ContractError::DirectionMismatch`] if a handler's mode differs from the declaration
    /// - [`ContractError::UndeclaredHandler`] if a handler's key is not declared
    #[track_caller]
    pub fn install(
        &self,
        transport: Arc<dyn HostTransport>,
        contract: &Contract,
        handlers: ServiceHandlers,
    ) -> Result<ServiceTarget, ContractError> {
        verify(contract, &handlers, ErrorLocation::from(Location::caller()))?;

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let broadcast_channel: Arc<str> = Arc::from(self.channels.service_response.as_str());
        let scope = Arc::new(Scope::default());
        let context = self.store.scoped_host(Arc::clone(&scope));

        let mut messages: HashMap<String, MessageFn> = HashMap::new();
        let mut invokes: Vec<(String, InvokeFn)> = Vec::new();
        for (key, handler) in handlers.iter() {
            match handler {
                Handler::Message(f) => {
                    messages.insert(key.to_string(), Arc::clone(f));
                }
                Handler::Invoke(f) => invokes.push((key.to_string(), Arc::clone(f))),
            }
        }

        let client_event = self.channels.client_event.clone();
        transport.remove_all_listeners(&client_event);
        transport.on(
            &client_event,
            message_listener(messages, context.clone(), Arc::clone(&broadcast_channel)),
        );

        let mut invoke_channels = Vec::with_capacity(invokes.len());
        for (key, handler) in invokes {
            let channel = self.channels.invoke_channel(&key);
            debug!("Registering invoke handler on [{}]", channel);
            transport.remove_handler(&channel);
            transport.handle(
                &channel,
                invoke_handler(
                    key,
                    handler,
                    context.clone(),
                    Arc::clone(&broadcast_channel),
                ),
            );
            invoke_channels.push(channel);
        }

        info!(
            "Service messenger installed (generation {}): {} message keys, {} invoke keys",
            generation,
            contract.keys_with(Mode::Message).count(),
            invoke_channels.len()
        );

        Ok(ServiceTarget {
            context,
            scope,
            store: self.store.clone(),
            transport,
            client_event,
            invoke_channels,
            generation,
            current_generation: Arc::clone(&self.generation),
            disposed: AtomicBool::new(false),
        })
    }
}

/// Every declared key has a handler of the declared mode, and nothing else does.
fn verify(
    contract: &Contract,
    handlers: &ServiceHandlers,
    location: ErrorLocation,
) -> Result<(), ContractError> {
    for (key, declared) in contract.iter() {
        match handlers.get(key) {
            None => {
                return Err(ContractError::MissingHandler {
                    key: key.to_string(),
                    mode: declared,
                    location,
                });
            }
            Some(handler) if handler.mode() != declared => {
                return Err(ContractError::DirectionMismatch {
                    key: key.to_string(),
                    declared,
                    registered: handler.mode(),
                    location,
                });
            }
            Some(_) => {}
        }
    }

    if let Some((key, _)) = handlers
        .iter()
        .find(|(key, _)| contract.mode(key).is_none())
    {
        return Err(ContractError::UndeclaredHandler {
            key: key.to_string(),
            location,
        });
    }

    Ok(())
}

fn decode_envelope(raw: Value) -> Result<ClientEnvelope, serde_json::Error> {
    serde_json::from_value(raw)
}

fn message_listener(
    messages: HashMap<String, MessageFn>,
    context: ContextHost,
    broadcast_channel: Arc<str>,
) -> HostListener {
    Arc::new(move |peer: PeerRef, raw: Value| {
        let envelope = match decode_envelope(raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("Dropping undecodable client envelope: {}", e);
                return;
            }
        };

        let Some(handler) = messages.get(&envelope.key) else {
            warn!("No message handler for [{}], dropping", envelope.key);
            return;
        };

        handler(
            envelope.data,
            CallScope {
                context: context.clone(),
                token: envelope.token,
                send: Broadcaster::new(peer, Arc::clone(&broadcast_channel)),
            },
        );
    })
}

fn invoke_handler(
    key: String,
    handler: InvokeFn,
    context: ContextHost,
    broadcast_channel: Arc<str>,
) -> HostHandler {
    Arc::new(move |peer: PeerRef, raw: Value| {
        let reply: BoxFuture<'static, InvokeReply> = match decode_envelope(raw) {
            Ok(envelope) => handler(
                envelope.data,
                CallScope {
                    context: context.clone(),
                    token: envelope.token,
                    send: Broadcaster::new(peer, Arc::clone(&broadcast_channel)),
                },
            ),
            Err(e) => {
                let reply = InvokeReply::Failure {
                    message: format!("Invalid envelope for [{}]: {}", key, e),
                    stack: None,
                };
                Box::pin(async move { reply })
            }
        };

        let encoded: BoxFuture<'static, Value> = Box::pin(async move {
            let reply = reply.await;
            if reply.is_failure() {
                debug!("Invoke handler answered with failure: {:?}", reply);
            }
            serde_json::to_value(&reply).unwrap_or_else(|e| {
                json!({ "outcome": "failure", "message": e.to_string() })
            })
        });
        encoded
    })
}

/// A live installation of host handlers.
pub struct ServiceTarget {
    context: ContextHost,
    scope: Arc<Scope>,
    store: ValueStore,
    transport: Arc<dyn HostTransport>,
    client_event: String,
    invoke_channels: Vec<String>,
    generation: u64,
    current_generation: Arc<AtomicU64>,
    disposed: AtomicBool,
}

impl ServiceTarget {
    pub fn context(&self) -> &ContextHost {
        &self.context
    }

    /// Channels this installation registered invoke handlers on.
    pub fn invoke_channels(&self) -> &[String] {
        &self.invoke_channels
    }

    /// Dispose the store and unregister this installation.
    ///
    /// A target already replaced by a newer installation only releases the
    /// subscriptions made through its own context; the store and the newer
    /// registrations stay live.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        if self.current_generation.load(Ordering::SeqCst) != self.generation {
            let released = self.scope.release(&self.store);
            debug!(
                "Service target generation {} was superseded, released {} subscriptions",
                self.generation, released
            );
            return;
        }

        self.store.dispose();
        self.transport.remove_all_listeners(&self.client_event);
        for channel in &self.invoke_channels {
            self.transport.remove_handler(channel);
        }
        info!("Service target generation {} disposed", self.generation);
    }
}

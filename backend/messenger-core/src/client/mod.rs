//! Renderer-side dispatcher.
//!
//! [`ClientMessenger`] owns the renderer's value store. Installing it on a
//! [`ClientTransport`] registers one broadcast listener that routes host
//! envelopes by key to [`ClientCallbacks`], and builds the [`Dispatcher`]
//! through which the renderer calls the host.

mod dispatcher;

pub use dispatcher::{Dispatcher, Endpoint};

use crate::config::ChannelNames;
use crate::contract::{Contract, MessageContract};
use crate::envelope::BroadcastEnvelope;
use crate::store::{ContextHost, Schedule, Scope, ValueStore};
use crate::transport::{ClientListener, ClientTransport};

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use log::{debug, info, warn};
use serde_json::Value;

/// Produces the token attached to every outbound envelope.
pub type TokenSource = Arc<dyn Fn() -> String + Send + Sync>;

/// Everything a renderer callback receives for one broadcast.
pub struct ClientDelegate<D> {
    pub data: D,
    pub context: ContextHost,
}

type CallbackFn = Arc<dyn Fn(Value, ContextHost) + Send + Sync>;

/// Renderer callbacks for host broadcasts, at most one per key.
#[derive(Clone, Default)]
pub struct ClientCallbacks {
    entries: HashMap<String, CallbackFn>,
}

impl ClientCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Typed callback. Broadcasts that fail to decode are dropped.
    pub fn on<M, F>(self, callback: F) -> Self
    where
        M: MessageContract + 'static,
        F: Fn(ClientDelegate<M::Payload>) + Send + Sync + 'static,
    {
        self.on_raw(M::KEY, move |delegate: ClientDelegate<Value>| {
            match serde_json::from_value::<M::Payload>(delegate.data) {
                Ok(data) => callback(ClientDelegate {
                    data,
                    context: delegate.context,
                }),
                Err(e) => warn!("Dropping undecodable broadcast for [{}]: {}", M::KEY, e),
            }
        })
    }

    pub fn on_raw<F>(mut self, key: impl Into<String>, callback: F) -> Self
    where
        F: Fn(ClientDelegate<Value>) + Send + Sync + 'static,
    {
        let key = key.into();
        let wrapped: CallbackFn =
            Arc::new(move |data: Value, context: ContextHost| callback(ClientDelegate { data, context }));
        if self.entries.insert(key.clone(), wrapped).is_some() {
            warn!("Callback for [{}] registered twice, keeping the last", key);
        }
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Clone, Default)]
pub struct ClientOptions {
    /// Where store work and callbacks run. Defaults to in place.
    pub scheduler: Option<Arc<dyn Schedule>>,
    /// Called once per outbound envelope.
    pub token: Option<TokenSource>,
    pub channels: ChannelNames,
}

/// Renderer half of the messenger.
pub struct ClientMessenger {
    store: ValueStore,
    options: ClientOptions,
    generation: Arc<AtomicU64>,
}

impl ClientMessenger {
    pub fn new<I, K>(initial_state: I, options: ClientOptions) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let store = match options.scheduler {
            Some(ref scheduler) => ValueStore::with_scheduler(initial_state, Arc::clone(scheduler)),
            None => ValueStore::new(initial_state),
        };
        Self {
            store,
            options,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn context(&self) -> ContextHost {
        self.store.host()
    }

    /// Listen for host broadcasts and build the call surface for `contract`.
    pub fn install(
        &self,
        transport: Arc<dyn ClientTransport>,
        contract: &Contract,
        callbacks: ClientCallbacks,
    ) -> ClientTarget {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let broadcast_channel = self.options.channels.service_response.clone();
        let scope = Arc::new(Scope::default());
        let context = self.store.scoped_host(Arc::clone(&scope));

        transport.remove_all_listeners(&broadcast_channel);
        transport.on(
            &broadcast_channel,
            broadcast_listener(callbacks, context.clone(), self.store.scheduler()),
        );

        let dispatcher = Dispatcher::new(
            contract,
            &self.options.channels,
            Arc::clone(&transport),
            self.options.token.clone(),
        );

        info!(
            "Client messenger installed (generation {}): {} dispatcher keys",
            generation,
            contract.len()
        );

        ClientTarget {
            context,
            scope,
            dispatcher,
            store: self.store.clone(),
            transport,
            broadcast_channel,
            generation,
            current_generation: Arc::clone(&self.generation),
            disposed: AtomicBool::new(false),
        }
    }
}

fn broadcast_listener(
    callbacks: ClientCallbacks,
    context: ContextHost,
    scheduler: Arc<dyn Schedule>,
) -> ClientListener {
    Arc::new(move |raw: Value| {
        let envelope: BroadcastEnvelope = match serde_json::from_value(raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("Dropping undecodable broadcast envelope: {}", e);
                return;
            }
        };

        let Some(callback) = callbacks.entries.get(&envelope.key) else {
            debug!("No callback for broadcast [{}], dropping", envelope.key);
            return;
        };

        let mut data = Some(envelope.data);
        scheduler.run(&mut || {
            if let Some(data) = data.take() {
                callback(data, context.clone());
            }
        });
    })
}

/// A live installation on the renderer.
pub struct ClientTarget {
    context: ContextHost,
    scope: Arc<Scope>,
    dispatcher: Dispatcher,
    store: ValueStore,
    transport: Arc<dyn ClientTransport>,
    broadcast_channel: String,
    generation: u64,
    current_generation: Arc<AtomicU64>,
    disposed: AtomicBool,
}

impl ClientTarget {
    pub fn context(&self) -> &ContextHost {
        &self.context
    }

    /// Per-key call surface toward the host.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Dispose the store and stop listening for broadcasts.
    ///
    /// A target already replaced by a newer installation only releases the
    /// subscriptions made through its own context.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        if self.current_generation.load(Ordering::SeqCst) != self.generation {
            let released = self.scope.release(&self.store);
            debug!(
                "Client target generation {} was superseded, released {} subscriptions",
                self.generation, released
            );
            return;
        }

        self.store.dispose();
        self.transport.remove_all_listeners(&self.broadcast_channel);
        info!("Client target generation {} disposed", self.generation);
    }
}

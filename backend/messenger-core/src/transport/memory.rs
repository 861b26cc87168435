//! In-process bridge.
//!
//! Host and renderers live in the same process. Sends and broadcasts are
//! delivered synchronously on the caller's thread in call order; invoke awaits
//! the registered handler directly. Used by tests and by single-process
//! embeddings.

use crate::error::transport::TransportError;
use crate::transport::{
    ChannelRegistry, ClientListener, ClientTransport, HostHandler, HostListener, HostTransport,
    Peer, PeerRef,
};

use common::ErrorLocation;

use std::panic::Location;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use futures_util::future::BoxFuture;
use log::{debug, warn};
use serde_json::Value;

/// Host registry plus a factory for connected renderers.
#[derive(Clone)]
pub struct MemoryBridge {
    host: Arc<MemoryHost>,
}

impl MemoryBridge {
    pub fn new() -> Self {
        Self {
            host: Arc::new(MemoryHost {
                listeners: ChannelRegistry::new(),
                handlers: ChannelRegistry::new(),
                next_peer: AtomicU64::new(1),
            }),
        }
    }

    pub fn host(&self) -> Arc<MemoryHost> {
        Arc::clone(&self.host)
    }

    /// Open a new renderer connection.
    pub fn connect(&self) -> Arc<MemoryClient> {
        let id = self.host.next_peer.fetch_add(1, Ordering::Relaxed);
        let endpoint = Arc::new(Endpoint {
            listeners: ChannelRegistry::new(),
            closed: AtomicBool::new(false),
        });
        debug!("Memory bridge: renderer {} connected", id);
        Arc::new(MemoryClient {
            peer: Arc::new(MemoryPeer {
                id,
                endpoint: Arc::clone(&endpoint),
            }),
            endpoint,
            host: Arc::clone(&self.host),
        })
    }
}

impl Default for MemoryBridge {
    fn default() -> Self {
        Self::new()
    }
}

pub struct MemoryHost {
    listeners: ChannelRegistry<HostListener>,
    handlers: ChannelRegistry<HostHandler>,
    next_peer: AtomicU64,
}

impl MemoryHost {
    pub fn listener_count(&self, channel: &str) -> usize {
        self.listeners.count(channel)
    }

    pub fn has_handler(&self, channel: &str) -> bool {
        self.handlers.count(channel) > 0
    }
}

impl HostTransport for MemoryHost {
    fn on(&self, channel: &str, listener: HostListener) {
        self.listeners.add(channel, listener);
    }

    fn remove_all_listeners(&self, channel: &str) {
        self.listeners.remove_all(channel);
    }

    fn handle(&self, channel: &str, handler: HostHandler) {
        if self.handlers.replace(channel, handler) {
            warn!("Replaced existing invoke handler on [{}]", channel);
        }
    }

    fn remove_handler(&self, channel: &str) {
        self.handlers.remove_all(channel);
    }
}

/// Renderer-side state shared with the host's view of the connection.
struct Endpoint {
    listeners: ChannelRegistry<ClientListener>,
    closed: AtomicBool,
}

struct MemoryPeer {
    id: u64,
    endpoint: Arc<Endpoint>,
}

impl Peer for MemoryPeer {
    fn id(&self) -> u64 {
        self.id
    }

    #[track_caller]
    fn send(&self, channel: &str, payload: Value) -> Result<(), TransportError> {
        if self.endpoint.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed {
                message: format!("renderer {} is closed", self.id),
                location: ErrorLocation::from(Location::caller()),
            });
        }
        for listener in self.endpoint.listeners.get(channel) {
            listener(payload.clone());
        }
        Ok(())
    }
}

/// One renderer connected to a [`MemoryBridge`].
pub struct MemoryClient {
    peer: Arc<MemoryPeer>,
    endpoint: Arc<Endpoint>,
    host: Arc<MemoryHost>,
}

impl MemoryClient {
    pub fn id(&self) -> u64 {
        self.peer.id
    }

    /// Disconnect. Later sends, invokes and broadcasts to this renderer fail.
    pub fn close(&self) {
        self.endpoint.closed.store(true, Ordering::Release);
    }

    pub fn listener_count(&self, channel: &str) -> usize {
        self.endpoint.listeners.count(channel)
    }

    #[track_caller]
    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.endpoint.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed {
                message: format!("renderer {} is closed", self.peer.id),
                location: ErrorLocation::from(Location::caller()),
            });
        }
        Ok(())
    }
}

impl ClientTransport for MemoryClient {
    fn on(&self, channel: &str, listener: ClientListener) {
        self.endpoint.listeners.add(channel, listener);
    }

    fn remove_all_listeners(&self, channel: &str) {
        self.endpoint.listeners.remove_all(channel);
    }

    #[track_caller]
    fn send(&self, channel: &str, payload: Value) -> Result<(), TransportError> {
        self.ensure_open()?;

        let listeners = self.host.listeners.get(channel);
        if listeners.is_empty() {
            debug!("Memory bridge: no host listener on [{}], dropping", channel);
        }
        let peer: PeerRef = self.peer.clone();
        for listener in listeners {
            listener(Arc::clone(&peer), payload.clone());
        }
        Ok(())
    }

    #[track_caller]
    fn invoke(
        &self,
        channel: &str,
        payload: Value,
    ) -> BoxFuture<'static, Result<Value, TransportError>> {
        let location = ErrorLocation::from(Location::caller());
        let ready = self.ensure_open().and_then(|_| {
            self.host
                .handlers
                .first(channel)
                .ok_or_else(|| TransportError::NoHandler {
                    channel: channel.to_string(),
                    location,
                })
        });
        let peer: PeerRef = self.peer.clone();

        Box::pin(async move {
            let handler = ready?;
            Ok(handler(peer, payload).await)
        })
    }
}

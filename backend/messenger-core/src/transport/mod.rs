//! Named-channel transports between host and renderer.
//!
//! The dispatchers only see the [`HostTransport`] and [`ClientTransport`]
//! traits. Two bridges implement them:
//!
//! - [`memory`]: both sides in one process, synchronous delivery
//! - [`ws`]: localhost WebSocket with a token handshake and JSON frames
//!
//! # Channel semantics
//!
//! - `on` *adds* a listener; several listeners on one channel all fire. Callers
//!   that must not double-deliver call `remove_all_listeners` first.
//! - `handle` keeps a single handler per channel; a second call replaces it.
//! - Delivery is ordered per channel, with no ordering across channels.

pub mod memory;
mod registry;
pub mod ws;

pub(crate) use registry::ChannelRegistry;

use crate::error::transport::TransportError;

use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde_json::Value;

/// The connection a host-side message arrived on.
pub trait Peer: Send + Sync {
    /// Connection id, unique per transport.
    fn id(&self) -> u64;

    /// Push a payload to this connection only.
    fn send(&self, channel: &str, payload: Value) -> Result<(), TransportError>;
}

pub type PeerRef = Arc<dyn Peer>;

/// Fire-and-forget listener on the host.
pub type HostListener = Arc<dyn Fn(PeerRef, Value) + Send + Sync>;

/// Invoke handler on the host. Its output is the reply payload.
pub type HostHandler = Arc<dyn Fn(PeerRef, Value) -> BoxFuture<'static, Value> + Send + Sync>;

/// Listener on the renderer.
pub type ClientListener = Arc<dyn Fn(Value) + Send + Sync>;

/// Host side of the bridge.
pub trait HostTransport: Send + Sync {
    fn on(&self, channel: &str, listener: HostListener);
    fn remove_all_listeners(&self, channel: &str);
    fn handle(&self, channel: &str, handler: HostHandler);
    fn remove_handler(&self, channel: &str);
}

/// Renderer side of the bridge.
pub trait ClientTransport: Send + Sync {
    fn on(&self, channel: &str, listener: ClientListener);
    fn remove_all_listeners(&self, channel: &str);
    fn send(&self, channel: &str, payload: Value) -> Result<(), TransportError>;
    fn invoke(
        &self,
        channel: &str,
        payload: Value,
    ) -> BoxFuture<'static, Result<Value, TransportError>>;
}

use crate::contract::MessageContract;
use crate::envelope::BroadcastEnvelope;
use crate::error::dispatch::DispatchError;
use crate::error::transport::TransportError;
use crate::store::ContextHost;
use crate::transport::PeerRef;

use std::sync::Arc;

use serde_json::Value;

/// Everything a host handler receives for one inbound call.
pub struct ServiceDelegate<D> {
    pub data: D,
    pub context: ContextHost,
    /// Token the renderer attached to the call, if any.
    pub token: Option<String>,
    /// Broadcast back to the connection the call came from.
    pub send: Broadcaster,
}

/// Pushes broadcast envelopes to one renderer connection.
#[derive(Clone)]
pub struct Broadcaster {
    peer: PeerRef,
    channel: Arc<str>,
}

impl Broadcaster {
    pub(crate) fn new(peer: PeerRef, channel: Arc<str>) -> Self {
        Self { peer, channel }
    }

    /// Id of the connection this broadcaster is bound to.
    pub fn peer_id(&self) -> u64 {
        self.peer.id()
    }

    pub fn send_raw(&self, key: &str, data: Value) -> Result<(), TransportError> {
        let envelope = BroadcastEnvelope {
            key: key.to_string(),
            data,
        };
        let payload = serde_json::to_value(&envelope)?;
        self.peer.send(&self.channel, payload)
    }

    #[track_caller]
    pub fn send<M: MessageContract>(&self, data: &M::Payload) -> Result<(), DispatchError> {
        let data = serde_json::to_value(data).map_err(DispatchError::encode)?;
        Ok(self.send_raw(M::KEY, data)?)
    }
}

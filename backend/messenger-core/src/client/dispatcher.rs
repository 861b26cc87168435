//! The renderer's call surface.
//!
//! Built once from a [`Contract`]: every declared key gets an [`Endpoint`]
//! holding its `send` / `invoke` capability.

use crate::client::TokenSource;
use crate::config::ChannelNames;
use crate::contract::{Contract, InvokeContract, MessageContract, Mode};
use crate::envelope::{ClientEnvelope, InvokeReply};
use crate::error::dispatch::DispatchError;
use crate::transport::ClientTransport;

use common::ErrorLocation;

use std::collections::HashMap;
use std::panic::Location;
use std::sync::Arc;

use serde_json::Value;

/// One declared key and the route to its host handler.
#[derive(Clone)]
pub struct Endpoint {
    key: String,
    mode: Mode,
    invoke_channel: String,
    client_event: Arc<str>,
    transport: Arc<dyn ClientTransport>,
    token: Option<TokenSource>,
}

impl Endpoint {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    fn envelope(&self, data: Value) -> Result<Value, DispatchError> {
        let envelope = ClientEnvelope {
            key: self.key.clone(),
            data,
            token: self.token.as_ref().map(|token| token()),
        };
        serde_json::to_value(&envelope).map_err(DispatchError::encode)
    }

    #[track_caller]
    fn expect_mode(&self, attempted: Mode) -> Result<(), DispatchError> {
        if self.mode != attempted {
            return Err(DispatchError::ModeMismatch {
                key: self.key.clone(),
                declared: self.mode,
                attempted,
                location: ErrorLocation::from(Location::caller()),
            });
        }
        Ok(())
    }

    /// Fire-and-forget envelope to the host.
    #[track_caller]
    pub fn send(&self, data: Value) -> Result<(), DispatchError> {
        self.expect_mode(Mode::Message)?;
        let payload = self.envelope(data)?;
        Ok(self.transport.send(&self.client_event, payload)?)
    }

    /// Call the host handler and wait for its reply.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::Remote`] if the handler failed; carries its message
    /// - [`DispatchError::Transport`] if the call never reached a handler
    #[track_caller]
    pub fn invoke(
        &self,
        data: Value,
    ) -> impl Future<Output = Result<Value, DispatchError>> + Send + use<> {
        let location = ErrorLocation::from(Location::caller());
        let prepared = self
            .expect_mode(Mode::Invoke)
            .and_then(|_| self.envelope(data))
            .map(|payload| self.transport.invoke(&self.invoke_channel, payload));

        async move {
            let raw = prepared?.await?;
            match InvokeReply::decode(raw) {
                InvokeReply::Success { data } => Ok(data),
                InvokeReply::Failure { message, stack } => Err(DispatchError::Remote {
                    message,
                    stack,
                    location,
                }),
            }
        }
    }
}

/// Eager lookup table of every declared key.
#[derive(Clone)]
pub struct Dispatcher {
    endpoints: HashMap<String, Endpoint>,
}

impl Dispatcher {
    pub(crate) fn new(
        contract: &Contract,
        channels: &ChannelNames,
        transport: Arc<dyn ClientTransport>,
        token: Option<TokenSource>,
    ) -> Self {
        let client_event: Arc<str> = Arc::from(channels.client_event.as_str());
        let endpoints = contract
            .iter()
            .map(|(key, mode)| {
                (
                    key.to_string(),
                    Endpoint {
                        key: key.to_string(),
                        mode,
                        invoke_channel: channels.invoke_channel(key),
                        client_event: Arc::clone(&client_event),
                        transport: Arc::clone(&transport),
                        token: token.clone(),
                    },
                )
            })
            .collect();
        Self { endpoints }
    }

    pub fn endpoint(&self, key: &str) -> Option<&Endpoint> {
        self.endpoints.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.endpoints.keys().map(String::as_str)
    }

    #[track_caller]
    fn lookup(&self, key: &str) -> Result<&Endpoint, DispatchError> {
        self.endpoints
            .get(key)
            .ok_or_else(|| DispatchError::UnknownKey {
                key: key.to_string(),
                location: ErrorLocation::from(Location::caller()),
            })
    }

    #[track_caller]
    pub fn send_raw(&self, key: &str, data: Value) -> Result<(), DispatchError> {
        self.lookup(key)?.send(data)
    }

    #[track_caller]
    pub fn invoke_raw(
        &self,
        key: &str,
        data: Value,
    ) -> impl Future<Output = Result<Value, DispatchError>> + Send + use<> {
        let call = self.lookup(key).map(|endpoint| endpoint.invoke(data));
        async move { call?.await }
    }

    #[track_caller]
    pub fn send<M: MessageContract>(&self, data: &M::Payload) -> Result<(), DispatchError> {
        let data = serde_json::to_value(data).map_err(DispatchError::encode)?;
        self.send_raw(M::KEY, data)
    }

    #[track_caller]
    pub fn invoke<I: InvokeContract>(
        &self,
        request: &I::Request,
    ) -> impl Future<Output = Result<I::Response, DispatchError>> + Send + use<I> {
        let call = serde_json::to_value(request)
            .map_err(DispatchError::encode)
            .map(|data| self.invoke_raw(I::KEY, data));

        async move {
            let raw = call?.await?;
            serde_json::from_value::<I::Response>(raw).map_err(DispatchError::decode)
        }
    }
}

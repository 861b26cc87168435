use crate::contract::{InvokeContract, MessageContract, Mode};
use crate::envelope::InvokeReply;
use crate::host::delegate::{Broadcaster, ServiceDelegate};
use crate::store::ContextHost;

use std::any::Any;
use std::collections::HashMap;
use std::error::Error as StdError;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use log::{error, warn};
use serde_json::Value;

/// Error an invoke handler may fail with. Crosses the boundary as a failure reply.
pub type HandlerFault = Box<dyn StdError + Send + Sync>;

/// Per-call values handed to a handler alongside its decoded payload.
pub(crate) struct CallScope {
    pub(crate) context: ContextHost,
    pub(crate) token: Option<String>,
    pub(crate) send: Broadcaster,
}

impl CallScope {
    fn into_delegate<D>(self, data: D) -> ServiceDelegate<D> {
        ServiceDelegate {
            data,
            context: self.context,
            token: self.token,
            send: self.send,
        }
    }
}

pub(crate) type MessageFn = Arc<dyn Fn(Value, CallScope) + Send + Sync>;
pub(crate) type InvokeFn = Arc<dyn Fn(Value, CallScope) -> BoxFuture<'static, InvokeReply> + Send + Sync>;

#[derive(Clone)]
pub(crate) enum Handler {
    Message(MessageFn),
    Invoke(InvokeFn),
}

impl Handler {
    pub(crate) fn mode(&self) -> Mode {
        match self {
            Handler::Message(_) => Mode::Message,
            Handler::Invoke(_) => Mode::Invoke,
        }
    }
}

/// The host's implementation of a contract: one handler per key.
///
/// # Examples
///
/// ```ignore
/// let handlers = ServiceHandlers::new()
///     .message::<Log, _>(|delegate| log::info!("{}", delegate.data))
///     .invoke::<Add, _, _>(|delegate| async move { Ok(delegate.data.0 + delegate.data.1) });
/// ```
#[derive(Clone, Default)]
pub struct ServiceHandlers {
    entries: HashMap<String, Handler>,
}

impl ServiceHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Typed fire-and-forget handler. Payloads that fail to decode are dropped.
    pub fn message<M, F>(self, handler: F) -> Self
    where
        M: MessageContract + 'static,
        F: Fn(ServiceDelegate<M::Payload>) + Send + Sync + 'static,
    {
        self.message_raw(M::KEY, move |delegate: ServiceDelegate<Value>| {
            let ServiceDelegate {
                data,
                context,
                token,
                send,
            } = delegate;
            match serde_json::from_value::<M::Payload>(data) {
                Ok(data) => handler(ServiceDelegate {
                    data,
                    context,
                    token,
                    send,
                }),
                Err(e) => warn!("Dropping undecodable payload for [{}]: {}", M::KEY, e),
            }
        })
    }

    /// Typed request/response handler.
    pub fn invoke<I, F, Fut>(self, handler: F) -> Self
    where
        I: InvokeContract + 'static,
        F: Fn(ServiceDelegate<I::Request>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<I::Response, HandlerFault>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        self.invoke_raw(I::KEY, move |delegate: ServiceDelegate<Value>| {
            let handler = Arc::clone(&handler);
            async move {
                let ServiceDelegate {
                    data,
                    context,
                    token,
                    send,
                } = delegate;
                let request = serde_json::from_value::<I::Request>(data).map_err(|e| {
                    HandlerFault::from(format!("Invalid request for [{}]: {}", I::KEY, e))
                })?;
                let response = handler(ServiceDelegate {
                    data: request,
                    context,
                    token,
                    send,
                })
                .await?;
                Ok::<Value, HandlerFault>(serde_json::to_value(response)?)
            }
        })
    }

    /// Untyped fire-and-forget handler on `key`. Replaces any handler on that key.
    pub fn message_raw<F>(mut self, key: impl Into<String>, handler: F) -> Self
    where
        F: Fn(ServiceDelegate<Value>) + Send + Sync + 'static,
    {
        let wrapped: MessageFn =
            Arc::new(move |data: Value, scope: CallScope| handler(scope.into_delegate(data)));
        self.insert(key.into(), Handler::Message(wrapped));
        self
    }

    /// Untyped request/response handler on `key`. Replaces any handler on that key.
    pub fn invoke_raw<F, Fut>(mut self, key: impl Into<String>, handler: F) -> Self
    where
        F: Fn(ServiceDelegate<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, HandlerFault>> + Send + 'static,
    {
        let key = key.into();
        let handler = Arc::new(handler);
        let panic_key = key.clone();
        let wrapped: InvokeFn = Arc::new(move |data: Value, scope: CallScope| {
            let handler = Arc::clone(&handler);
            let key = panic_key.clone();
            let delegate = scope.into_delegate(data);
            let reply: BoxFuture<'static, InvokeReply> = Box::pin(async move {
                let outcome = AssertUnwindSafe(async move { handler(delegate).await })
                    .catch_unwind()
                    .await;
                match outcome {
                    Ok(Ok(data)) => InvokeReply::Success { data },
                    Ok(Err(fault)) => InvokeReply::from_error(&*fault),
                    Err(panic) => {
                        let message = panic_message(panic.as_ref());
                        error!("Invoke handler for [{}] panicked: {}", key, message);
                        InvokeReply::Failure {
                            message: format!("Handler panicked: {}", message),
                            stack: None,
                        }
                    }
                }
            });
            reply
        });
        self.insert(key, Handler::Invoke(wrapped));
        self
    }

    fn insert(&mut self, key: String, handler: Handler) {
        if self.entries.insert(key.clone(), handler).is_some() {
            warn!("Handler for [{}] registered twice, keeping the last", key);
        }
    }

    pub(crate) fn get(&self, key: &str) -> Option<&Handler> {
        self.entries.get(key)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&str, &Handler)> {
        self.entries.iter().map(|(key, handler)| (key.as_str(), handler))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        return message.to_string();
    }
    if let Some(message) = panic.downcast_ref::<String>() {
        return message.clone();
    }
    String::from("unknown panic payload")
}

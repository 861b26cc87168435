use crate::error::transport::TransportError;
use crate::transport::ws::frame::Frame;
use crate::transport::{ChannelRegistry, ClientListener, ClientTransport};

use common::{ErrorLocation, RedactedToken};

use std::collections::HashMap;
use std::panic::Location;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::future::BoxFuture;
use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::spawn as TokioSpawn;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;

type Pending = Arc<Mutex<PendingMap>>;

/// Renderer side of the WebSocket bridge.
pub struct WsClient {
    outbound: mpsc::UnboundedSender<Message>,
    listeners: Arc<ChannelRegistry<ClientListener>>,
    pending: Pending,
    next_request: AtomicU64,
    reader_task: JoinHandle<()>,
}

impl WsClient {
    /// Connect to a [`WsHost`](crate::transport::ws::WsHost) and authenticate.
    ///
    /// # Errors
    ///
    /// - [`TransportError::Handshake`] if the WebSocket upgrade fails
    /// - [`TransportError::Auth`] if the host rejects the token
    /// - [`TransportError::Read`] if the host closes before answering
    pub async fn connect(url: &Url, token: &RedactedToken) -> Result<Arc<Self>, TransportError> {
        let (ws_stream, _) =
            connect_async(url.as_str())
                .await
                .map_err(|e| TransportError::Handshake {
                    message: format!("Failed to connect to {}: {}", url, e),
                    location: ErrorLocation::from(Location::caller()),
                })?;

        let (mut write, mut read) = ws_stream.split();

        write
            .send(
                Frame::Auth {
                    token: token.expose().to_string(),
                }
                .to_message()?,
            )
            .await?;

        let answer = loop {
            match read.next().await {
                Some(Ok(message)) => match Frame::from_message(&message) {
                    Some(frame) => break frame?,
                    None => continue,
                },
                Some(Err(e)) => {
                    return Err(TransportError::Read {
                        message: format!("Error reading auth result: {}", e),
                        location: ErrorLocation::from(Location::caller()),
                    });
                }
                None => {
                    return Err(TransportError::Read {
                        message: String::from("Host closed before answering auth"),
                        location: ErrorLocation::from(Location::caller()),
                    });
                }
            }
        };

        match answer {
            Frame::AuthResult { success: true, .. } => info!("Connected to messenger host {}", url),
            Frame::AuthResult { error, .. } => {
                return Err(TransportError::Auth {
                    message: error.unwrap_or_else(|| String::from("Authentication rejected")),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
            other => {
                return Err(TransportError::Auth {
                    message: format!("Expected auth result, got {:?}", other),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
        }

        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
        TokioSpawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                if let Err(e) = write.send(message).await {
                    debug!("Outbound socket closed: {}", e);
                    break;
                }
            }
            let _ = write.close().await;
        });

        let listeners = Arc::new(ChannelRegistry::new());
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let reader_task = TokioSpawn(read_frames(
            read,
            Arc::clone(&listeners),
            Arc::clone(&pending),
        ));

        Ok(Arc::new(Self {
            outbound,
            listeners,
            pending,
            next_request: AtomicU64::new(1),
            reader_task,
        }))
    }

    pub fn is_closed(&self) -> bool {
        self.outbound.is_closed() || self.reader_task.is_finished()
    }

    #[track_caller]
    fn push(&self, frame: &Frame) -> Result<(), TransportError> {
        let message = frame.to_message()?;
        self.outbound
            .send(message)
            .map_err(|_| TransportError::Closed {
                message: String::from("connection to host is closed"),
                location: ErrorLocation::from(Location::caller()),
            })
    }
}

impl Drop for WsClient {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}

impl ClientTransport for WsClient {
    fn on(&self, channel: &str, listener: ClientListener) {
        self.listeners.add(channel, listener);
    }

    fn remove_all_listeners(&self, channel: &str) {
        self.listeners.remove_all(channel);
    }

    fn send(&self, channel: &str, payload: Value) -> Result<(), TransportError> {
        self.push(&Frame::Send {
            channel: channel.to_string(),
            payload,
        })
    }

    fn invoke(
        &self,
        channel: &str,
        payload: Value,
    ) -> BoxFuture<'static, Result<Value, TransportError>> {
        let request_id = self.next_request.fetch_add(1, Ordering::Relaxed);
        let (reply_tx, reply_rx) = oneshot::channel();
        lock_pending(&self.pending).insert(request_id, reply_tx);

        let sent = self.push(&Frame::Invoke {
            request_id,
            channel: channel.to_string(),
            payload,
        });
        if sent.is_err() {
            lock_pending(&self.pending).remove(&request_id);
        }

        Box::pin(async move {
            sent?;
            reply_rx.await.map_err(|_| TransportError::Closed {
                message: format!("connection closed before reply {}", request_id),
                location: ErrorLocation::from(Location::caller()),
            })?
        })
    }
}

/// Route host frames until the socket closes, then fail every pending invoke.
async fn read_frames(
    mut read: SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>,
    listeners: Arc<ChannelRegistry<ClientListener>>,
    pending: Pending,
) {
    while let Some(Ok(message)) = read.next().await {
        let frame = match Frame::from_message(&message) {
            Some(Ok(frame)) => frame,
            Some(Err(e)) => {
                warn!("Dropping undecodable frame from host: {}", e);
                continue;
            }
            None if message.is_close() => break,
            None => continue,
        };

        match frame {
            Frame::Event { channel, payload } => {
                for listener in listeners.get(&channel) {
                    listener(payload.clone());
                }
            }
            Frame::Reply {
                request_id,
                payload,
            } => resolve(&pending, request_id, Ok(payload)),
            Frame::Fault {
                request_id,
                channel,
                message,
            } => {
                debug!("Invoke {} faulted: {}", request_id, message);
                resolve(
                    &pending,
                    request_id,
                    Err(TransportError::NoHandler {
                        channel,
                        location: ErrorLocation::from(Location::caller()),
                    }),
                );
            }
            other => warn!("Unexpected frame from host: {:?}", other),
        }
    }

    let orphaned: Vec<_> = lock_pending(&pending).drain().collect();
    if !orphaned.is_empty() {
        warn!("Host connection closed with {} pending invokes", orphaned.len());
    }
    for (request_id, reply_tx) in orphaned {
        let _ = reply_tx.send(Err(TransportError::Closed {
            message: format!("connection closed before reply {}", request_id),
            location: ErrorLocation::from(Location::caller()),
        }));
    }
}

fn resolve(pending: &Pending, request_id: u64, result: Result<Value, TransportError>) {
    match lock_pending(pending).remove(&request_id) {
        Some(reply_tx) => {
            let _ = reply_tx.send(result);
        }
        None => warn!("Reply for unknown request {}", request_id),
    }
}

type PendingMap = HashMap<u64, oneshot::Sender<Result<Value, TransportError>>>;

fn lock_pending(pending: &Pending) -> MutexGuard<'_, PendingMap> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

use crate::error::transport::TransportError;
use crate::transport::ws::WS_HOSTNAME;
use crate::transport::ws::connection_state::ConnectionState;
use crate::transport::ws::frame::Frame;
use crate::transport::{ChannelRegistry, HostHandler, HostListener, HostTransport, Peer, PeerRef};

use common::{ErrorLocation, RedactedToken};

use std::net::SocketAddr;
use std::panic::Location;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::spawn as TokioSpawn;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, accept_async};

struct HostRegistry {
    listeners: ChannelRegistry<HostListener>,
    handlers: ChannelRegistry<HostHandler>,
    next_peer: AtomicU64,
}

/// Host side of the WebSocket bridge.
///
/// Dropping the host stops accepting connections; established connections
/// run until the renderer disconnects.
pub struct WsHost {
    registry: Arc<HostRegistry>,
    local_addr: SocketAddr,
    accept_task: JoinHandle<()>,
}

impl WsHost {
    /// Bind `127.0.0.1:<port>` and start accepting renderers.
    ///
    /// Port `0` picks a free port; read it back with [`WsHost::local_addr`].
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Io`] if the port cannot be bound.
    pub async fn bind(port: u16, token: RedactedToken) -> Result<Arc<Self>, TransportError> {
        let listener = TcpListener::bind((WS_HOSTNAME, port)).await?;
        let local_addr = listener.local_addr()?;
        info!("Messenger host listening on {}", local_addr);

        let registry = Arc::new(HostRegistry {
            listeners: ChannelRegistry::new(),
            handlers: ChannelRegistry::new(),
            next_peer: AtomicU64::new(1),
        });

        let accept_registry = Arc::clone(&registry);
        let accept_task = TokioSpawn(async move {
            while let Ok((stream, addr)) = listener.accept().await {
                debug!("Renderer connecting from {}", addr);
                let registry = Arc::clone(&accept_registry);
                let token = token.clone();
                TokioSpawn(async move {
                    if let Err(e) = handle_connection(stream, addr, token, registry).await {
                        error!("Connection {} ended with error: {}", addr, e);
                    }
                });
            }
        });

        Ok(Arc::new(Self {
            registry,
            local_addr,
            accept_task,
        }))
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting new connections.
    pub fn shutdown(&self) {
        self.accept_task.abort();
    }
}

impl Drop for WsHost {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

impl HostTransport for WsHost {
    fn on(&self, channel: &str, listener: HostListener) {
        self.registry.listeners.add(channel, listener);
    }

    fn remove_all_listeners(&self, channel: &str) {
        self.registry.listeners.remove_all(channel);
    }

    fn handle(&self, channel: &str, handler: HostHandler) {
        if self.registry.handlers.replace(channel, handler) {
            warn!("Replaced existing invoke handler on [{}]", channel);
        }
    }

    fn remove_handler(&self, channel: &str) {
        self.registry.handlers.remove_all(channel);
    }
}

/// Host's handle on one renderer connection.
struct WsPeer {
    id: u64,
    outbound: mpsc::UnboundedSender<Message>,
}

impl WsPeer {
    #[track_caller]
    fn push(&self, frame: &Frame) -> Result<(), TransportError> {
        let message = frame.to_message()?;
        self.outbound
            .send(message)
            .map_err(|_| TransportError::Closed {
                message: format!("renderer {} disconnected", self.id),
                location: ErrorLocation::from(Location::caller()),
            })
    }
}

impl Peer for WsPeer {
    fn id(&self) -> u64 {
        self.id
    }

    fn send(&self, channel: &str, payload: Value) -> Result<(), TransportError> {
        self.push(&Frame::Event {
            channel: channel.to_string(),
            payload,
        })
    }
}

/// Serve one renderer.
///
/// 1. Rejects non-loopback peers
/// 2. Performs the WebSocket upgrade
/// 3. Requires `auth` as first frame
/// 4. Dispatches `send` and `invoke` frames until the renderer disconnects
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    token: RedactedToken,
    registry: Arc<HostRegistry>,
) -> Result<(), TransportError> {
    if !addr.ip().is_loopback() {
        warn!("Rejected non-loopback connection from {}", addr);
        return Ok(());
    }

    let ws_stream = accept_async(stream)
        .await
        .map_err(|e| TransportError::Handshake {
            message: format!("WebSocket handshake failed: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?;

    let (write, mut read) = ws_stream.split();
    let (outbound, outbound_rx) = mpsc::unbounded_channel();
    TokioSpawn(forward_outbound(write, outbound_rx));

    let mut state = ConnectionState::new(token);
    let peer = Arc::new(WsPeer {
        id: registry.next_peer.fetch_add(1, Ordering::Relaxed),
        outbound,
    });

    match read.next().await {
        Some(Ok(message)) => match Frame::from_message(&message) {
            Some(Ok(Frame::Auth { token })) if state.validate_token(&token) => {
                info!("Renderer {} authenticated from {}", peer.id, addr);
                peer.push(&Frame::AuthResult {
                    success: true,
                    error: None,
                })?;
            }
            Some(Ok(Frame::Auth { .. })) => {
                warn!("Renderer at {} failed auth: invalid token", addr);
                peer.push(&Frame::AuthResult {
                    success: false,
                    error: Some(String::from("Invalid authentication token")),
                })?;
                return Ok(());
            }
            _ => {
                warn!("Renderer at {} did not open with an auth frame", addr);
                return Ok(());
            }
        },
        Some(Err(e)) => {
            return Err(TransportError::Read {
                message: format!("Error reading first frame: {}", e),
                location: ErrorLocation::from(Location::caller()),
            });
        }
        None => {
            debug!("Renderer at {} disconnected before auth", addr);
            return Ok(());
        }
    }

    while let Some(message) = read.next().await {
        let message = message.map_err(|e| TransportError::Read {
            message: format!("Error reading frame: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?;

        let frame = match Frame::from_message(&message) {
            Some(Ok(frame)) => frame,
            Some(Err(e)) => {
                warn!("Dropping undecodable frame from renderer {}: {}", peer.id, e);
                continue;
            }
            None if message.is_close() => break,
            None => continue,
        };

        match frame {
            Frame::Send { channel, payload } => {
                let listeners = registry.listeners.get(&channel);
                if listeners.is_empty() {
                    debug!("No host listener on [{}], dropping", channel);
                }
                let sender: PeerRef = peer.clone();
                for listener in listeners {
                    listener(Arc::clone(&sender), payload.clone());
                }
            }
            Frame::Invoke {
                request_id,
                channel,
                payload,
            } => {
                let Some(handler) = registry.handlers.first(&channel) else {
                    warn!("No invoke handler on [{}]", channel);
                    peer.push(&Frame::Fault {
                        request_id,
                        message: format!("No handler registered for [{}]", channel),
                        channel,
                    })?;
                    continue;
                };
                let replier = Arc::clone(&peer);
                let sender: PeerRef = peer.clone();
                TokioSpawn(async move {
                    let payload = handler(sender, payload).await;
                    if let Err(e) = replier.push(&Frame::Reply {
                        request_id,
                        payload,
                    }) {
                        warn!("Reply {} not delivered: {}", request_id, e);
                    }
                });
            }
            other => {
                warn!("Unexpected frame from renderer {}: {:?}", peer.id, other);
            }
        }
    }

    info!("Renderer {} disconnected", peer.id);
    Ok(())
}

/// Drain the outbound queue into the socket until either side closes.
async fn forward_outbound(
    mut write: SplitSink<WebSocketStream<TcpStream>, Message>,
    mut outbound_rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(message) = outbound_rx.recv().await {
        if let Err(e) = write.send(message).await {
            debug!("Outbound socket closed: {}", e);
            break;
        }
    }
    let _ = write.close().await;
}

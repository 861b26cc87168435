//! Localhost WebSocket bridge.
//!
//! The host binds `127.0.0.1:<port>`; renderers connect with a shared token.
//!
//! # Protocol
//!
//! JSON text frames, one [`Frame`] each:
//!
//! 1. Renderer sends `auth` with the token as its first frame.
//! 2. Host answers `auth_result`; on failure the connection closes.
//! 3. Renderer sends `send` (fire-and-forget) and `invoke` (with `request_id`).
//! 4. Host answers each `invoke` with `reply` or `fault` carrying the same
//!    `request_id`, and pushes `event` frames for broadcasts.
//!
//! # Security
//!
//! - Bound to the loopback interface; non-loopback peers are dropped
//! - First frame must be a valid `auth`; anything else closes the connection

mod client;
mod connection_state;
mod frame;
mod host;

pub use client::WsClient;
pub use frame::Frame;
pub use host::WsHost;

pub const WS_HOSTNAME: &str = "127.0.0.1";

use crate::error::DemoError;

use messenger_core::transport::ws::WS_HOSTNAME;

use common::{ErrorLocation, RedactedToken};

use std::panic::Location;

use url::Url;

/// Where the renderer finds the host and what it authenticates with.
#[derive(Clone)]
pub struct SessionInfo {
    port: u16,
    auth_token: RedactedToken,
}

impl SessionInfo {
    pub fn new(port: u16, auth_token: impl Into<String>) -> Self {
        Self {
            port,
            auth_token: RedactedToken::new(auth_token),
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn auth_token(&self) -> &RedactedToken {
        &self.auth_token
    }

    /// Same session on the port the host actually bound.
    pub fn with_port(&self, port: u16) -> Self {
        Self {
            port,
            auth_token: self.auth_token.clone(),
        }
    }

    /// `ws://127.0.0.1:<port>`
    #[track_caller]
    pub fn url(&self) -> Result<Url, DemoError> {
        Url::parse(&format!("ws://{}:{}", WS_HOSTNAME, self.port)).map_err(|e| DemoError::Demo {
            message: format!("Invalid host url for port {}: {}", self.port, e),
            location: ErrorLocation::from(Location::caller()),
        })
    }
}

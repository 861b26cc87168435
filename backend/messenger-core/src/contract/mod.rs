//! Message contracts shared by host and renderer.
//!
//! The traits describe payload shapes at compile time; [`Contract`] is the
//! runtime table both dispatchers are built from.

use log::warn;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::{Display, Formatter, Result as FormatResult};

/// Direction of a channel key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Fire-and-forget, no reply.
    Message,
    /// Request/response.
    Invoke,
}

impl Display for Mode {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        match self {
            Mode::Message => write!(formatter, "message"),
            Mode::Invoke => write!(formatter, "invoke"),
        }
    }
}

/// A fire-and-forget key and its payload.
pub trait MessageContract {
    const KEY: &'static str;
    type Payload: Serialize + DeserializeOwned + Send + 'static;
}

/// A request/response key.
pub trait InvokeContract {
    const KEY: &'static str;
    type Request: Serialize + DeserializeOwned + Send + 'static;
    type Response: Serialize + DeserializeOwned + Send + 'static;
}

/// A typed slot in a value store.
pub trait StateContract {
    const KEY: &'static str;
    type Value: Serialize + DeserializeOwned + Send + 'static;
}

/// Ordered table of declared keys and their direction.
#[derive(Debug, Clone, Default)]
pub struct Contract {
    entries: Vec<(String, Mode)>,
}

impl Contract {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn message<M: MessageContract>(self) -> Self {
        self.declare(M::KEY, Mode::Message)
    }

    pub fn invoke<I: InvokeContract>(self) -> Self {
        self.declare(I::KEY, Mode::Invoke)
    }

    /// Declare a key by name. Re-declaring a key replaces its mode.
    pub fn declare(mut self, key: impl Into<String>, mode: Mode) -> Self {
        let key = key.into();
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            warn!("Contract key [{}] declared twice, keeping {}", key, mode);
            entry.1 = mode;
        } else {
            self.entries.push((key, mode));
        }
        self
    }

    pub fn mode(&self, key: &str) -> Option<Mode> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, mode)| *mode)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Mode)> {
        self.entries.iter().map(|(k, mode)| (k.as_str(), *mode))
    }

    pub fn keys_with(&self, mode: Mode) -> impl Iterator<Item = &str> {
        self.iter().filter(move |(_, m)| *m == mode).map(|(k, _)| k)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

use crate::error::config::ConfigError;
use crate::{
    CHANNEL_SEPARATOR, CLIENT_EVENT_CHANNEL, INVOKE_CHANNEL_PREFIX, INVOKE_NAMESPACE,
    SERVICE_RESPONSE_CHANNEL,
};

use common::ErrorLocation;

use std::panic::Location;
use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};

const CONFIG_FILE_NAME: &str = "messenger.json";
const CONFIG_VERSION: u32 = 1;
const DEFAULT_PORT: u16 = 19876;

// ============================================
// CONFIG STRUCTS
// ============================================

/// Channel names both processes must agree on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelNames {
    #[serde(default = "default_client_event")]
    pub client_event: String,
    #[serde(default = "default_service_response")]
    pub service_response: String,
    #[serde(default = "default_invoke_namespace")]
    pub invoke_namespace: String,
}

impl Default for ChannelNames {
    fn default() -> Self {
        Self {
            client_event: default_client_event(),
            service_response: default_service_response(),
            invoke_namespace: default_invoke_namespace(),
        }
    }
}

impl ChannelNames {
    /// Channel an invoke handler for `key` listens on: `<namespace>::<key>`.
    pub fn invoke_channel(&self, key: &str) -> String {
        if self.invoke_namespace == INVOKE_NAMESPACE {
            return format!("{INVOKE_CHANNEL_PREFIX}{key}");
        }
        format!("{}{CHANNEL_SEPARATOR}{}", self.invoke_namespace, key)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessengerConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub channels: ChannelNames,

    #[serde(default)]
    pub transport: TransportConfig,
}

impl Default for MessengerConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            channels: ChannelNames::default(),
            transport: TransportConfig::default(),
        }
    }
}

// ============================================
// DEFAULT FUNCTIONS
// ============================================

fn default_version() -> u32 {
    CONFIG_VERSION
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_client_event() -> String {
    CLIENT_EVENT_CHANNEL.to_string()
}
fn default_service_response() -> String {
    SERVICE_RESPONSE_CHANNEL.to_string()
}
fn default_invoke_namespace() -> String {
    INVOKE_NAMESPACE.to_string()
}

// ============================================
// IMPLEMENTATION
// ============================================

impl MessengerConfig {
    /// Load config from {config_dir}/messenger.json.
    ///
    /// # Returns
    ///
    /// Returns defaults if the file is missing.
    /// Returns `Err(ConfigError)` if the file exists but is unreadable or invalid.
    pub fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            info!(
                "Config file not found at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path).map_err(|e| {
            warn!("Failed to read config file: {}", e);
            ConfigError::ReadError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                source: e,
            }
        })?;

        let config: MessengerConfig = serde_json::from_str(&contents).map_err(|e| {
            warn!("Failed to parse config JSON: {}", e);
            ConfigError::ParseError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                reason: e.to_string(),
            }
        })?;

        config.validate()?;

        info!("Config loaded from {}", config_path.display());
        Ok(config)
    }

    /// Save config to {config_dir}/messenger.json using temp file + rename.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if validation, directory creation, serialization,
    /// write or rename fails.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        self.validate()?;

        std::fs::create_dir_all(config_dir).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: config_dir.to_path_buf(),
            source: e,
        })?;

        let config_path = config_dir.join(CONFIG_FILE_NAME);
        let temp_path = config_dir.join(format!("{}.tmp", CONFIG_FILE_NAME));

        let json = serde_json::to_string_pretty(self).map_err(|e| ConfigError::SerializeError {
            location: ErrorLocation::from(Location::caller()),
            reason: e.to_string(),
        })?;

        std::fs::write(&temp_path, json).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: temp_path.clone(),
            source: e,
        })?;

        std::fs::rename(&temp_path, &config_path).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: config_path.clone(),
            source: e,
        })?;

        info!("Config saved to {}", config_path.display());
        Ok(())
    }

    /// Validate config values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version == 0 || self.version > CONFIG_VERSION {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: format!(
                    "Invalid version: {} (expected 1-{})",
                    self.version, CONFIG_VERSION
                ),
            });
        }

        let channels = &self.channels;
        let names = [
            ("client_event", &channels.client_event),
            ("service_response", &channels.service_response),
            ("invoke_namespace", &channels.invoke_namespace),
        ];
        for (field, name) in names {
            if name.trim().is_empty() {
                return Err(ConfigError::ValidationError {
                    location: ErrorLocation::from(Location::caller()),
                    reason: format!("channels.{} cannot be empty", field),
                });
            }
        }

        if channels.client_event == channels.service_response
            || channels.client_event == channels.invoke_namespace
            || channels.service_response == channels.invoke_namespace
        {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: String::from("channel names must be distinct"),
            });
        }

        if channels.invoke_namespace.ends_with(CHANNEL_SEPARATOR) {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: format!(
                    "invoke_namespace must not end with '{}': {}",
                    CHANNEL_SEPARATOR, channels.invoke_namespace
                ),
            });
        }

        if self.transport.port == 0 {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: String::from("transport.port must be non-zero"),
            });
        }

        Ok(())
    }
}

//! Client configuration loaded from TOML.

use ipc_contract::{ChannelConfig, CommandConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::request::MutationPolicy;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
/// Native file-picker settings.
pub struct PickerConfig {
    /// Whether several files may be picked at once.
    pub multiple: bool,
    /// Display name of the readable-extension filter.
    pub filter_name: String,
}

impl Default for PickerConfig {
    fn default() -> Self {
        Self {
            multiple: true,
            filter_name: "*".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
/// Top-level client settings; every field falls back to the stock host contract.
pub struct ClientConfig {
    /// Push-channel names.
    pub channels: ChannelConfig,
    /// Host command names.
    pub commands: CommandConfig,
    /// File-picker settings.
    pub picker: PickerConfig,
    /// Settlement policy for shared mutation slots.
    pub mutation_policy: MutationPolicy,
}

/// Configuration loading failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The TOML body could not be parsed into [`ClientConfig`].
    #[error("failed to parse client config: {0}")]
    Parse(#[from] toml::de::Error),
}

impl ClientConfig {
    /// Parses a TOML document; missing tables and keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or mistyped values.
    pub fn from_toml_str(body: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(body)?)
    }
}

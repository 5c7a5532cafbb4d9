//! Centralized push-channel and command names shared with the host process.

use serde::{Deserialize, Serialize};

/// Push channel names (client emit ↔ host listen, host emit ↔ client listen).
pub mod events {
    /// Outbound channel carrying an `OperationEnvelope`.
    pub const EMIT_FILE: &str = "emit-file";
    /// Inbound channel carrying one serialized `FileRecord` per emission.
    pub const LISTEN_FILE: &str = "listen-file";
    /// Inbound channel carrying a `Clear` operation tag.
    pub const LISTEN_CLEAR_FILE: &str = "listen-clear-file";
    /// Inbound channel carrying a `Delete` operation tag.
    pub const LISTEN_DELETE_FILE: &str = "listen-delete-file";
}

/// Host command names (client invoke → host handler).
pub mod commands {
    /// Returns `{ ext, readable, writable }[]`.
    pub const GET_SUPPORTED_EXTENSIONS: &str = "get_supported_extensions";
    /// Returns `{ extension, min, max, default, step }[]`.
    pub const GET_COMPRESS_OPTIONS_CONTEXT: &str = "get_compress_options_context";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
/// Push-channel names used by a client instance.
pub struct ChannelConfig {
    /// Outbound envelope channel.
    pub emit_file: String,
    /// Inbound per-record channel.
    pub listen_file: String,
    /// Inbound clear-signal channel.
    pub listen_clear_file: String,
    /// Inbound delete-signal channel.
    pub listen_delete_file: String,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            emit_file: events::EMIT_FILE.to_string(),
            listen_file: events::LISTEN_FILE.to_string(),
            listen_clear_file: events::LISTEN_CLEAR_FILE.to_string(),
            listen_delete_file: events::LISTEN_DELETE_FILE.to_string(),
        }
    }
}

impl ChannelConfig {
    /// Returns the inbound channels that carry reset signals.
    pub fn reset_channels(&self) -> [&str; 2] {
        [&self.listen_clear_file, &self.listen_delete_file]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
/// Host command names used by a client instance.
pub struct CommandConfig {
    /// Supported-extension listing command.
    pub supported_extensions: String,
    /// Compression-bounds listing command.
    pub compress_options_context: String,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            supported_extensions: commands::GET_SUPPORTED_EXTENSIONS.to_string(),
            compress_options_context: commands::GET_COMPRESS_OPTIONS_CONTEXT.to_string(),
        }
    }
}

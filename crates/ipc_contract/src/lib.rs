//! Typed host-process contracts shared by the compression client and its transports.
//!
//! This crate is the API-first boundary between the UI process and the external worker process.
//! It exposes the single failure taxonomy ([`HostError`]) and its normalizer, the wire models
//! exchanged over commands and push channels, stable channel/command names, and the object-safe
//! [`HostBridge`] service trait. Concrete webview transport lives in `ipc_bridge_web`; the
//! request, query, and reconciliation layers live in `ipc_client`.

#![warn(missing_docs, rustdoc::broken_intra_doc_links)]

pub mod bridge;
pub mod channels;
pub mod envelope;
pub mod error;
pub mod formats;
pub mod record;

pub use bridge::{
    emit_json_with, invoke_json_with, open_dialog_with, DialogFilter, DialogOptions, DialogPick,
    HostBridge, HostBridgeFuture, ListenerHandle, MemoryHostBridge, NoopHostBridge, PushHandler,
};
pub use channels::{commands, events, ChannelConfig, CommandConfig};
pub use envelope::{CompressOptions, Operation, OperationEnvelope};
pub use error::{normalize_failure, BridgeFailure, HostError, SerializedHostError, HOST_ERROR_NAME};
pub use formats::{
    readable_extensions, resolve_compress_options, CompressOptionsContext, SupportedExtension,
    TuningError,
};
pub use record::{
    FileMeta, FileOutput, FileRecord, FileState, FileStatus, RecordSchemaError, WireFileRecord,
};

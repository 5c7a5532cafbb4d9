//! Webview (`wasm32`) transport for the [`ipc_contract::HostBridge`] service contract.
//!
//! The concrete transport talks to the Tauri global API injected into the webview:
//! `core.invoke` for commands, `event.emit`/`event.listen` for push channels, and `dialog.open`
//! for the native file picker. Target-specific glue lives under `interop` with a non-wasm
//! fallback so the crate still builds and tests natively.

#![warn(missing_docs, rustdoc::broken_intra_doc_links)]

/// Compile-time host-strategy selection and the erased bridge adapter used by the client.
pub mod adapters;
mod interop;
pub mod tauri_bridge;

pub use adapters::{
    host_bridge, host_strategy_name, selected_host_strategy, HostBridgeAdapter, HostStrategy,
};
pub use tauri_bridge::TauriHostBridge;

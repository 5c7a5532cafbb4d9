//! Shared transport interop for the webview host bridge.
//!
//! This module routes calls to target-specific implementations while preserving a uniform API
//! for [`crate::TauriHostBridge`].

use ipc_contract::{BridgeFailure, DialogOptions, ListenerHandle, PushHandler};
use serde_json::Value;

#[cfg(not(target_arch = "wasm32"))]
mod non_wasm;
#[cfg(target_arch = "wasm32")]
mod wasm;

#[cfg(not(target_arch = "wasm32"))]
use non_wasm as imp;
#[cfg(target_arch = "wasm32")]
use wasm as imp;

pub async fn invoke(command: &str, args: &Value) -> Result<Value, BridgeFailure> {
    imp::invoke(command, args).await
}

pub async fn emit(channel: &str, payload: &Value) -> Result<(), BridgeFailure> {
    imp::emit(channel, payload).await
}

pub async fn listen(channel: &str, handler: PushHandler) -> Result<ListenerHandle, BridgeFailure> {
    imp::listen(channel, handler).await
}

pub async fn open_dialog(options: &DialogOptions) -> Result<Value, BridgeFailure> {
    imp::open_dialog(options).await
}

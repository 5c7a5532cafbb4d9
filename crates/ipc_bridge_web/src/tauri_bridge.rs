//! Tauri webview-backed host bridge.

use ipc_contract::{
    BridgeFailure, DialogOptions, HostBridge, HostBridgeFuture, ListenerHandle, PushHandler,
};
use serde_json::Value;

#[derive(Debug, Clone, Copy, Default)]
/// Host bridge backed by the Tauri global API of the current webview.
pub struct TauriHostBridge;

impl HostBridge for TauriHostBridge {
    fn invoke<'a>(
        &'a self,
        command: &'a str,
        args: Value,
    ) -> HostBridgeFuture<'a, Result<Value, BridgeFailure>> {
        Box::pin(async move { crate::interop::invoke(command, &args).await })
    }

    fn emit<'a>(
        &'a self,
        channel: &'a str,
        payload: Value,
    ) -> HostBridgeFuture<'a, Result<(), BridgeFailure>> {
        Box::pin(async move { crate::interop::emit(channel, &payload).await })
    }

    fn listen<'a>(
        &'a self,
        channel: &'a str,
        handler: PushHandler,
    ) -> HostBridgeFuture<'a, Result<ListenerHandle, BridgeFailure>> {
        Box::pin(async move { crate::interop::listen(channel, handler).await })
    }

    fn open_dialog<'a>(
        &'a self,
        options: DialogOptions,
    ) -> HostBridgeFuture<'a, Result<Value, BridgeFailure>> {
        Box::pin(async move { crate::interop::open_dialog(&options).await })
    }
}

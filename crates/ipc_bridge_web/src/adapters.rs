use ipc_contract::{
    BridgeFailure, DialogOptions, HostBridge, HostBridgeFuture, ListenerHandle, NoopHostBridge,
    PushHandler,
};
use serde_json::Value;

use crate::TauriHostBridge;

#[cfg(all(feature = "desktop-host-stub", feature = "desktop-host-tauri"))]
compile_error!(
    "features `desktop-host-stub` and `desktop-host-tauri` are mutually exclusive; enable only one"
);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Compile-time selected host strategy for the client bridge.
pub enum HostStrategy {
    /// Tauri webview transport to the worker process.
    DesktopTauri,
    /// Desktop placeholder host used while the worker process is not wired in.
    DesktopStub,
    /// No host attached; commands fail and push channels stay silent.
    Detached,
}

/// Returns the compile-time selected host strategy for the active build.
pub const fn selected_host_strategy() -> HostStrategy {
    #[cfg(feature = "desktop-host-tauri")]
    {
        HostStrategy::DesktopTauri
    }

    #[cfg(feature = "desktop-host-stub")]
    {
        HostStrategy::DesktopStub
    }

    #[cfg(not(any(feature = "desktop-host-stub", feature = "desktop-host-tauri")))]
    {
        HostStrategy::Detached
    }
}

/// Returns the selected host strategy as a stable string token.
pub fn host_strategy_name() -> &'static str {
    match selected_host_strategy() {
        HostStrategy::DesktopTauri => "desktop-tauri",
        HostStrategy::DesktopStub => "desktop-stub",
        HostStrategy::Detached => "detached",
    }
}

/// Adapter enum that erases the concrete transport behind [`HostBridge`].
#[derive(Debug, Clone, Copy)]
pub enum HostBridgeAdapter {
    /// Tauri webview transport.
    DesktopTauri(TauriHostBridge),
    /// No-op fallback used when desktop transport is intentionally stubbed.
    DesktopStub(NoopHostBridge),
    /// No-op fallback used when no host is attached at all.
    Detached(NoopHostBridge),
}

impl HostBridgeAdapter {
    /// Returns the strategy this adapter was built for.
    pub const fn strategy(&self) -> HostStrategy {
        match self {
            Self::DesktopTauri(_) => HostStrategy::DesktopTauri,
            Self::DesktopStub(_) => HostStrategy::DesktopStub,
            Self::Detached(_) => HostStrategy::Detached,
        }
    }
}

impl HostBridge for HostBridgeAdapter {
    fn invoke<'a>(
        &'a self,
        command: &'a str,
        args: Value,
    ) -> HostBridgeFuture<'a, Result<Value, BridgeFailure>> {
        match self {
            Self::DesktopTauri(bridge) => bridge.invoke(command, args),
            Self::DesktopStub(bridge) | Self::Detached(bridge) => bridge.invoke(command, args),
        }
    }

    fn emit<'a>(
        &'a self,
        channel: &'a str,
        payload: Value,
    ) -> HostBridgeFuture<'a, Result<(), BridgeFailure>> {
        match self {
            Self::DesktopTauri(bridge) => bridge.emit(channel, payload),
            Self::DesktopStub(bridge) | Self::Detached(bridge) => bridge.emit(channel, payload),
        }
    }

    fn listen<'a>(
        &'a self,
        channel: &'a str,
        handler: PushHandler,
    ) -> HostBridgeFuture<'a, Result<ListenerHandle, BridgeFailure>> {
        match self {
            Self::DesktopTauri(bridge) => bridge.listen(channel, handler),
            Self::DesktopStub(bridge) | Self::Detached(bridge) => bridge.listen(channel, handler),
        }
    }

    fn open_dialog<'a>(
        &'a self,
        options: DialogOptions,
    ) -> HostBridgeFuture<'a, Result<Value, BridgeFailure>> {
        match self {
            Self::DesktopTauri(bridge) => bridge.open_dialog(options),
            Self::DesktopStub(bridge) | Self::Detached(bridge) => bridge.open_dialog(options),
        }
    }
}

/// Builds the host bridge for the compile-time selected strategy.
pub fn host_bridge() -> HostBridgeAdapter {
    match selected_host_strategy() {
        HostStrategy::DesktopTauri => HostBridgeAdapter::DesktopTauri(TauriHostBridge),
        HostStrategy::DesktopStub => HostBridgeAdapter::DesktopStub(NoopHostBridge),
        HostStrategy::Detached => HostBridgeAdapter::Detached(NoopHostBridge),
    }
}

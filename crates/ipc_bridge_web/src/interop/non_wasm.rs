use super::*;

fn unsupported() -> BridgeFailure {
    BridgeFailure::Message("Tauri host bridge is only available when compiled for wasm32".to_string())
}

pub async fn invoke(_command: &str, _args: &Value) -> Result<Value, BridgeFailure> {
    Err(unsupported())
}

pub async fn emit(_channel: &str, _payload: &Value) -> Result<(), BridgeFailure> {
    Err(unsupported())
}

pub async fn listen(
    _channel: &str,
    _handler: PushHandler,
) -> Result<ListenerHandle, BridgeFailure> {
    Err(unsupported())
}

pub async fn open_dialog(_options: &DialogOptions) -> Result<Value, BridgeFailure> {
    Err(unsupported())
}

use super::*;
use ipc_contract::{HostError, HOST_ERROR_NAME};
use js_sys::{Function, Promise};
use serde::Serialize;
use serde_wasm_bindgen::{from_value, Serializer};
use wasm_bindgen::{closure::Closure, prelude::*, JsCast};
use wasm_bindgen_futures::JsFuture;

#[wasm_bindgen(inline_js = r#"
function tauri() {
  const api = globalThis.__TAURI__;
  if (!api) throw new Error('Tauri API is not injected into this webview');
  return api;
}

function invokeFn(api) {
  const core = api.core ?? api.tauri;
  if (!core || typeof core.invoke !== 'function') throw new Error('Tauri invoke API is unavailable');
  return core.invoke;
}

export async function jsHostInvoke(command, args) {
  const api = tauri();
  return await invokeFn(api)(command, args ?? {});
}

export async function jsHostEmit(channel, payload) {
  await tauri().event.emit(channel, payload);
  return null;
}

export async function jsHostListen(channel, handler) {
  return await tauri().event.listen(channel, (event) => handler(event.payload));
}

export async function jsHostOpenDialog(options) {
  const dialog = tauri().dialog;
  if (!dialog || typeof dialog.open !== 'function') throw new Error('Tauri dialog API is unavailable');
  return await dialog.open(options);
}
"#)]
extern "C" {
    #[wasm_bindgen(js_name = jsHostInvoke)]
    fn js_host_invoke(command: &str, args: JsValue) -> Promise;
    #[wasm_bindgen(js_name = jsHostEmit)]
    fn js_host_emit(channel: &str, payload: JsValue) -> Promise;
    #[wasm_bindgen(js_name = jsHostListen)]
    fn js_host_listen(channel: &str, handler: &Function) -> Promise;
    #[wasm_bindgen(js_name = jsHostOpenDialog)]
    fn js_host_open_dialog(options: JsValue) -> Promise;
}

async fn await_promise(promise: Promise) -> Result<JsValue, BridgeFailure> {
    JsFuture::from(promise).await.map_err(classify_rejection)
}

/// Sorts a promise rejection into the raw failure shapes the normalizer understands.
fn classify_rejection(err: JsValue) -> BridgeFailure {
    if let Some(text) = err.as_string() {
        return BridgeFailure::Message(text);
    }
    if err.is_object() {
        if let Ok(host) = from_value::<HostError>(err.clone()) {
            if host.name == HOST_ERROR_NAME {
                return BridgeFailure::Host(host);
            }
        }
        if let Ok(message) = js_sys::Reflect::get(&err, &JsValue::from_str("message")) {
            if let Some(text) = message.as_string() {
                return BridgeFailure::Message(text);
            }
        }
    }
    BridgeFailure::Unrecognized(format!("{err:?}"))
}

fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, BridgeFailure> {
    value
        .serialize(&Serializer::json_compatible())
        .map_err(|e| BridgeFailure::Message(e.to_string()))
}

fn from_js(value: JsValue) -> Result<Value, BridgeFailure> {
    if value.is_undefined() {
        return Ok(Value::Null);
    }
    from_value(value).map_err(|e| BridgeFailure::Message(e.to_string()))
}

pub async fn invoke(command: &str, args: &Value) -> Result<Value, BridgeFailure> {
    let args = to_js(args)?;
    from_js(await_promise(js_host_invoke(command, args)).await?)
}

pub async fn emit(channel: &str, payload: &Value) -> Result<(), BridgeFailure> {
    let payload = to_js(payload)?;
    let _ = await_promise(js_host_emit(channel, payload)).await?;
    Ok(())
}

pub async fn listen(channel: &str, handler: PushHandler) -> Result<ListenerHandle, BridgeFailure> {
    let callback = Closure::<dyn FnMut(JsValue)>::wrap(Box::new(move |payload: JsValue| {
        handler(from_js(payload).unwrap_or(Value::Null));
    }));
    let unlisten = await_promise(js_host_listen(channel, callback.as_ref().unchecked_ref())).await?;
    let unlisten: Function = unlisten
        .dyn_into()
        .map_err(|value| BridgeFailure::Unrecognized(format!("{value:?}")))?;
    Ok(ListenerHandle::new(move || {
        let _ = unlisten.call0(&JsValue::NULL);
        drop(callback);
    }))
}

pub async fn open_dialog(options: &DialogOptions) -> Result<Value, BridgeFailure> {
    let options = to_js(options)?;
    from_js(await_promise(js_host_open_dialog(options)).await?)
}

//! Host bridge service contract, typed call helpers, and in-memory/no-op adapters.

use std::{
    cell::{Cell, RefCell},
    collections::{BTreeMap, HashMap},
    future::Future,
    pin::Pin,
    rc::Rc,
};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::error::{normalize_failure, BridgeFailure, HostError};

/// Object-safe boxed future used by [`HostBridge`] async methods.
pub type HostBridgeFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Callback invoked with the raw payload of each push event on a subscribed channel.
pub type PushHandler = Rc<dyn Fn(Value)>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Extension filter offered by the native file picker.
pub struct DialogFilter {
    /// Filter display name.
    pub name: String,
    /// Extensions without leading dots.
    pub extensions: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Options passed to the native file picker.
pub struct DialogOptions {
    /// Whether several files may be selected.
    pub multiple: bool,
    /// Extension filters; empty means no filtering.
    pub filters: Vec<DialogFilter>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
/// Non-empty picker result (`string[] | string`); a cancelled dialog decodes to `None`.
pub enum DialogPick {
    /// Multi-selection result.
    Many(Vec<String>),
    /// Single-selection result.
    One(String),
}

impl DialogPick {
    /// Flattens the pick into a path list.
    pub fn into_paths(self) -> Vec<String> {
        match self {
            Self::Many(paths) => paths,
            Self::One(path) => vec![path],
        }
    }
}

/// Explicit unsubscribe handle for one push-channel listener.
///
/// Releasing is idempotent; dropping the handle releases it too, so a subscription never outlives
/// its owner.
pub struct ListenerHandle {
    release: Option<Box<dyn FnOnce()>>,
    active: Rc<Cell<bool>>,
}

impl ListenerHandle {
    /// Creates a handle that runs `release` exactly once.
    pub fn new(release: impl FnOnce() + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
            active: Rc::new(Cell::new(true)),
        }
    }

    /// Creates a handle with nothing to release.
    pub fn inert() -> Self {
        Self::new(|| {})
    }

    /// Returns whether the listener is still registered.
    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    /// Unsubscribes the listener if it is still registered.
    pub fn unlisten(&mut self) {
        if self.active.replace(false) {
            if let Some(release) = self.release.take() {
                release();
            }
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.unlisten();
    }
}

impl std::fmt::Debug for ListenerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerHandle")
            .field("active", &self.active.get())
            .finish()
    }
}

/// Request/response and push-event transport to the host process.
pub trait HostBridge {
    /// Invokes a host command with JSON arguments.
    fn invoke<'a>(
        &'a self,
        command: &'a str,
        args: Value,
    ) -> HostBridgeFuture<'a, Result<Value, BridgeFailure>>;

    /// Emits a payload on an outbound push channel.
    fn emit<'a>(
        &'a self,
        channel: &'a str,
        payload: Value,
    ) -> HostBridgeFuture<'a, Result<(), BridgeFailure>>;

    /// Subscribes `handler` to an inbound push channel.
    fn listen<'a>(
        &'a self,
        channel: &'a str,
        handler: PushHandler,
    ) -> HostBridgeFuture<'a, Result<ListenerHandle, BridgeFailure>>;

    /// Opens the native file picker; resolves to `null | string | string[]`.
    fn open_dialog<'a>(
        &'a self,
        options: DialogOptions,
    ) -> HostBridgeFuture<'a, Result<Value, BridgeFailure>>;
}

/// Invokes `command` through a [`HostBridge`], decoding the JSON reply into `T`.
///
/// # Errors
///
/// Returns a normalized [`HostError`] when argument encoding, the host call, or reply decoding
/// fails.
pub async fn invoke_json_with<B, A, T>(bridge: &B, command: &str, args: &A) -> Result<T, HostError>
where
    B: HostBridge + ?Sized,
    A: Serialize + ?Sized,
    T: DeserializeOwned,
{
    let args = serde_json::to_value(args).map_err(|err| {
        HostError::new(format!("failed to encode arguments for `{command}`: {err}"))
    })?;
    let reply = bridge
        .invoke(command, args)
        .await
        .map_err(normalize_failure)?;
    serde_json::from_value(reply)
        .map_err(|err| HostError::new(format!("failed to decode `{command}` reply: {err}")))
}

/// Serializes `payload` and emits it on `channel` through a [`HostBridge`].
///
/// # Errors
///
/// Returns a normalized [`HostError`] when encoding or emission fails.
pub async fn emit_json_with<B, T>(bridge: &B, channel: &str, payload: &T) -> Result<(), HostError>
where
    B: HostBridge + ?Sized,
    T: Serialize + ?Sized,
{
    let payload = serde_json::to_value(payload).map_err(|err| {
        HostError::new(format!("failed to encode payload for `{channel}`: {err}"))
    })?;
    bridge
        .emit(channel, payload)
        .await
        .map_err(normalize_failure)
}

/// Opens the native file picker through a [`HostBridge`]; `None` means the user cancelled.
///
/// # Errors
///
/// Returns a normalized [`HostError`] when the dialog fails or replies with an unexpected shape.
pub async fn open_dialog_with<B>(
    bridge: &B,
    options: DialogOptions,
) -> Result<Option<DialogPick>, HostError>
where
    B: HostBridge + ?Sized,
{
    let reply = bridge
        .open_dialog(options)
        .await
        .map_err(normalize_failure)?;
    serde_json::from_value(reply)
        .map_err(|err| HostError::new(format!("failed to decode dialog selection: {err}")))
}

#[derive(Debug, Clone, Copy, Default)]
/// Host bridge used when no host process is attached.
pub struct NoopHostBridge;

fn unavailable(what: &str) -> BridgeFailure {
    BridgeFailure::Message(format!("host bridge unavailable: {what}"))
}

impl HostBridge for NoopHostBridge {
    fn invoke<'a>(
        &'a self,
        command: &'a str,
        _args: Value,
    ) -> HostBridgeFuture<'a, Result<Value, BridgeFailure>> {
        Box::pin(async move { Err(unavailable(command)) })
    }

    fn emit<'a>(
        &'a self,
        _channel: &'a str,
        _payload: Value,
    ) -> HostBridgeFuture<'a, Result<(), BridgeFailure>> {
        Box::pin(async { Ok(()) })
    }

    fn listen<'a>(
        &'a self,
        _channel: &'a str,
        _handler: PushHandler,
    ) -> HostBridgeFuture<'a, Result<ListenerHandle, BridgeFailure>> {
        Box::pin(async { Ok(ListenerHandle::inert()) })
    }

    fn open_dialog<'a>(
        &'a self,
        _options: DialogOptions,
    ) -> HostBridgeFuture<'a, Result<Value, BridgeFailure>> {
        Box::pin(async { Err(unavailable("dialog")) })
    }
}

#[derive(Default)]
struct MemoryBridgeState {
    replies: HashMap<String, Result<Value, BridgeFailure>>,
    dialog_reply: Option<Result<Value, BridgeFailure>>,
    emit_failure: Option<BridgeFailure>,
    invocations: Vec<(String, Value)>,
    dialogs: Vec<DialogOptions>,
    emitted: Vec<(String, Value)>,
    listeners: BTreeMap<u64, (String, PushHandler)>,
    next_listener_id: u64,
}

#[derive(Clone, Default)]
/// Scripted in-memory host: canned command/dialog replies, recorded emissions, and manual push
/// delivery to registered listeners.
pub struct MemoryHostBridge {
    inner: Rc<RefCell<MemoryBridgeState>>,
}

impl MemoryHostBridge {
    /// Scripts the reply returned for every invocation of `command`.
    pub fn set_reply(&self, command: impl Into<String>, reply: Result<Value, BridgeFailure>) {
        self.inner.borrow_mut().replies.insert(command.into(), reply);
    }

    /// Scripts the reply returned by the file picker (defaults to `null`, a cancelled dialog).
    pub fn set_dialog_reply(&self, reply: Result<Value, BridgeFailure>) {
        self.inner.borrow_mut().dialog_reply = Some(reply);
    }

    /// Makes every subsequent emission fail with `failure`; `None` restores success.
    pub fn set_emit_failure(&self, failure: Option<BridgeFailure>) {
        self.inner.borrow_mut().emit_failure = failure;
    }

    /// Returns every `(command, args)` pair invoked so far.
    pub fn invocations(&self) -> Vec<(String, Value)> {
        self.inner.borrow().invocations.clone()
    }

    /// Returns every picker option set requested so far.
    pub fn dialogs(&self) -> Vec<DialogOptions> {
        self.inner.borrow().dialogs.clone()
    }

    /// Returns every successfully emitted `(channel, payload)` pair.
    pub fn emitted(&self) -> Vec<(String, Value)> {
        self.inner.borrow().emitted.clone()
    }

    /// Returns the number of live listeners on `channel`.
    pub fn listener_count(&self, channel: &str) -> usize {
        self.inner
            .borrow()
            .listeners
            .values()
            .filter(|(subscribed, _)| subscribed == channel)
            .count()
    }

    /// Delivers `payload` to every listener on `channel` and returns how many were notified.
    pub fn deliver(&self, channel: &str, payload: Value) -> usize {
        let handlers: Vec<PushHandler> = self
            .inner
            .borrow()
            .listeners
            .values()
            .filter(|(subscribed, _)| subscribed == channel)
            .map(|(_, handler)| handler.clone())
            .collect();
        for handler in &handlers {
            handler(payload.clone());
        }
        handlers.len()
    }
}

impl HostBridge for MemoryHostBridge {
    fn invoke<'a>(
        &'a self,
        command: &'a str,
        args: Value,
    ) -> HostBridgeFuture<'a, Result<Value, BridgeFailure>> {
        Box::pin(async move {
            let mut state = self.inner.borrow_mut();
            state.invocations.push((command.to_string(), args));
            state.replies.get(command).cloned().unwrap_or_else(|| {
                Err(BridgeFailure::Message(format!(
                    "no reply scripted for `{command}`"
                )))
            })
        })
    }

    fn emit<'a>(
        &'a self,
        channel: &'a str,
        payload: Value,
    ) -> HostBridgeFuture<'a, Result<(), BridgeFailure>> {
        Box::pin(async move {
            let mut state = self.inner.borrow_mut();
            if let Some(failure) = state.emit_failure.clone() {
                return Err(failure);
            }
            state.emitted.push((channel.to_string(), payload));
            Ok(())
        })
    }

    fn listen<'a>(
        &'a self,
        channel: &'a str,
        handler: PushHandler,
    ) -> HostBridgeFuture<'a, Result<ListenerHandle, BridgeFailure>> {
        Box::pin(async move {
            let id = {
                let mut state = self.inner.borrow_mut();
                let id = state.next_listener_id;
                state.next_listener_id += 1;
                state.listeners.insert(id, (channel.to_string(), handler));
                id
            };
            let registry = Rc::downgrade(&self.inner);
            Ok(ListenerHandle::new(move || {
                if let Some(registry) = registry.upgrade() {
                    registry.borrow_mut().listeners.remove(&id);
                }
            }))
        })
    }

    fn open_dialog<'a>(
        &'a self,
        options: DialogOptions,
    ) -> HostBridgeFuture<'a, Result<Value, BridgeFailure>> {
        Box::pin(async move {
            let mut state = self.inner.borrow_mut();
            state.dialogs.push(options);
            state.dialog_reply.clone().unwrap_or(Ok(Value::Null))
        })
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::formats::SupportedExtension;

    #[test]
    fn typed_invoke_decodes_scripted_reply() {
        let bridge = MemoryHostBridge::default();
        bridge.set_reply(
            "get_supported_extensions",
            Ok(json!([{"ext": "png", "readable": true, "writable": true}])),
        );

        let formats: Vec<SupportedExtension> =
            block_on(invoke_json_with(&bridge, "get_supported_extensions", &Value::Null))
                .expect("invoke");
        assert_eq!(formats.len(), 1);
        assert_eq!(
            bridge.invocations(),
            vec![("get_supported_extensions".to_string(), Value::Null)]
        );
    }

    #[test]
    fn typed_invoke_normalizes_failures_and_bad_replies() {
        let bridge = MemoryHostBridge::default();
        bridge.set_reply("cmd", Err(BridgeFailure::Message("offline".to_string())));
        let err = block_on(invoke_json_with::<_, _, u32>(&bridge, "cmd", &()))
            .expect_err("scripted failure");
        assert_eq!(err.message.as_deref(), Some("offline"));

        bridge.set_reply("cmd", Ok(json!("not a number")));
        let err = block_on(invoke_json_with::<_, _, u32>(&bridge, "cmd", &()))
            .expect_err("decode failure");
        assert!(err.message_or_empty().starts_with("failed to decode `cmd` reply"));
    }

    #[test]
    fn dialog_selection_decodes_all_reply_shapes() {
        let bridge = MemoryHostBridge::default();
        assert_eq!(
            block_on(open_dialog_with(&bridge, DialogOptions::default())).expect("cancel"),
            None
        );

        bridge.set_dialog_reply(Ok(json!("/a.png")));
        let pick = block_on(open_dialog_with(&bridge, DialogOptions::default())).expect("one");
        assert_eq!(pick.map(DialogPick::into_paths), Some(vec!["/a.png".to_string()]));

        bridge.set_dialog_reply(Ok(json!(["/a.png", "/b.jpg"])));
        let pick = block_on(open_dialog_with(&bridge, DialogOptions::default())).expect("many");
        assert_eq!(
            pick.map(DialogPick::into_paths),
            Some(vec!["/a.png".to_string(), "/b.jpg".to_string()])
        );
        assert_eq!(bridge.dialogs().len(), 3);
    }

    #[test]
    fn listener_handles_release_on_unlisten_and_drop() {
        let bridge = MemoryHostBridge::default();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let handler: PushHandler = {
            let seen = seen.clone();
            Rc::new(move |payload| seen.borrow_mut().push(payload))
        };

        let mut first = block_on(bridge.listen("listen-file", handler.clone())).expect("listen");
        let second = block_on(bridge.listen("listen-file", handler)).expect("listen");
        assert_eq!(bridge.deliver("listen-file", json!(1)), 2);

        first.unlisten();
        first.unlisten();
        assert!(!first.is_active());
        assert_eq!(bridge.listener_count("listen-file"), 1);

        drop(second);
        assert_eq!(bridge.deliver("listen-file", json!(2)), 0);
        assert_eq!(*seen.borrow(), vec![json!(1), json!(1)]);
    }

    #[test]
    fn noop_bridge_rejects_calls_but_accepts_emits() {
        let bridge = NoopHostBridge;
        let bridge_obj: &dyn HostBridge = &bridge;
        let err = block_on(invoke_json_with::<_, _, Value>(bridge_obj, "get_supported_extensions", &()))
            .expect_err("unavailable");
        assert_eq!(
            err.message.as_deref(),
            Some("host bridge unavailable: get_supported_extensions")
        );
        block_on(emit_json_with(bridge_obj, "emit-file", &json!({}))).expect("emit");
        assert!(block_on(bridge_obj.listen("listen-file", Rc::new(|_| {})))
            .expect("listen")
            .is_active());
    }
}

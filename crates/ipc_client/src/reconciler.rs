//! Owner of the keyed file collection.
//!
//! [`FileReconciler`] applies optimistic local actions through [`reduce_collection`], merges host
//! push events keyed by `input.path` (last received wins, no sequence numbers exist), and queues
//! every outbound [`OperationEnvelope`] in an outbox that [`FileReconciler::flush`] drains onto
//! the `emit-file` channel in order. Other components only read snapshots.

use std::{
    cell::{Cell, RefCell},
    collections::{BTreeMap, VecDeque},
    future::Future,
    rc::{Rc, Weak},
};

use ipc_contract::{
    emit_json_with, normalize_failure, ChannelConfig, CompressOptions, FileRecord, HostBridge,
    ListenerHandle, Operation, OperationEnvelope, PushHandler,
};
use leptos::logging;
use serde_json::Value;
use thiserror::Error;

use crate::{
    collection::{
        reduce_collection, CollectionAction, CollectionEffect, CollectionError, FileCollection,
    },
    lifecycle::ActivationScope,
};

/// Reasons an inbound push payload is dropped.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PushPayloadError {
    /// Text payload that is not JSON.
    #[error("payload is not valid json: {0}")]
    Json(String),
    /// JSON that does not validate as a file record.
    #[error("payload does not match the file record schema: {0}")]
    Schema(String),
    /// Reset-channel payload whose tag is not `Clear` or `Delete`.
    #[error("`{0}` is not a reset signal")]
    NotResetSignal(String),
    /// The reducer refused the resulting action.
    #[error(transparent)]
    Rejected(#[from] CollectionError),
}

/// Parses a `listen-file` payload: JSON text (the wire form) or an already-decoded object.
///
/// # Errors
///
/// Returns [`PushPayloadError::Json`] for unparsable text and [`PushPayloadError::Schema`] for
/// records failing validation.
pub fn parse_push_record(payload: Value) -> Result<FileRecord, PushPayloadError> {
    let value = match payload {
        Value::String(text) => {
            serde_json::from_str(&text).map_err(|err| PushPayloadError::Json(err.to_string()))?
        }
        other => other,
    };
    serde_json::from_value(value).map_err(|err| PushPayloadError::Schema(err.to_string()))
}

/// Parses a reset-channel payload: a bare `Clear`/`Delete` tag or its JSON-text form.
///
/// # Errors
///
/// Returns [`PushPayloadError::NotResetSignal`] for anything else.
pub fn parse_reset_signal(payload: Value) -> Result<Operation, PushPayloadError> {
    let tag = match payload {
        Value::String(text) => serde_json::from_str::<String>(&text).unwrap_or(text),
        other => return Err(PushPayloadError::NotResetSignal(other.to_string())),
    };
    match serde_json::from_value::<Operation>(Value::String(tag.trim().to_string())) {
        Ok(operation) if operation.is_reset() => Ok(operation),
        _ => Err(PushPayloadError::NotResetSignal(tag)),
    }
}

/// Live push-channel subscriptions of one reconciler; released on drop.
#[derive(Debug, Default)]
pub struct SubscriptionGuard {
    handles: Vec<ListenerHandle>,
}

impl SubscriptionGuard {
    /// Returns the number of channels that registered successfully.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Returns whether no channel is subscribed.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Unsubscribes every channel now.
    pub fn release(&mut self) {
        for handle in &mut self.handles {
            handle.unlisten();
        }
        self.handles.clear();
    }
}

/// Push subscription owned by one consumer scope.
///
/// A registration that completes after [`Self::release`] (or after the scope was deactivated
/// elsewhere) is dropped on arrival, which unsubscribes it.
#[derive(Debug, Clone)]
pub struct ScopedSubscription {
    scope: ActivationScope,
    slot: Rc<RefCell<Option<SubscriptionGuard>>>,
}

impl ScopedSubscription {
    /// Returns whether a live subscription is held.
    pub fn is_held(&self) -> bool {
        self.slot.borrow().is_some()
    }

    /// Deactivates the scope and unsubscribes every channel registered so far.
    pub fn release(&self) {
        self.scope.deactivate();
        if let Some(mut guard) = self.slot.borrow_mut().take() {
            guard.release();
        }
    }
}

type Observer = Rc<dyn Fn(&FileCollection)>;

struct ReconcilerInner {
    bridge: Rc<dyn HostBridge>,
    channels: ChannelConfig,
    files: RefCell<FileCollection>,
    outbox: RefCell<VecDeque<OperationEnvelope>>,
    observers: RefCell<BTreeMap<u64, Observer>>,
    next_observer: Cell<u64>,
}

/// Exclusive owner of the file collection and its host synchronization.
#[derive(Clone)]
pub struct FileReconciler {
    inner: Rc<ReconcilerInner>,
}

impl FileReconciler {
    /// Creates an empty collection bound to `bridge` and `channels`.
    pub fn new(bridge: Rc<dyn HostBridge>, channels: ChannelConfig) -> Self {
        Self {
            inner: Rc::new(ReconcilerInner {
                bridge,
                channels,
                files: RefCell::new(FileCollection::new()),
                outbox: RefCell::new(VecDeque::new()),
                observers: RefCell::new(BTreeMap::new()),
                next_observer: Cell::new(0),
            }),
        }
    }

    /// Returns the channel names in use.
    pub fn channels(&self) -> &ChannelConfig {
        &self.inner.channels
    }

    /// Returns a read-only copy of the collection.
    pub fn snapshot(&self) -> FileCollection {
        self.inner.files.borrow().clone()
    }

    /// Returns the record tracked under `path`.
    pub fn get(&self, path: &str) -> Option<FileRecord> {
        self.inner.files.borrow().get(path).cloned()
    }

    /// Returns the number of tracked records.
    pub fn len(&self) -> usize {
        self.inner.files.borrow().len()
    }

    /// Returns whether nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.inner.files.borrow().is_empty()
    }

    /// Returns the number of envelopes waiting for [`Self::flush`].
    pub fn pending_envelopes(&self) -> usize {
        self.inner.outbox.borrow().len()
    }

    /// Runs `action` through the reducer, queues its envelopes, and notifies observers on change.
    ///
    /// # Errors
    ///
    /// Returns the reducer's [`CollectionError`]; the collection is left untouched.
    pub fn dispatch(&self, action: CollectionAction) -> Result<(), CollectionError> {
        let result = reduce_collection(&mut self.inner.files.borrow_mut(), action);
        match result {
            Ok(effects) => {
                let mut changed = false;
                let mut outbox = self.inner.outbox.borrow_mut();
                for effect in effects {
                    match effect {
                        CollectionEffect::NotifyHost(envelope) => outbox.push_back(envelope),
                        CollectionEffect::Changed => changed = true,
                    }
                }
                drop(outbox);
                if changed {
                    self.notify_observers();
                }
                Ok(())
            }
            Err(err) => {
                logging::warn!("file collection reducer error: {err}");
                Err(err)
            }
        }
    }

    /// Tracks picked paths as `Initialized` records and queues a `Create` envelope.
    ///
    /// # Errors
    ///
    /// Never fails for `Create`; the signature matches the other triggers.
    pub fn create<I, P>(&self, paths: I) -> Result<(), CollectionError>
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        self.dispatch(CollectionAction::Create {
            paths: paths.into_iter().map(Into::into).collect(),
        })
    }

    /// Queues a `Compress` envelope carrying the whole collection.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::EmptyCollection`] when nothing is tracked.
    pub fn compress(&self, options: Option<CompressOptions>) -> Result<(), CollectionError> {
        self.dispatch(CollectionAction::Compress { options })
    }

    /// Queues an `Update` envelope carrying the whole collection.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::EmptyCollection`] when nothing is tracked.
    pub fn update(&self, options: Option<CompressOptions>) -> Result<(), CollectionError> {
        self.dispatch(CollectionAction::Update { options })
    }

    /// Empties the collection and queues a `Clear` envelope.
    ///
    /// # Errors
    ///
    /// Never fails for `Clear`.
    pub fn clear(&self) -> Result<(), CollectionError> {
        self.dispatch(CollectionAction::Reset {
            operation: Operation::Clear,
        })
    }

    /// Empties the collection and queues a `Delete` envelope.
    ///
    /// # Errors
    ///
    /// Never fails for `Delete`.
    pub fn delete(&self) -> Result<(), CollectionError> {
        self.dispatch(CollectionAction::Reset {
            operation: Operation::Delete,
        })
    }

    /// Emits queued envelopes in order and resolves to how many were delivered.
    ///
    /// Emission is fire-and-forget: a failed envelope is logged and dropped.
    pub fn flush(&self) -> impl Future<Output = usize> + 'static {
        let inner = self.inner.clone();
        async move {
            let mut delivered = 0;
            loop {
                let next = inner.outbox.borrow_mut().pop_front();
                let Some(envelope) = next else {
                    break;
                };
                let channel = &inner.channels.emit_file;
                match emit_json_with(&*inner.bridge, channel, &envelope).await {
                    Ok(()) => delivered += 1,
                    Err(err) => logging::warn!(
                        "dropped `{}` envelope for `{channel}`: {err}",
                        envelope.operation.as_str()
                    ),
                }
            }
            delivered
        }
    }

    /// Merges one `listen-file` payload, replacing the record under its path.
    ///
    /// # Errors
    ///
    /// Returns the parse or validation failure; the collection is left untouched.
    pub fn apply_push_payload(&self, payload: Value) -> Result<(), PushPayloadError> {
        let record = parse_push_record(payload)?;
        if let Some(previous) = self.inner.files.borrow().get(record.key()) {
            if previous.status().is_terminal() && !record.status().is_terminal() {
                logging::log!(
                    "host moved `{}` from {:?} back to {:?}",
                    record.key(),
                    previous.status(),
                    record.status()
                );
            }
        }
        self.dispatch(CollectionAction::MergePush(record))?;
        Ok(())
    }

    /// Applies a reset-channel payload and returns the signalled operation.
    ///
    /// # Errors
    ///
    /// Returns [`PushPayloadError::NotResetSignal`] for any tag other than `Clear`/`Delete`.
    pub fn apply_reset_payload(&self, payload: Value) -> Result<Operation, PushPayloadError> {
        let operation = parse_reset_signal(payload)?;
        self.dispatch(CollectionAction::HostReset { operation })?;
        Ok(operation)
    }

    /// Subscribes to the record and reset channels.
    ///
    /// Malformed payloads are logged and dropped; a channel that fails to register is logged and
    /// skipped. Handlers hold only a weak reference to the reconciler.
    pub fn listen(&self) -> impl Future<Output = SubscriptionGuard> + 'static {
        let channels = &self.inner.channels;
        let mut registrations = vec![(
            channels.listen_file.clone(),
            self.push_handler(channels.listen_file.clone(), |reconciler, payload| {
                reconciler.apply_push_payload(payload)
            }),
        )];
        for channel in channels.reset_channels() {
            registrations.push((
                channel.to_string(),
                self.push_handler(channel.to_string(), |reconciler, payload| {
                    reconciler.apply_reset_payload(payload).map(|_| ())
                }),
            ));
        }

        let bridge = self.inner.bridge.clone();
        async move {
            let mut guard = SubscriptionGuard::default();
            for (channel, handler) in registrations {
                match bridge.listen(&channel, handler).await {
                    Ok(handle) => guard.handles.push(handle),
                    Err(failure) => logging::warn!(
                        "failed to listen on `{channel}`: {}",
                        normalize_failure(failure)
                    ),
                }
            }
            guard
        }
    }

    /// Like [`Self::listen`], but keeps the subscription only while `scope` is active.
    ///
    /// The returned future performs the registration; the handle is valid immediately.
    pub fn listen_scoped(
        &self,
        scope: ActivationScope,
    ) -> (ScopedSubscription, impl Future<Output = ()> + 'static) {
        let subscription = ScopedSubscription {
            scope,
            slot: Rc::new(RefCell::new(None)),
        };
        let registration = self.listen();
        let pending = subscription.clone();
        let task = async move {
            let guard = registration.await;
            if pending.scope.is_active() {
                *pending.slot.borrow_mut() = Some(guard);
            }
        };
        (subscription, task)
    }

    /// Registers a change observer that receives a snapshot after every effective change.
    pub fn on_change(&self, observer: impl Fn(&FileCollection) + 'static) -> ListenerHandle {
        let id = self.inner.next_observer.get();
        self.inner.next_observer.set(id + 1);
        self.inner
            .observers
            .borrow_mut()
            .insert(id, Rc::new(observer));
        let registry = Rc::downgrade(&self.inner);
        ListenerHandle::new(move || {
            if let Some(inner) = registry.upgrade() {
                inner.observers.borrow_mut().remove(&id);
            }
        })
    }

    fn push_handler(
        &self,
        channel: String,
        apply: fn(&FileReconciler, Value) -> Result<(), PushPayloadError>,
    ) -> PushHandler {
        let weak: Weak<ReconcilerInner> = Rc::downgrade(&self.inner);
        Rc::new(move |payload| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if let Err(err) = apply(&FileReconciler { inner }, payload) {
                logging::warn!("dropped `{channel}` payload: {err}");
            }
        })
    }

    fn notify_observers(&self) {
        let observers: Vec<Observer> = self.inner.observers.borrow().values().cloned().collect();
        if observers.is_empty() {
            return;
        }
        let snapshot = self.snapshot();
        for observer in observers {
            observer(&snapshot);
        }
    }
}

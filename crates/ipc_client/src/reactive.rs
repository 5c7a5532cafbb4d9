//! Leptos bindings: host requests, mutations, and the file collection as signals tied to the
//! owning component's lifetime.
//!
//! Every binding registers an [`on_cleanup`] that deactivates its [`ActivationScope`]; results
//! that settle after unmount are discarded instead of written into disposed signals.

use std::rc::Rc;

use ipc_contract::{CompressOptions, HostBridge};
use leptos::*;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::{
    collection::FileCollection,
    lifecycle::ActivationScope,
    reconciler::FileReconciler,
    request::{HostRequest, Mutation, MutationPolicy, RequestState},
};

fn component_scope() -> ActivationScope {
    let scope = ActivationScope::new();
    on_cleanup({
        let scope = scope.clone();
        move || scope.deactivate()
    });
    scope
}

/// Issues `command` once when the calling component mounts.
pub fn use_host_request<T>(
    bridge: Rc<dyn HostBridge>,
    command: impl Into<String>,
    args: Value,
) -> ReadSignal<RequestState<T>>
where
    T: DeserializeOwned + Clone + 'static,
{
    let scope = component_scope();
    let request = HostRequest::new(bridge, command, args).with_scope(scope.clone());
    let state = create_rw_signal(RequestState::default());

    let activation = request.activate();
    spawn_local(async move {
        activation.await;
        if scope.is_active() {
            state.set(request.state());
        }
    });

    state.read_only()
}

/// Reactive mutation slot plus its trigger.
pub struct MutationHandle<A: 'static, T: 'static> {
    /// Shared `{ response, error }` slot.
    pub state: ReadSignal<RequestState<T>>,
    /// Issues one invocation with fresh arguments.
    pub mutate: Callback<A>,
}

impl<A: 'static, T: 'static> Clone for MutationHandle<A, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<A: 'static, T: 'static> Copy for MutationHandle<A, T> {}

/// Creates a mutation for `command` whose slot updates as invocations settle.
pub fn use_mutation<A, T>(
    bridge: Rc<dyn HostBridge>,
    command: impl Into<String>,
    policy: MutationPolicy,
) -> MutationHandle<A, T>
where
    A: Serialize + 'static,
    T: DeserializeOwned + Clone + 'static,
{
    let scope = component_scope();
    let mutation = Mutation::<T>::new(bridge, command)
        .with_policy(policy)
        .with_scope(scope.clone());
    let state = create_rw_signal(RequestState::default());

    let mutate = Callback::new(move |args: A| {
        let invocation = mutation.mutate(&args);
        let mutation = mutation.clone();
        let scope = scope.clone();
        spawn_local(async move {
            let _ = invocation.await;
            if scope.is_active() {
                state.set(mutation.state());
            }
        });
    });

    MutationHandle {
        state: state.read_only(),
        mutate,
    }
}

/// Reactive view of a [`FileReconciler`] with triggers that flush to the host.
#[derive(Clone)]
pub struct FileCollectionHandle {
    /// Latest collection snapshot.
    pub files: ReadSignal<FileCollection>,
    reconciler: FileReconciler,
}

impl FileCollectionHandle {
    /// Returns the underlying reconciler.
    pub fn reconciler(&self) -> &FileReconciler {
        &self.reconciler
    }

    /// Tracks picked paths and notifies the host.
    pub fn create(&self, paths: Vec<String>) {
        if self.reconciler.create(paths).is_ok() {
            self.spawn_flush();
        }
    }

    /// Requests compression of the whole collection.
    pub fn compress(&self, options: Option<CompressOptions>) {
        if self.reconciler.compress(options).is_ok() {
            self.spawn_flush();
        }
    }

    /// Requests re-evaluation of the whole collection with new options.
    pub fn update(&self, options: Option<CompressOptions>) {
        if self.reconciler.update(options).is_ok() {
            self.spawn_flush();
        }
    }

    /// Clears the collection locally and on the host.
    pub fn clear(&self) {
        if self.reconciler.clear().is_ok() {
            self.spawn_flush();
        }
    }

    /// Deletes every tracked file locally and on the host.
    pub fn delete(&self) {
        if self.reconciler.delete().is_ok() {
            self.spawn_flush();
        }
    }

    fn spawn_flush(&self) {
        let flush = self.reconciler.flush();
        spawn_local(async move {
            flush.await;
        });
    }
}

/// Mirrors `reconciler` into a signal and holds its push subscription while mounted.
///
/// The subscription is released on cleanup, including when the component unmounts before the
/// listeners finished registering.
pub fn use_file_collection(reconciler: FileReconciler) -> FileCollectionHandle {
    let files = create_rw_signal(reconciler.snapshot());
    let observer = reconciler.on_change(move |snapshot| files.set(snapshot.clone()));
    let (subscription, registration) = reconciler.listen_scoped(component_scope());
    spawn_local(registration);

    on_cleanup(move || {
        drop(observer);
        subscription.release();
    });

    FileCollectionHandle {
        files: files.read_only(),
        reconciler,
    }
}

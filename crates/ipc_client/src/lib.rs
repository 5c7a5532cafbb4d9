//! Client-side IPC layer for the batch compression tool.
//!
//! The crate sits between the presentation layer and an [`ipc_contract::HostBridge`]:
//!
//! - [`request`] issues single host calls (load-on-activation and mutation) and keeps their
//!   settled `{ response, error }` slot.
//! - [`query`] adds a keyed, shared cache with manual mode and success callbacks.
//! - [`collection`] is the pure reducer over the keyed file collection, and [`reconciler`] owns
//!   that collection, merges push events into it, and forwards outbound envelopes to the host.
//! - [`selection`] and [`tuning`] compose the above into the picker flow and quality bounds.
//! - [`reactive`] adapts everything to Leptos signals and component lifetimes.
//! - [`services`] bundles one instance of each over a transport and a [`ClientConfig`].

#![warn(missing_docs, rustdoc::broken_intra_doc_links)]

pub mod collection;
pub mod config;
pub mod lifecycle;
pub mod query;
pub mod reactive;
pub mod reconciler;
pub mod request;
pub mod selection;
pub mod services;
pub mod tuning;

pub use collection::{
    reduce_collection, CollectionAction, CollectionEffect, CollectionError, FileCollection,
};
pub use config::{ClientConfig, ConfigError, PickerConfig};
pub use lifecycle::ActivationScope;
pub use query::{Query, QueryClient, QueryFetcher, QueryKey, QueryOptions};
pub use reactive::{
    use_file_collection, use_host_request, use_mutation, FileCollectionHandle, MutationHandle,
};
pub use reconciler::{
    parse_push_record, parse_reset_signal, FileReconciler, PushPayloadError, ScopedSubscription,
    SubscriptionGuard,
};
pub use request::{HostRequest, InvocationId, Mutation, MutationPolicy, RequestState};
pub use selection::{FileSelection, OPEN_DIALOG_QUERY};
pub use services::ClientServices;
pub use tuning::CompressTuning;

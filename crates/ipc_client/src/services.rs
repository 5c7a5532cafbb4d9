//! Service bundle assembled once per client from a transport and a configuration.

use std::rc::Rc;

use ipc_contract::HostBridge;

use crate::{
    config::ClientConfig,
    query::QueryClient,
    reconciler::FileReconciler,
    request::Mutation,
    selection::FileSelection,
    tuning::CompressTuning,
};

/// Shared client services injected by the entry layer.
#[derive(Clone)]
pub struct ClientServices {
    /// Host transport.
    pub bridge: Rc<dyn HostBridge>,
    /// Effective configuration.
    pub config: ClientConfig,
    /// Shared query cache.
    pub queries: QueryClient,
    /// Owner of the file collection.
    pub files: FileReconciler,
    /// Picker flow feeding `files`.
    pub selection: FileSelection,
    /// Per-format compression bounds.
    pub tuning: CompressTuning,
}

impl ClientServices {
    /// Wires every service over `bridge`.
    pub fn new(bridge: Rc<dyn HostBridge>, config: ClientConfig) -> Self {
        let queries = QueryClient::new(bridge.clone());
        let files = FileReconciler::new(bridge.clone(), config.channels.clone());
        let selection = FileSelection::new(&queries, files.clone(), &config);
        let tuning = CompressTuning::new(bridge.clone(), &config.commands);
        Self {
            bridge,
            config,
            queries,
            files,
            selection,
            tuning,
        }
    }

    /// Creates a mutation for `command` using the configured [`crate::MutationPolicy`].
    pub fn mutation<T>(&self, command: impl Into<String>) -> Mutation<T>
    where
        T: serde::de::DeserializeOwned + Clone + 'static,
    {
        Mutation::new(self.bridge.clone(), command).with_policy(self.config.mutation_policy)
    }
}

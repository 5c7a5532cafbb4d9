//! Dialog-backed file selection feeding the reconciler's `Create` step.

use std::{future::Future, rc::Rc};

use ipc_contract::{
    normalize_failure, readable_extensions, DialogFilter, DialogOptions, DialogPick, HostBridge,
    HostBridgeFuture, HostError, SupportedExtension,
};
use leptos::logging;
use serde_json::Value;

use crate::{
    config::{ClientConfig, PickerConfig},
    query::{Query, QueryClient, QueryFetcher, QueryKey, QueryOptions},
    reconciler::FileReconciler,
    request::RequestState,
};

/// Cache key of the picker query.
pub const OPEN_DIALOG_QUERY: &str = "open_dialog";

/// Native picker filtered by host-readable formats.
///
/// The picker is a manual query: it never opens on activation, only on [`FileSelection::open`].
/// Paths it resolves become `Initialized` records through the success callback.
#[derive(Clone)]
pub struct FileSelection {
    extensions: Query<Vec<SupportedExtension>>,
    picker: Query<Option<DialogPick>>,
    reconciler: FileReconciler,
}

impl FileSelection {
    /// Wires the supported-extension query and the picker query to `reconciler`.
    pub fn new(client: &QueryClient, reconciler: FileReconciler, config: &ClientConfig) -> Self {
        let extensions: Query<Vec<SupportedExtension>> = client.query(
            QueryKey::command(config.commands.supported_extensions.clone()),
            QueryOptions::default(),
        );

        let fetcher: QueryFetcher = {
            let extensions = extensions.clone();
            let picker = config.picker.clone();
            Rc::new(
                move |bridge: Rc<dyn HostBridge>| -> HostBridgeFuture<'static, Result<Value, HostError>> {
                    let options = dialog_options(&picker, &extensions.state());
                    Box::pin(async move {
                        bridge.open_dialog(options).await.map_err(normalize_failure)
                    })
                },
            )
        };
        let on_pick = {
            let reconciler = reconciler.clone();
            move |pick: &Option<DialogPick>| {
                if let Some(pick) = pick.clone() {
                    if let Err(err) = reconciler.create(pick.into_paths()) {
                        logging::warn!("picked files were not tracked: {err}");
                    }
                }
            }
        };
        let picker = client.query_with(
            QueryKey::command(OPEN_DIALOG_QUERY),
            QueryOptions::manual().on_success(on_pick),
            fetcher,
        );

        Self {
            extensions,
            picker,
            reconciler,
        }
    }

    /// Loads the supported-extension list.
    pub fn load_filters(&self) -> impl Future<Output = ()> + 'static {
        let activation = self.extensions.activate();
        async move {
            let _ = activation.await;
        }
    }

    /// Returns the supported-extension slot.
    pub fn extensions_state(&self) -> RequestState<Vec<SupportedExtension>> {
        self.extensions.state()
    }

    /// Returns the picker slot.
    pub fn picker_state(&self) -> RequestState<Option<DialogPick>> {
        self.picker.state()
    }

    /// Opens the picker, tracks the chosen paths, and flushes the `Create` envelope.
    ///
    /// Resolves to the picked paths; an empty list means the dialog was cancelled.
    pub fn open(&self) -> impl Future<Output = Result<Vec<String>, HostError>> + 'static {
        let pick = self.picker.refetch();
        let reconciler = self.reconciler.clone();
        async move {
            let paths = pick.await?.map(DialogPick::into_paths).unwrap_or_default();
            reconciler.flush().await;
            Ok::<_, HostError>(paths)
        }
    }
}

/// Builds picker options; without a loaded format list the dialog is unfiltered.
fn dialog_options(
    picker: &PickerConfig,
    formats: &RequestState<Vec<SupportedExtension>>,
) -> DialogOptions {
    let readable = formats
        .response
        .as_deref()
        .map(readable_extensions)
        .unwrap_or_default();
    let filters = if readable.is_empty() {
        Vec::new()
    } else {
        vec![DialogFilter {
            name: picker.filter_name.clone(),
            extensions: readable,
        }]
    };
    DialogOptions {
        multiple: picker.multiple,
        filters,
    }
}

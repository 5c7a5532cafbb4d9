//! Reducer actions, host-notification effects, and transition logic for the file collection.

use std::collections::BTreeMap;

use ipc_contract::{CompressOptions, FileRecord, Operation, OperationEnvelope};
use thiserror::Error;

/// Keyed file collection, ordered by absolute input path.
pub type FileCollection = BTreeMap<String, FileRecord>;

#[derive(Debug, Clone, PartialEq)]
/// Actions accepted by [`reduce_collection`].
pub enum CollectionAction {
    /// Track freshly picked paths as `Initialized` records.
    Create {
        /// Paths returned by the picker.
        paths: Vec<String>,
    },
    /// Ask the host to compress the current collection.
    Compress {
        /// Compression tuning, if any.
        options: Option<CompressOptions>,
    },
    /// Ask the host to re-evaluate the current collection.
    Update {
        /// Compression tuning, if any.
        options: Option<CompressOptions>,
    },
    /// Reset the collection locally and tell the host.
    Reset {
        /// `Clear` or `Delete`.
        operation: Operation,
    },
    /// Replace one record with a host-pushed snapshot.
    MergePush(FileRecord),
    /// Reset the collection because the host signalled it.
    HostReset {
        /// `Clear` or `Delete`.
        operation: Operation,
    },
}

#[derive(Debug, Clone, PartialEq)]
/// Side-effect intents emitted by [`reduce_collection`].
pub enum CollectionEffect {
    /// Send an envelope on the outbound push channel.
    NotifyHost(OperationEnvelope),
    /// The collection contents changed; observers need a new snapshot.
    Changed,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
/// Reducer errors for actions that cannot apply to the current collection.
pub enum CollectionError {
    /// A processing trigger was requested with nothing tracked.
    #[error("`{}` requires at least one tracked file", .0.as_str())]
    EmptyCollection(Operation),
    /// A reset was requested with a non-reset operation tag.
    #[error("`{}` is not a reset operation", .0.as_str())]
    NotReset(Operation),
}

/// Applies a [`CollectionAction`] to the collection and collects host notifications.
///
/// Only `Create` adds records and only push merges change existing ones; resets empty the whole
/// mapping.
///
/// # Errors
///
/// Returns [`CollectionError::EmptyCollection`] for a processing trigger on an empty collection
/// and [`CollectionError::NotReset`] when a reset carries a non-reset tag.
pub fn reduce_collection(
    files: &mut FileCollection,
    action: CollectionAction,
) -> Result<Vec<CollectionEffect>, CollectionError> {
    let mut effects = Vec::new();
    match action {
        CollectionAction::Create { paths } => {
            let mut created = FileCollection::new();
            for path in paths {
                if path.trim().is_empty() || files.contains_key(&path) || created.contains_key(&path)
                {
                    continue;
                }
                created.insert(path.clone(), FileRecord::initialized(path));
            }
            if !created.is_empty() {
                files.extend(created.clone());
                effects.push(CollectionEffect::NotifyHost(OperationEnvelope::with_files(
                    Operation::Create,
                    created,
                )));
                effects.push(CollectionEffect::Changed);
            }
        }
        CollectionAction::Compress { options } => {
            effects.push(snapshot_envelope(files, Operation::Compress, options)?);
        }
        CollectionAction::Update { options } => {
            effects.push(snapshot_envelope(files, Operation::Update, options)?);
        }
        CollectionAction::Reset { operation } => {
            ensure_reset(operation)?;
            effects.push(CollectionEffect::NotifyHost(OperationEnvelope::bare(
                operation,
            )));
            effects.extend(clear_collection(files));
        }
        CollectionAction::MergePush(record) => {
            if files.get(record.key()) != Some(&record) {
                files.insert(record.key().to_string(), record);
                effects.push(CollectionEffect::Changed);
            }
        }
        CollectionAction::HostReset { operation } => {
            ensure_reset(operation)?;
            effects.extend(clear_collection(files));
        }
    }
    Ok(effects)
}

fn snapshot_envelope(
    files: &FileCollection,
    operation: Operation,
    options: Option<CompressOptions>,
) -> Result<CollectionEffect, CollectionError> {
    if files.is_empty() {
        return Err(CollectionError::EmptyCollection(operation));
    }
    Ok(CollectionEffect::NotifyHost(
        OperationEnvelope::with_files(operation, files.clone()).with_options(options),
    ))
}

fn clear_collection(files: &mut FileCollection) -> Option<CollectionEffect> {
    if files.is_empty() {
        return None;
    }
    files.clear();
    Some(CollectionEffect::Changed)
}

fn ensure_reset(operation: Operation) -> Result<(), CollectionError> {
    if operation.is_reset() {
        Ok(())
    } else {
        Err(CollectionError::NotReset(operation))
    }
}

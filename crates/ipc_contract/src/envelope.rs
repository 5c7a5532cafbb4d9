//! Outbound operation envelope: the only message shape the client sends over the push channel.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::record::FileRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Operation tag interpreted by the host.
pub enum Operation {
    /// Newly picked files were added locally.
    Create,
    /// Re-evaluate the current collection.
    Update,
    /// Compress every record the host considers eligible.
    Compress,
    /// Drop all tracked files.
    Delete,
    /// Clear the current collection.
    Clear,
}

impl Operation {
    /// Returns whether this operation empties the collection.
    pub const fn is_reset(self) -> bool {
        matches!(self, Self::Delete | Self::Clear)
    }

    /// Returns the wire tag.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "Create",
            Self::Update => "Update",
            Self::Compress => "Compress",
            Self::Delete => "Delete",
            Self::Clear => "Clear",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Compression tuning parameters.
pub struct CompressOptions {
    /// Encoder quality; the host applies a per-format default when absent.
    pub quality: Option<f32>,
    /// Target extension.
    pub extension: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Message sent to the host describing a requested operation and its target files.
pub struct OperationEnvelope {
    /// Target records keyed by path, or `None` for operations that carry no files.
    pub files: Option<BTreeMap<String, FileRecord>>,
    /// Operation tag.
    pub operation: Operation,
    /// Compression parameters when tuning applies.
    pub options: Option<CompressOptions>,
}

impl OperationEnvelope {
    /// Builds an envelope targeting `files`.
    pub fn with_files(operation: Operation, files: BTreeMap<String, FileRecord>) -> Self {
        Self {
            files: Some(files),
            operation,
            options: None,
        }
    }

    /// Builds a file-less envelope (used for resets).
    pub fn bare(operation: Operation) -> Self {
        Self {
            files: None,
            operation,
            options: None,
        }
    }

    /// Attaches compression options.
    pub fn with_options(mut self, options: Option<CompressOptions>) -> Self {
        self.options = options;
        self
    }

    /// Returns the number of targeted files.
    pub fn file_count(&self) -> usize {
        self.files.as_ref().map_or(0, BTreeMap::len)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn create_envelope_serializes_with_pascal_case_tag() {
        let mut files = BTreeMap::new();
        files.insert("/a.png".to_string(), FileRecord::initialized("/a.png"));
        let envelope = OperationEnvelope::with_files(Operation::Create, files);

        let value = serde_json::to_value(&envelope).expect("serialize");
        assert_eq!(value["operation"], json!("Create"));
        assert_eq!(value["options"], json!(null));
        assert_eq!(value["files"]["/a.png"]["status"], json!("Initialized"));
        assert_eq!(envelope.file_count(), 1);
    }

    #[test]
    fn bare_reset_envelope_has_no_files() {
        let envelope = OperationEnvelope::bare(Operation::Clear);
        assert!(envelope.operation.is_reset());
        assert_eq!(envelope.file_count(), 0);
        assert_eq!(
            serde_json::to_value(&envelope).expect("serialize"),
            json!({"files": null, "operation": "Clear", "options": null})
        );
    }
}

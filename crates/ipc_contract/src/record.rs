//! File-processing records exchanged with the host and tracked by the client collection.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Processing status tag carried on the wire.
pub enum FileStatus {
    /// Path accepted locally, not yet processed.
    Initialized,
    /// Host has started processing.
    Pending,
    /// Processing completed and produced an output artifact.
    Success,
    /// Processing failed for this file.
    Failed,
    /// The host cannot process this file type.
    Unsupported,
}

impl FileStatus {
    /// Returns whether no further processing is expected for this status.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Unsupported)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Input-side metadata for a tracked file.
pub struct FileMeta {
    /// Absolute file path; also the record identity.
    pub path: String,
    /// Size in bytes (zero until the host reports it).
    pub size: u64,
    /// File extension without the leading dot (empty until the host reports it).
    pub extension: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Output artifact produced by the host.
pub struct FileOutput {
    /// Absolute path of the produced file.
    pub path: String,
    /// Size of the produced file in bytes.
    pub size: u64,
    /// Extension of the produced file.
    pub extension: String,
    /// Processing duration in milliseconds.
    pub elapsed: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Validated processing state; output presence is encoded per variant.
pub enum FileState {
    /// Created locally; no output.
    Initialized,
    /// Host is processing; no output.
    Pending,
    /// Completed with a mandatory output artifact.
    Success {
        /// Produced artifact.
        output: FileOutput,
    },
    /// Failed; the host may still report a partial artifact.
    Failed {
        /// Partial artifact when one was produced.
        output: Option<FileOutput>,
    },
    /// Unsupported; the host may still report an artifact.
    Unsupported {
        /// Artifact when one was produced.
        output: Option<FileOutput>,
    },
}

impl FileState {
    /// Returns the wire status tag.
    pub const fn status(&self) -> FileStatus {
        match self {
            Self::Initialized => FileStatus::Initialized,
            Self::Pending => FileStatus::Pending,
            Self::Success { .. } => FileStatus::Success,
            Self::Failed { .. } => FileStatus::Failed,
            Self::Unsupported { .. } => FileStatus::Unsupported,
        }
    }

    /// Returns the output artifact, if any.
    pub fn output(&self) -> Option<&FileOutput> {
        match self {
            Self::Initialized | Self::Pending => None,
            Self::Success { output } => Some(output),
            Self::Failed { output } | Self::Unsupported { output } => output.as_ref(),
        }
    }
}

/// Reasons a wire record fails schema validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordSchemaError {
    /// The record key is empty.
    #[error("record input path is empty")]
    EmptyPath,
    /// A `Success` record arrived without its output artifact.
    #[error("`Success` record for `{path}` has no output")]
    MissingOutput {
        /// Offending record path.
        path: String,
    },
    /// An `Initialized`/`Pending` record arrived with an output artifact.
    #[error("`{status:?}` record for `{path}` must not carry output")]
    UnexpectedOutput {
        /// Offending record path.
        path: String,
        /// Offending status.
        status: FileStatus,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Untrusted record shape as emitted by the host (`output` nullable regardless of status).
pub struct WireFileRecord {
    /// Status tag.
    pub status: FileStatus,
    /// Input metadata.
    pub input: FileMeta,
    /// Output artifact or `null`.
    #[serde(default)]
    pub output: Option<FileOutput>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireFileRecord", into = "WireFileRecord")]
/// One tracked file keyed by its absolute input path.
pub struct FileRecord {
    /// Input metadata; `input.path` is the collection key.
    pub input: FileMeta,
    /// Validated processing state.
    pub state: FileState,
}

impl FileRecord {
    /// Creates the optimistic local record for a freshly picked path with zero-valued metrics.
    pub fn initialized(path: impl Into<String>) -> Self {
        Self {
            input: FileMeta {
                path: path.into(),
                ..FileMeta::default()
            },
            state: FileState::Initialized,
        }
    }

    /// Returns the collection key.
    pub fn key(&self) -> &str {
        &self.input.path
    }

    /// Returns the wire status tag.
    pub fn status(&self) -> FileStatus {
        self.state.status()
    }

    /// Returns the output artifact, if any.
    pub fn output(&self) -> Option<&FileOutput> {
        self.state.output()
    }
}

impl TryFrom<WireFileRecord> for FileRecord {
    type Error = RecordSchemaError;

    fn try_from(wire: WireFileRecord) -> Result<Self, Self::Error> {
        if wire.input.path.trim().is_empty() {
            return Err(RecordSchemaError::EmptyPath);
        }
        let state = match (wire.status, wire.output) {
            (FileStatus::Initialized, None) => FileState::Initialized,
            (FileStatus::Pending, None) => FileState::Pending,
            (status @ (FileStatus::Initialized | FileStatus::Pending), Some(_)) => {
                return Err(RecordSchemaError::UnexpectedOutput {
                    path: wire.input.path,
                    status,
                });
            }
            (FileStatus::Success, Some(output)) => FileState::Success { output },
            (FileStatus::Success, None) => {
                return Err(RecordSchemaError::MissingOutput {
                    path: wire.input.path,
                });
            }
            (FileStatus::Failed, output) => FileState::Failed { output },
            (FileStatus::Unsupported, output) => FileState::Unsupported { output },
        };
        Ok(Self {
            input: wire.input,
            state,
        })
    }
}

impl From<FileRecord> for WireFileRecord {
    fn from(record: FileRecord) -> Self {
        let status = record.state.status();
        let output = match record.state {
            FileState::Initialized | FileState::Pending => None,
            FileState::Success { output } => Some(output),
            FileState::Failed { output } | FileState::Unsupported { output } => output,
        };
        Self {
            status,
            input: record.input,
            output,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn initialized_record_has_zero_valued_metrics() {
        let record = FileRecord::initialized("/a.png");
        assert_eq!(record.key(), "/a.png");
        assert_eq!(record.status(), FileStatus::Initialized);
        assert_eq!(record.input.size, 0);
        assert!(record.input.extension.is_empty());
        assert_eq!(record.output(), None);
    }

    #[test]
    fn success_record_parses_from_host_json() {
        let record: FileRecord = serde_json::from_value(json!({
            "status": "Success",
            "input": {"path": "/a.png", "size": 400, "extension": "png"},
            "output": {"path": "/a.webp", "size": 120, "extension": "webp", "elapsed": 35}
        }))
        .expect("valid record");
        assert_eq!(record.status(), FileStatus::Success);
        assert_eq!(record.output().map(|out| out.size), Some(120));
    }

    #[test]
    fn success_without_output_is_rejected() {
        let err = serde_json::from_value::<FileRecord>(json!({
            "status": "Success",
            "input": {"path": "/a.png", "size": 400, "extension": "png"},
            "output": null
        }))
        .expect_err("success requires output");
        assert!(err.to_string().contains("has no output"), "unexpected: {err}");
    }

    #[test]
    fn pending_with_output_is_rejected() {
        let wire = WireFileRecord {
            status: FileStatus::Pending,
            input: FileMeta {
                path: "/a.png".to_string(),
                size: 1,
                extension: "png".to_string(),
            },
            output: Some(FileOutput {
                path: "/a.webp".to_string(),
                size: 1,
                extension: "webp".to_string(),
                elapsed: 1,
            }),
        };
        assert_eq!(
            FileRecord::try_from(wire),
            Err(RecordSchemaError::UnexpectedOutput {
                path: "/a.png".to_string(),
                status: FileStatus::Pending,
            })
        );
    }

    #[test]
    fn failed_record_may_omit_output_field() {
        let record: FileRecord = serde_json::from_value(json!({
            "status": "Failed",
            "input": {"path": "/b.jpg", "size": 10, "extension": "jpg"}
        }))
        .expect("failed without output");
        assert_eq!(record.state, FileState::Failed { output: None });
        assert!(record.status().is_terminal());
    }

    #[test]
    fn empty_path_is_rejected() {
        let err = serde_json::from_value::<FileRecord>(json!({
            "status": "Pending",
            "input": {"path": "  ", "size": 0, "extension": ""},
            "output": null
        }))
        .expect_err("empty path");
        assert!(err.to_string().contains("path is empty"), "unexpected: {err}");
    }

    #[test]
    fn records_serialize_back_to_wire_shape() {
        let value = serde_json::to_value(FileRecord::initialized("/c.gif")).expect("serialize");
        assert_eq!(
            value,
            json!({
                "status": "Initialized",
                "input": {"path": "/c.gif", "size": 0, "extension": ""},
                "output": null
            })
        );
    }
}

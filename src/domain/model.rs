use crate::utils::error::{Result, TransferError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Read-side or write-side designation of a storage handle within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Read,
    Write,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Read => "read",
            Role::Write => "write",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage backend family, resolved once from the configured type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BackendKind {
    Sftp,
    ObjectStore,
    Folder,
    KeyValue,
}

/// Type-name suffixes in match precedence order.
const KIND_SUFFIXES: [(&str, BackendKind); 4] = [
    ("SftpStorage", BackendKind::Sftp),
    ("S3Storage", BackendKind::ObjectStore),
    ("FolderStorage", BackendKind::Folder),
    ("RedisStorage", BackendKind::KeyValue),
];

impl BackendKind {
    /// Resolves a configured type name such as `datatransfer.storage.SftpStorage`.
    /// The first suffix that matches, in the fixed order above, wins.
    pub fn from_type_name(name: &str) -> Result<Self> {
        let trimmed = name.trim();
        KIND_SUFFIXES
            .iter()
            .find(|(suffix, _)| trimmed.ends_with(suffix))
            .map(|(_, kind)| *kind)
            .ok_or_else(|| TransferError::InvalidConfigValueError {
                field: "storage type".to_string(),
                value: name.to_string(),
                reason: format!(
                    "Unknown storage type. Expected a name ending in one of: {}",
                    KIND_SUFFIXES
                        .iter()
                        .map(|(suffix, _)| *suffix)
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            })
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            BackendKind::Sftp => "SftpStorage",
            BackendKind::ObjectStore => "S3Storage",
            BackendKind::Folder => "FolderStorage",
            BackendKind::KeyValue => "RedisStorage",
        }
    }

    /// Whether the post-write `move_files` step means anything for this backend.
    pub fn supports_archival(&self) -> bool {
        !matches!(self, BackendKind::ObjectStore | BackendKind::KeyValue)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

impl TryFrom<String> for BackendKind {
    type Error = TransferError;

    fn try_from(value: String) -> Result<Self> {
        Self::from_type_name(&value)
    }
}

impl From<BackendKind> for String {
    fn from(kind: BackendKind) -> Self {
        kind.type_name().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferMode {
    Publish,
    DirectCopy,
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferReport {
    pub mode: TransferMode,
    pub listed: usize,
    pub published: usize,
    pub transferred: usize,
    pub deleted: usize,
    pub archived: usize,
    pub skipped: usize,
}

impl TransferReport {
    pub fn new(mode: TransferMode) -> Self {
        Self {
            mode,
            listed: 0,
            published: 0,
            transferred: 0,
            deleted: 0,
            archived: 0,
            skipped: 0,
        }
    }
}

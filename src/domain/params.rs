use crate::domain::model::BackendKind;

pub const DEFAULT_SFTP_PORT: u16 = 22;
pub const DEFAULT_REDIS_PORT: u16 = 6379;
pub const DEFAULT_AMQP_PORT: u16 = 5672;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderParams {
    pub path: String,
    /// Write handles create a missing root; read handles fail instead.
    pub create_missing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SftpParams {
    pub path: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectStoreParams {
    /// Key prefix inside the bucket.
    pub path: String,
    pub bucket: String,
    /// Custom endpoint, e.g. a MinIO URL. `None` means AWS.
    pub host: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub encrypt: bool,
    pub region: String,
    pub use_iam_creds: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValueParams {
    /// Key prefix.
    pub path: String,
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
}

/// Parameter bundle for one storage handle, scoped to a single role.
///
/// Built fresh by the storage factory for every resolution and consumed by
/// the connector; the constructed handle keeps whatever it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageParams {
    Sftp(SftpParams),
    ObjectStore(ObjectStoreParams),
    Folder(FolderParams),
    KeyValue(KeyValueParams),
}

impl StorageParams {
    pub fn kind(&self) -> BackendKind {
        match self {
            StorageParams::Sftp(_) => BackendKind::Sftp,
            StorageParams::ObjectStore(_) => BackendKind::ObjectStore,
            StorageParams::Folder(_) => BackendKind::Folder,
            StorageParams::KeyValue(_) => BackendKind::KeyValue,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            StorageParams::Sftp(p) => &p.path,
            StorageParams::ObjectStore(p) => &p.path,
            StorageParams::Folder(p) => &p.path,
            StorageParams::KeyValue(p) => &p.path,
        }
    }
}

/// Username and password, present together or not at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueCredentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueParams {
    pub host: String,
    pub port: u16,
    pub queue_name: String,
    /// `None` connects anonymously.
    pub credentials: Option<QueueCredentials>,
}

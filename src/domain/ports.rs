use crate::domain::params::{QueueParams, StorageParams};
use crate::utils::error::Result;
use async_trait::async_trait;

/// Operations every storage backend supports.
///
/// Identifiers are opaque names inside the backend's namespace, as returned
/// by `list_dir`.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Identifiers currently present, in the backend's enumeration order.
    async fn list_dir(&self) -> Result<Vec<String>>;

    /// Fails with `NotFound` when the identifier is absent.
    async fn read_file(&self, id: &str) -> Result<Vec<u8>>;

    /// Creates the identifier if it does not exist yet.
    async fn write_file(&self, id: &str, data: &[u8]) -> Result<()>;

    async fn delete_file(&self, id: &str) -> Result<()>;

    /// Post-write archival/rename step. A no-op where it has no meaning.
    async fn move_files(&self) -> Result<()>;

    /// Releases the connection or session. Idempotent.
    async fn exit(&mut self) -> Result<()>;
}

#[async_trait]
pub trait QueuePublisher: Send + Sync {
    /// Announces one available file to downstream consumers.
    async fn publish_event(&self, id: &str) -> Result<()>;

    /// Closes the broker connection. Idempotent.
    async fn close(&mut self) -> Result<()>;
}

/// Turns resolved parameter bundles into live handles.
#[async_trait]
pub trait BackendConnector: Send + Sync {
    async fn open_storage(&self, params: StorageParams) -> Result<Box<dyn Storage>>;

    async fn open_queue(&self, params: QueueParams) -> Result<Box<dyn QueuePublisher>>;
}

// Adapters layer: concrete storage and messaging backends behind the domain ports.

#[cfg(feature = "amqp")]
pub mod amqp;
pub mod folder;
#[cfg(feature = "redis")]
pub mod redis_store;
#[cfg(feature = "s3")]
pub mod s3;
#[cfg(feature = "sftp")]
pub mod sftp;

#[allow(unused_imports)]
use crate::core::factory::backend_unavailable;
#[allow(unused_imports)]
use crate::domain::model::BackendKind;
use crate::domain::params::{QueueParams, StorageParams};
use crate::domain::ports::{BackendConnector, QueuePublisher, Storage};
use crate::utils::error::Result;
use async_trait::async_trait;

pub use folder::FolderStorage;

/// Connects to the real backends compiled into this build.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultConnector;

#[async_trait]
impl BackendConnector for DefaultConnector {
    async fn open_storage(&self, params: StorageParams) -> Result<Box<dyn Storage>> {
        match params {
            StorageParams::Folder(p) if p.create_missing => {
                Ok(Box::new(FolderStorage::open_or_create(p.path).await?))
            }
            StorageParams::Folder(p) => Ok(Box::new(FolderStorage::open(p.path).await?)),

            #[cfg(feature = "s3")]
            StorageParams::ObjectStore(p) => Ok(Box::new(s3::S3Storage::connect(p).await?)),
            #[cfg(not(feature = "s3"))]
            StorageParams::ObjectStore(_) => Err(backend_unavailable(BackendKind::ObjectStore, "s3")),

            #[cfg(feature = "sftp")]
            StorageParams::Sftp(p) => Ok(Box::new(sftp::SftpStorage::connect(p).await?)),
            #[cfg(not(feature = "sftp"))]
            StorageParams::Sftp(_) => Err(backend_unavailable(BackendKind::Sftp, "sftp")),

            #[cfg(feature = "redis")]
            StorageParams::KeyValue(p) => Ok(Box::new(redis_store::RedisStorage::connect(p).await?)),
            #[cfg(not(feature = "redis"))]
            StorageParams::KeyValue(_) => Err(backend_unavailable(BackendKind::KeyValue, "redis")),
        }
    }

    async fn open_queue(&self, params: QueueParams) -> Result<Box<dyn QueuePublisher>> {
        #[cfg(feature = "amqp")]
        {
            Ok(Box::new(amqp::AmqpPublisher::connect(params).await?))
        }
        #[cfg(not(feature = "amqp"))]
        {
            let _ = params;
            Err(crate::utils::error::TransferError::config(
                "Message queue publisher not available (amqp feature not enabled)",
            ))
        }
    }
}

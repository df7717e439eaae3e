use crate::config::TransferConfig;
use crate::core::factory::resolve_storage;
use crate::core::path::normalize_destination;
use crate::core::queue::resolve_queue;
use crate::domain::model::{Role, TransferMode, TransferReport};
use crate::domain::ports::{BackendConnector, Storage};
use crate::utils::error::Result;

/// Runs one transfer: setup, mode selection, publish or direct copy, teardown.
pub struct TransferEngine<'a, C: BackendConnector + ?Sized> {
    config: &'a TransferConfig,
    connector: &'a C,
}

impl<'a, C: BackendConnector + ?Sized> TransferEngine<'a, C> {
    pub fn new(config: &'a TransferConfig, connector: &'a C) -> Self {
        Self { config, connector }
    }

    pub async fn run(&self) -> Result<TransferReport> {
        let transfer = &self.config.transfer;
        tracing::info!("Started processing files");
        tracing::debug!("Read path: {}", transfer.source_path);
        tracing::debug!("Write path: {}", transfer.dest_path);

        let (mut read_storage, mut write_storage) = match self.setup().await {
            Ok(handles) => handles,
            Err(e) => {
                tracing::error!(error = %e, "Error with storage setup: {:?}", e);
                return Err(e);
            }
        };

        let outcome = if transfer.publish_to_queue {
            tracing::info!("Publish to message queue: true");
            self.publish(&*read_storage).await
        } else {
            self.direct_copy(&*read_storage, &*write_storage).await
        };

        release(Role::Read, &mut *read_storage).await;
        release(Role::Write, &mut *write_storage).await;

        if let Ok(report) = &outcome {
            tracing::info!(
                mode = ?report.mode,
                listed = report.listed,
                published = report.published,
                transferred = report.transferred,
                deleted = report.deleted,
                archived = report.archived,
                skipped = report.skipped,
                "Finished processing files"
            );
        }
        outcome
    }

    async fn setup(&self) -> Result<(Box<dyn Storage>, Box<dyn Storage>)> {
        let transfer = &self.config.transfer;
        let dest = normalize_destination(&transfer.dest_path, self.config.write.kind);

        let read_storage =
            resolve_storage(self.config, Role::Read, &transfer.source_path, self.connector).await?;
        let write_storage = resolve_storage(self.config, Role::Write, &dest, self.connector).await?;

        Ok((read_storage, write_storage))
    }

    async fn publish(&self, read_storage: &dyn Storage) -> Result<TransferReport> {
        let mut report = TransferReport::new(TransferMode::Publish);
        let mut publisher = resolve_queue(self.config, self.connector).await.map_err(|e| {
            tracing::error!(error = %e, "Error with message queue setup: {:?}", e);
            e
        })?;

        let files = list_files(read_storage).await?;
        report.listed = files.len();

        let mut outcome = Ok(());
        for file_name in &files {
            if let Err(e) = publisher.publish_event(file_name).await {
                tracing::error!(file = %file_name, error = %e, "Error publishing file event: {:?}", e);
                outcome = Err(e);
                break;
            }
            tracing::debug!(file = %file_name, "Published file event");
            report.published += 1;
        }

        if let Err(e) = publisher.close().await {
            tracing::warn!(error = %e, "Failed to close message queue connection");
        }
        outcome.map(|_| report)
    }

    async fn direct_copy(
        &self,
        read_storage: &dyn Storage,
        write_storage: &dyn Storage,
    ) -> Result<TransferReport> {
        let transfer = &self.config.transfer;
        let archive = self.config.write.kind.supports_archival();
        let mut report = TransferReport::new(TransferMode::DirectCopy);

        let files = list_batch(read_storage, transfer.max_files_batch).await?;
        report.listed = files.len();
        tracing::debug!("List directory successful, {} file(s) in batch", files.len());

        for file_name in &files {
            tracing::debug!("Process file {:?}", file_name);
            if file_name.is_empty() {
                report.skipped += 1;
                continue;
            }

            if let Err(e) = self
                .transfer_file(read_storage, write_storage, file_name, archive, &mut report)
                .await
            {
                tracing::error!(file = %file_name, error = %e, "Error with file read/write: {:?}", e);
                return Err(e);
            }
        }

        Ok(report)
    }

    async fn transfer_file(
        &self,
        read_storage: &dyn Storage,
        write_storage: &dyn Storage,
        file_name: &str,
        archive: bool,
        report: &mut TransferReport,
    ) -> Result<()> {
        let contents = read_storage.read_file(file_name).await?;
        write_storage.write_file(file_name, &contents).await?;
        report.transferred += 1;

        if !self.config.transfer.copy_files {
            read_storage.delete_file(file_name).await?;
            report.deleted += 1;
        }

        if archive {
            write_storage.move_files().await?;
            report.archived += 1;
        }

        Ok(())
    }
}

/// Convenience wrapper around [`TransferEngine::run`].
pub async fn process_files<C>(config: &TransferConfig, connector: &C) -> Result<TransferReport>
where
    C: BackendConnector + ?Sized,
{
    TransferEngine::new(config, connector).run().await
}

/// The first `max_files` identifiers in enumeration order. The rest wait for a later run.
pub async fn list_batch(storage: &dyn Storage, max_files: usize) -> Result<Vec<String>> {
    let mut files = list_files(storage).await?;
    files.truncate(max_files);
    Ok(files)
}

async fn list_files(storage: &dyn Storage) -> Result<Vec<String>> {
    storage.list_dir().await.map_err(|e| {
        tracing::error!(error = %e, "Error listing source files: {:?}", e);
        e
    })
}

async fn release(role: Role, storage: &mut dyn Storage) {
    if let Err(e) = storage.exit().await {
        tracing::warn!(%role, error = %e, "Failed to release storage handle");
    }
}

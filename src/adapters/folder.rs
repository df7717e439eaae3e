use crate::domain::ports::Storage;
use crate::utils::error::{Result, TransferError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Sub-directory that receives writes until `move_files` promotes them.
pub const STAGING_DIR: &str = ".staging";

/// Local or mounted directory. Listed identifiers are the names of regular
/// files directly inside the root; written identifiers may contain `/`.
#[derive(Debug, Clone)]
pub struct FolderStorage {
    root: PathBuf,
}

impl FolderStorage {
    /// Opens an existing directory. A missing root is `NotFound`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        let metadata = fs::metadata(&root)
            .await
            .map_err(|e| TransferError::from_io("open folder", &root.display().to_string(), e))?;
        if !metadata.is_dir() {
            return Err(TransferError::transport(
                format!("open folder {}", root.display()),
                "not a directory",
            ));
        }
        tracing::debug!("Folder storage rooted at {}", root.display());
        Ok(Self { root })
    }

    /// Opens the directory, creating it and any missing parents first.
    pub async fn open_or_create(path: impl AsRef<Path>) -> Result<Self> {
        let root = path.as_ref();
        fs::create_dir_all(root)
            .await
            .map_err(|e| TransferError::transport(format!("create folder {}", root.display()), e))?;
        Self::open(root).await
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file_path(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }

    fn staging_dir(&self) -> PathBuf {
        self.root.join(STAGING_DIR)
    }
}

/// Where a staged file lands once promoted: the same path relative to the root.
pub(crate) fn promotion_target(root: &Path, staging: &Path, staged: &Path) -> Option<PathBuf> {
    staged
        .strip_prefix(staging)
        .ok()
        .filter(|relative| !relative.as_os_str().is_empty())
        .map(|relative| root.join(relative))
}

#[async_trait]
impl Storage for FolderStorage {
    async fn list_dir(&self) -> Result<Vec<String>> {
        let mut entries = fs::read_dir(&self.root)
            .await
            .map_err(|e| TransferError::transport(format!("list {}", self.root.display()), e))?;

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| TransferError::transport(format!("list {}", self.root.display()), e))?
        {
            let file_type = entry.file_type().await?;
            if file_type.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }

        // read_dir order is platform-dependent
        names.sort();
        Ok(names)
    }

    async fn read_file(&self, id: &str) -> Result<Vec<u8>> {
        fs::read(self.file_path(id))
            .await
            .map_err(|e| TransferError::from_io("read", id, e))
    }

    async fn write_file(&self, id: &str, data: &[u8]) -> Result<()> {
        let staged = self.staging_dir().join(id);
        if let Some(parent) = staged.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| TransferError::from_io("write", id, e))?;
        }

        fs::write(&staged, data)
            .await
            .map_err(|e| TransferError::from_io("write", id, e))
    }

    async fn delete_file(&self, id: &str) -> Result<()> {
        fs::remove_file(self.file_path(id))
            .await
            .map_err(|e| TransferError::from_io("delete", id, e))
    }

    /// Promotes every staged file into the root at the same relative path,
    /// replacing existing files.
    async fn move_files(&self) -> Result<()> {
        let staging = self.staging_dir();
        let mut pending = vec![staging.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(TransferError::transport("move staged files", e)),
            };

            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| TransferError::transport("move staged files", e))?
            {
                let file_type = entry.file_type().await?;
                let staged = entry.path();
                if file_type.is_dir() {
                    pending.push(staged);
                    continue;
                }
                if !file_type.is_file() {
                    continue;
                }
                let Some(target) = promotion_target(&self.root, &staging, &staged) else {
                    continue;
                };

                let move_error =
                    |e: std::io::Error| TransferError::transport(format!("move {}", staged.display()), e);
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent).await.map_err(move_error)?;
                }
                fs::rename(&staged, &target).await.map_err(move_error)?;
                tracing::debug!("Moved {} into {}", staged.display(), target.display());
            }
        }

        Ok(())
    }

    async fn exit(&mut self) -> Result<()> {
        Ok(())
    }
}

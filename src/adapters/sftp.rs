use crate::adapters::folder::{promotion_target, STAGING_DIR};
use crate::domain::params::SftpParams;
use crate::domain::ports::Storage;
use crate::utils::error::{Result, TransferError};
use async_trait::async_trait;
use ssh2::{ErrorCode, RenameFlags, Session, Sftp};
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// LIBSSH2_FX_NO_SUCH_FILE
const SFTP_NO_SUCH_FILE: i32 = 2;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
/// Upper bound for a single blocking libssh2 call, in milliseconds.
const SESSION_TIMEOUT_MS: u32 = 120_000;

struct SftpSession {
    session: Session,
    sftp: Sftp,
}

/// Remote directory over SFTP, laid out like [`FolderStorage`](crate::adapters::folder::FolderStorage):
/// writes are staged and promoted by `move_files`.
///
/// libssh2 blocks, so every call runs on the blocking thread pool.
pub struct SftpStorage {
    root: PathBuf,
    host: String,
    state: Arc<Mutex<Option<SftpSession>>>,
}

impl SftpStorage {
    pub async fn connect(params: SftpParams) -> Result<Self> {
        let host = params.host.clone();
        let root = PathBuf::from(&params.path);

        let state = tokio::task::spawn_blocking(move || open_session(&params))
            .await
            .map_err(|e| TransferError::transport("spawn_blocking for sftp connect", e))??;

        tracing::debug!(host = %host, root = %root.display(), "SFTP session established");
        Ok(Self {
            root,
            host,
            state: Arc::new(Mutex::new(Some(state))),
        })
    }

    /// Runs `f` against the open session on the blocking pool.
    async fn run<T, F>(&self, operation: &str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Sftp) -> Result<T> + Send + 'static,
    {
        let state = Arc::clone(&self.state);
        let op = operation.to_string();
        tokio::task::spawn_blocking(move || {
            let guard = state
                .lock()
                .map_err(|_| TransferError::transport(&op, "session lock poisoned"))?;
            let session = guard
                .as_ref()
                .ok_or_else(|| TransferError::transport(&op, "sftp session already closed"))?;
            f(&session.sftp)
        })
        .await
        .map_err(|e| TransferError::transport(format!("spawn_blocking for sftp {}", operation), e))?
    }

    fn staging_dir(&self) -> PathBuf {
        self.root.join(STAGING_DIR)
    }
}

fn open_session(params: &SftpParams) -> Result<SftpSession> {
    let address = format!("{}:{}", params.host, params.port);
    let tcp = connect_tcp(&address)?;

    let mut session =
        Session::new().map_err(|e| TransferError::transport("create ssh session", e))?;
    session.set_tcp_stream(tcp);
    session.set_timeout(SESSION_TIMEOUT_MS);
    session
        .handshake()
        .map_err(|e| TransferError::transport(format!("ssh handshake with {}", address), e))?;
    session
        .userauth_password(&params.username, &params.password)
        .map_err(|e| TransferError::transport(format!("authenticate as {}", params.username), e))?;

    let sftp = session
        .sftp()
        .map_err(|e| TransferError::transport("open sftp channel", e))?;
    Ok(SftpSession { session, sftp })
}

/// Tries each resolved address in turn, bounded by [`CONNECT_TIMEOUT`].
fn connect_tcp(address: &str) -> Result<TcpStream> {
    let operation = format!("connect to {}", address);
    let candidates: Vec<SocketAddr> = address
        .to_socket_addrs()
        .map_err(|e| TransferError::transport(&operation, e))?
        .collect();

    let mut last_error = None;
    for candidate in &candidates {
        match TcpStream::connect_timeout(candidate, CONNECT_TIMEOUT) {
            Ok(stream) => return Ok(stream),
            Err(e) => last_error = Some(e),
        }
    }
    Err(match last_error {
        Some(e) => TransferError::transport(operation, e),
        None => TransferError::transport(operation, "host resolved to no addresses"),
    })
}

fn map_sftp_error(operation: &str, id: &str, err: ssh2::Error) -> TransferError {
    if matches!(err.code(), ErrorCode::SFTP(SFTP_NO_SUCH_FILE)) {
        TransferError::not_found(id)
    } else {
        TransferError::transport(format!("{} '{}'", operation, id), err)
    }
}

fn file_names(entries: Vec<(PathBuf, ssh2::FileStat)>) -> Vec<String> {
    let mut names: Vec<String> = entries
        .into_iter()
        .filter(|(_, stat)| stat.is_file())
        .filter_map(|(path, _)| {
            path.file_name()
                .map(|name| name.to_string_lossy().into_owned())
        })
        .collect();
    names.sort();
    names
}

/// `dir` and each of its ancestors below `base`, outermost first.
fn dirs_to_create(base: &Path, dir: &Path) -> Vec<PathBuf> {
    let Ok(relative) = dir.strip_prefix(base) else {
        return Vec::new();
    };
    let mut current = base.to_path_buf();
    relative
        .components()
        .map(|component| {
            current.push(component);
            current.clone()
        })
        .collect()
}

/// Creates `base` if needed, then every directory between it and `dir`.
fn ensure_dirs(sftp: &Sftp, base: &Path, dir: &Path, id: &str) -> Result<()> {
    for path in std::iter::once(base.to_path_buf()).chain(dirs_to_create(base, dir)) {
        if sftp.stat(&path).is_err() {
            sftp.mkdir(&path, 0o755)
                .map_err(|e| map_sftp_error("create directory for", id, e))?;
        }
    }
    Ok(())
}

fn promote_staged(sftp: &Sftp, root: &Path, staging: &Path) -> Result<()> {
    let mut pending = vec![staging.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let entries = match sftp.readdir(&dir) {
            Ok(entries) => entries,
            Err(e) if matches!(e.code(), ErrorCode::SFTP(SFTP_NO_SUCH_FILE)) => continue,
            Err(e) => return Err(TransferError::transport("move staged files", e)),
        };

        for (staged, stat) in entries {
            if stat.is_dir() {
                pending.push(staged);
                continue;
            }
            if !stat.is_file() {
                continue;
            }
            let Some(target) = promotion_target(root, staging, &staged) else {
                continue;
            };

            let name = staged.display().to_string();
            if let Some(parent) = target.parent() {
                ensure_dirs(sftp, root, parent, &name)?;
            }
            sftp.rename(
                &staged,
                &target,
                Some(RenameFlags::OVERWRITE | RenameFlags::ATOMIC | RenameFlags::NATIVE),
            )
            .map_err(|e| map_sftp_error("move", &name, e))?;
            tracing::debug!("Moved {} into {}", name, target.display());
        }
    }

    Ok(())
}

#[async_trait]
impl Storage for SftpStorage {
    async fn list_dir(&self) -> Result<Vec<String>> {
        let root = self.root.clone();
        self.run("list", move |sftp| {
            let entries = sftp
                .readdir(&root)
                .map_err(|e| TransferError::transport(format!("list {}", root.display()), e))?;
            Ok(file_names(entries))
        })
        .await
    }

    async fn read_file(&self, id: &str) -> Result<Vec<u8>> {
        let path = self.root.join(id);
        let id = id.to_string();
        self.run("read", move |sftp| {
            let mut file = sftp.open(&path).map_err(|e| map_sftp_error("read", &id, e))?;
            let mut data = Vec::new();
            file.read_to_end(&mut data)
                .map_err(|e| TransferError::from_io("read", &id, e))?;
            Ok(data)
        })
        .await
    }

    async fn write_file(&self, id: &str, data: &[u8]) -> Result<()> {
        let staging = self.staging_dir();
        let staged = staging.join(id);
        let id = id.to_string();
        let data = data.to_vec();
        self.run("write", move |sftp| {
            if let Some(parent) = staged.parent() {
                ensure_dirs(sftp, &staging, parent, &id)?;
            }
            let mut file = sftp
                .create(&staged)
                .map_err(|e| map_sftp_error("write", &id, e))?;
            file.write_all(&data)
                .map_err(|e| TransferError::from_io("write", &id, e))
        })
        .await
    }

    async fn delete_file(&self, id: &str) -> Result<()> {
        let path = self.root.join(id);
        let id = id.to_string();
        self.run("delete", move |sftp| {
            sftp.unlink(&path).map_err(|e| map_sftp_error("delete", &id, e))
        })
        .await
    }

    async fn move_files(&self) -> Result<()> {
        let root = self.root.clone();
        let staging = self.staging_dir();
        self.run("move staged files", move |sftp| {
            promote_staged(sftp, &root, &staging)
        })
        .await
    }

    async fn exit(&mut self) -> Result<()> {
        let state = Arc::clone(&self.state);
        let host = self.host.clone();
        tokio::task::spawn_blocking(move || {
            let closed = state
                .lock()
                .map_err(|_| TransferError::transport("close sftp session", "session lock poisoned"))?
                .take();
            if let Some(closed) = closed {
                drop(closed.sftp);
                if let Err(e) = closed.session.disconnect(None, "datatransfer finished", None) {
                    tracing::warn!(host = %host, error = %e, "SFTP disconnect failed");
                }
                tracing::debug!(host = %host, "SFTP session closed");
            }
            Ok(())
        })
        .await
        .map_err(|e| TransferError::transport("spawn_blocking for sftp disconnect", e))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_identifier_needs_each_intermediate_dir() {
        let staging = Path::new("/upload/.staging");
        let staged = staging.join("2024/05/report.csv");

        assert_eq!(
            dirs_to_create(staging, staged.parent().unwrap()),
            vec![staging.join("2024"), staging.join("2024/05")]
        );
    }

    #[test]
    fn test_flat_identifier_needs_no_intermediate_dir() {
        let staging = Path::new("/upload/.staging");
        let staged = staging.join("report.csv");

        assert!(dirs_to_create(staging, staged.parent().unwrap()).is_empty());
        assert!(dirs_to_create(staging, Path::new("/elsewhere")).is_empty());
    }

    #[test]
    fn test_nested_staged_file_is_promoted_under_the_root() {
        let root = Path::new("/upload");
        let staging = root.join(STAGING_DIR);
        let staged = staging.join("2024/05/report.csv");

        let target = promotion_target(root, &staging, &staged).unwrap();
        assert_eq!(target, root.join("2024/05/report.csv"));
        assert_eq!(
            dirs_to_create(root, target.parent().unwrap()),
            vec![root.join("2024"), root.join("2024/05")]
        );
    }
}

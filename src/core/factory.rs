use crate::config::TransferConfig;
use crate::domain::model::{BackendKind, Role};
use crate::domain::params::{
    FolderParams, KeyValueParams, ObjectStoreParams, SftpParams, StorageParams,
    DEFAULT_REDIS_PORT, DEFAULT_SFTP_PORT,
};
use crate::domain::ports::{BackendConnector, Storage};
use crate::utils::error::{Result, TransferError};
use crate::utils::validation::validate_required_field;

/// Assembles the parameter bundle for `role` from that role's section only.
pub fn storage_params(config: &TransferConfig, role: Role, path: &str) -> Result<StorageParams> {
    let section = config.section(role);
    let field = |name: &str| format!("{}.{}", role, name);
    let path = path.to_string();

    let params = match section.kind {
        BackendKind::Sftp => {
            let sftp = validate_required_field(&field("sftp"), &section.sftp)?;
            StorageParams::Sftp(SftpParams {
                path,
                host: sftp.host.clone(),
                port: sftp.port.unwrap_or(DEFAULT_SFTP_PORT),
                username: sftp.username.clone(),
                password: sftp.password.clone(),
            })
        }
        BackendKind::ObjectStore => {
            let s3 = validate_required_field(&field("s3"), &section.s3)?;
            let use_iam_creds = config.transfer.use_iam_creds;
            if !use_iam_creds {
                validate_required_field(&field("s3.access_key_id"), &s3.access_key_id)?;
                validate_required_field(&field("s3.secret_access_key"), &s3.secret_access_key)?;
            }
            StorageParams::ObjectStore(ObjectStoreParams {
                path,
                bucket: s3.bucket_name.clone(),
                host: s3.host.clone(),
                access_key_id: s3.access_key_id.clone(),
                secret_access_key: s3.secret_access_key.clone(),
                encrypt: s3.encrypt,
                region: s3.region.clone(),
                use_iam_creds,
            })
        }
        BackendKind::Folder => StorageParams::Folder(FolderParams {
            path,
            create_missing: role == Role::Write,
        }),
        BackendKind::KeyValue => {
            let redis = validate_required_field(&field("redis"), &section.redis)?;
            StorageParams::KeyValue(KeyValueParams {
                path,
                host: redis.host.clone(),
                port: redis.port.unwrap_or(DEFAULT_REDIS_PORT),
                password: redis.password.clone(),
            })
        }
    };

    Ok(params)
}

/// Resolves a ready-to-use storage handle for `role` rooted at `path`.
pub async fn resolve_storage<C>(
    config: &TransferConfig,
    role: Role,
    path: &str,
    connector: &C,
) -> Result<Box<dyn Storage>>
where
    C: BackendConnector + ?Sized,
{
    let kind = config.section(role).kind;
    tracing::debug!(%role, %kind, path, "Storage type requested");

    let params = storage_params(config, role, path)?;
    let storage = connector.open_storage(params).await.map_err(|e| {
        tracing::error!(%role, %kind, error = %e, "Failed to open storage");
        e
    })?;

    tracing::info!("Setting {} storage to {}", role, kind);
    Ok(storage)
}

/// Error returned when a backend is configured but compiled out.
pub fn backend_unavailable(kind: BackendKind, feature: &str) -> TransferError {
    TransferError::config(format!(
        "{} backend not available ({} feature not enabled)",
        kind, feature
    ))
}

#[cfg(feature = "cli")]
pub mod cli;
pub mod env;
pub mod toml_config;

use crate::core::factory::storage_params;
use crate::core::queue::queue_params;
use crate::domain::model::{BackendKind, Role};
use crate::utils::error::{Result, TransferError};
use crate::utils::validation::{
    validate_non_empty_string, validate_path, validate_port, validate_positive_number,
    validate_url, Validate,
};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt::Display;
use std::str::FromStr;

pub const DEFAULT_MAX_FILES_BATCH: usize = 100;

/// Run configuration. Built once per run and read-only afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    pub transfer: TransferSection,
    pub read: StorageSection,
    pub write: StorageSection,
    #[serde(default)]
    pub queue: Option<QueueSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferSection {
    pub source_path: String,
    pub dest_path: String,
    /// `false` deletes each source file after it has been written.
    #[serde(default = "default_true", deserialize_with = "flag")]
    pub copy_files: bool,
    #[serde(default, deserialize_with = "flag")]
    pub publish_to_queue: bool,
    #[serde(default = "default_max_files_batch", deserialize_with = "number")]
    pub max_files_batch: usize,
    /// Shared by both roles' object-store bundles.
    #[serde(default, deserialize_with = "flag")]
    pub use_iam_creds: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSection {
    #[serde(rename = "type")]
    pub kind: BackendKind,
    #[serde(default)]
    pub sftp: Option<SftpSection>,
    #[serde(default)]
    pub s3: Option<S3Section>,
    #[serde(default)]
    pub redis: Option<RedisSection>,
}

impl StorageSection {
    pub fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            sftp: None,
            s3: None,
            redis: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SftpSection {
    pub host: String,
    #[serde(default, deserialize_with = "optional_number")]
    pub port: Option<u16>,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Section {
    #[serde(default)]
    pub host: Option<String>,
    pub bucket_name: String,
    #[serde(default)]
    pub access_key_id: Option<String>,
    #[serde(default)]
    pub secret_access_key: Option<String>,
    #[serde(default, deserialize_with = "flag")]
    pub encrypt: bool,
    pub region: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisSection {
    pub host: String,
    #[serde(default, deserialize_with = "optional_number")]
    pub port: Option<u16>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueSection {
    pub host: String,
    #[serde(default, deserialize_with = "optional_number")]
    pub port: Option<u16>,
    pub queue_name: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl TransferConfig {
    pub fn section(&self, role: Role) -> &StorageSection {
        match role {
            Role::Read => &self.read,
            Role::Write => &self.write,
        }
    }

    fn validate_section(&self, role: Role) -> Result<()> {
        let section = self.section(role);
        if let Some(sftp) = &section.sftp {
            validate_non_empty_string(&format!("{}.sftp.host", role), &sftp.host)?;
            if let Some(port) = sftp.port {
                validate_port(&format!("{}.sftp.port", role), port)?;
            }
        }
        if let Some(s3) = &section.s3 {
            validate_non_empty_string(&format!("{}.s3.bucket_name", role), &s3.bucket_name)?;
            validate_non_empty_string(&format!("{}.s3.region", role), &s3.region)?;
            if let Some(host) = &s3.host {
                validate_url(&format!("{}.s3.host", role), host)?;
            }
        }
        if let Some(redis) = &section.redis {
            validate_non_empty_string(&format!("{}.redis.host", role), &redis.host)?;
            if let Some(port) = redis.port {
                validate_port(&format!("{}.redis.port", role), port)?;
            }
        }
        Ok(())
    }
}

impl Validate for TransferConfig {
    fn validate(&self) -> Result<()> {
        validate_path("transfer.source_path", &self.transfer.source_path)?;
        validate_path("transfer.dest_path", &self.transfer.dest_path)?;
        validate_positive_number("transfer.max_files_batch", self.transfer.max_files_batch, 1)?;

        self.validate_section(Role::Read)?;
        self.validate_section(Role::Write)?;

        // Bundles must be buildable for both roles before anything connects.
        storage_params(self, Role::Read, &self.transfer.source_path)?;
        storage_params(self, Role::Write, &self.transfer.dest_path)?;

        if self.transfer.publish_to_queue {
            let queue = self.queue.as_ref().ok_or_else(|| TransferError::ConfigValidationError {
                field: "queue".to_string(),
                message: "publish_to_queue is enabled but no [queue] section is configured"
                    .to_string(),
            })?;
            validate_non_empty_string("queue.host", &queue.host)?;
            validate_non_empty_string("queue.queue_name", &queue.queue_name)?;
            if let Some(port) = queue.port {
                validate_port("queue.port", port)?;
            }
            queue_params(queue)?;
        }

        tracing::debug!("Configuration validation passed");
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

fn default_max_files_batch() -> usize {
    DEFAULT_MAX_FILES_BATCH
}

/// Values may arrive as native TOML scalars or, after `${VAR}` substitution,
/// as strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Bool(bool),
    Int(u64),
    Text(String),
}

fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<bool, D::Error> {
    match Scalar::deserialize(deserializer)? {
        Scalar::Bool(value) => Ok(value),
        Scalar::Text(text) => {
            crate::utils::validation::parse_flag("flag", &text).map_err(serde::de::Error::custom)
        }
        Scalar::Int(value) => Err(serde::de::Error::custom(format!(
            "expected true or false, found {}",
            value
        ))),
    }
}

fn number<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<u64> + FromStr,
    <T as TryFrom<u64>>::Error: Display,
    <T as FromStr>::Err: Display,
{
    match Scalar::deserialize(deserializer)? {
        Scalar::Int(value) => T::try_from(value).map_err(serde::de::Error::custom),
        Scalar::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
        Scalar::Bool(value) => Err(serde::de::Error::custom(format!(
            "expected a number, found {}",
            value
        ))),
    }
}

fn optional_number<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<u64> + FromStr,
    <T as TryFrom<u64>>::Error: Display,
    <T as FromStr>::Err: Display,
{
    number(deserializer).map(Some)
}

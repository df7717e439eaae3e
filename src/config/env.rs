use crate::config::{
    QueueSection, RedisSection, S3Section, SftpSection, StorageSection, TransferConfig,
    TransferSection, DEFAULT_MAX_FILES_BATCH,
};
use crate::domain::model::BackendKind;
use crate::utils::error::{Result, TransferError};
use crate::utils::validation::{parse_flag, parse_number};
use std::str::FromStr;

impl TransferConfig {
    /// Loads configuration from the flat deployment variables
    /// (`INGEST_SOURCE_PATH`, `READ_STORAGE_TYPE`, ...).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`TransferConfig::from_env`] with an explicit variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = EnvVars { lookup };

        let transfer = TransferSection {
            source_path: vars.required("INGEST_SOURCE_PATH")?,
            dest_path: vars.required("INGEST_DEST_PATH")?,
            copy_files: vars.flag("COPY_FILES", true)?,
            publish_to_queue: vars.flag("WRITE_MQ", false)?,
            max_files_batch: vars
                .number("MAX_FILES_BATCH")?
                .unwrap_or(DEFAULT_MAX_FILES_BATCH),
            use_iam_creds: vars.flag("USE_IAM_CREDS", false)?,
        };

        let queue = if transfer.publish_to_queue {
            Some(QueueSection {
                host: vars.required("WRITE_MQ_HOST")?,
                port: vars.number("WRITE_MQ_PORT")?,
                queue_name: vars.required("WRITE_MQ_PATH")?,
                username: vars.optional("WRITE_MQ_USERNAME"),
                password: vars.optional("WRITE_MQ_PASSWORD"),
            })
        } else {
            None
        };

        Ok(Self {
            transfer,
            read: vars.storage_section("READ")?,
            write: vars.storage_section("WRITE")?,
            queue,
        })
    }
}

struct EnvVars<F> {
    lookup: F,
}

impl<F> EnvVars<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Empty values count as unset.
    fn optional(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|value| !value.trim().is_empty())
    }

    fn required(&self, name: &str) -> Result<String> {
        self.optional(name)
            .ok_or_else(|| TransferError::missing(name))
    }

    fn flag(&self, name: &str, default: bool) -> Result<bool> {
        match self.optional(name) {
            Some(value) => parse_flag(name, &value),
            None => Ok(default),
        }
    }

    fn number<T>(&self, name: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.optional(name)
            .map(|value| parse_number(name, &value))
            .transpose()
    }

    /// Reads only the variables the selected backend kind needs.
    fn storage_section(&self, role: &str) -> Result<StorageSection> {
        let type_var = format!("{}_STORAGE_TYPE", role);
        let type_name = self.required(&type_var)?;
        let kind = BackendKind::from_type_name(&type_name).map_err(|_| {
            TransferError::InvalidConfigValueError {
                field: type_var.clone(),
                value: type_name.clone(),
                reason: "Unknown storage type".to_string(),
            }
        })?;

        let var = |suffix: &str| format!("{}_{}", role, suffix);
        let mut section = StorageSection::new(kind);

        match kind {
            BackendKind::Sftp => {
                section.sftp = Some(SftpSection {
                    host: self.required(&var("FTP_HOST"))?,
                    port: self.number(&var("FTP_PORT"))?,
                    username: self.required(&var("FTP_USER"))?,
                    password: self.required(&var("FTP_PASSWORD"))?,
                });
            }
            BackendKind::ObjectStore => {
                section.s3 = Some(S3Section {
                    host: self.optional(&var("AWS_S3_HOST")),
                    bucket_name: self.required(&var("AWS_S3_BUCKET_NAME"))?,
                    access_key_id: self.optional(&var("AWS_ACCESS_KEY_ID")),
                    secret_access_key: self.optional(&var("AWS_SECRET_ACCESS_KEY")),
                    encrypt: self.flag(&var("AWS_S3_ENCRYPT"), false)?,
                    region: self.required(&var("AWS_S3_REGION"))?,
                });
            }
            BackendKind::Folder => {}
            BackendKind::KeyValue => {
                section.redis = Some(RedisSection {
                    host: self.required(&var("REDIS_HOST"))?,
                    port: self.number(&var("REDIS_PORT"))?,
                    password: self.optional(&var("REDIS_PASSWORD")),
                });
            }
        }

        Ok(section)
    }
}

use crate::domain::params::ObjectStoreParams;
use crate::domain::ports::Storage;
use crate::utils::error::{Result, TransferError};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ServerSideEncryption;
use aws_sdk_s3::Client as S3Client;

/// Objects under a key prefix in one bucket.
#[derive(Debug, Clone)]
pub struct S3Storage {
    client: S3Client,
    bucket: String,
    prefix: String,
    encrypt: bool,
}

impl S3Storage {
    pub fn new(client: S3Client, bucket: String, prefix: String, encrypt: bool) -> Self {
        Self {
            client,
            bucket,
            prefix,
            encrypt,
        }
    }

    pub async fn connect(params: ObjectStoreParams) -> Result<Self> {
        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(params.region.clone()))
            .load()
            .await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(host) = &params.host {
            // custom endpoints (MinIO, localstack) need path-style addressing
            builder = builder.endpoint_url(host).force_path_style(true);
        }
        if !params.use_iam_creds {
            let access_key_id = params
                .access_key_id
                .clone()
                .ok_or_else(|| TransferError::missing("s3.access_key_id"))?;
            let secret_access_key = params
                .secret_access_key
                .clone()
                .ok_or_else(|| TransferError::missing("s3.secret_access_key"))?;
            builder = builder.credentials_provider(Credentials::new(
                access_key_id,
                secret_access_key,
                None,
                None,
                "datatransfer",
            ));
        }

        tracing::debug!(bucket = %params.bucket, prefix = %params.path, "Connecting to S3");
        Ok(Self::new(
            S3Client::from_conf(builder.build()),
            params.bucket,
            params.path,
            params.encrypt,
        ))
    }

    fn key(&self, id: &str) -> String {
        format!("{}{}", self.prefix, id)
    }

    async fn exists(&self, id: &str) -> Result<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(self.key(id))
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(err) => {
                let missing = err
                    .as_service_error()
                    .map(|service_err| service_err.is_not_found())
                    .unwrap_or(false);
                if missing {
                    Ok(false)
                } else {
                    Err(TransferError::transport(format!("head '{}'", id), err))
                }
            }
        }
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn list_dir(&self) -> Result<Vec<String>> {
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(&self.prefix)
            .into_paginator()
            .send();

        let mut names = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| TransferError::transport("list objects", e))?;
            for object in page.contents() {
                if let Some(key) = object.key() {
                    let name = key.strip_prefix(self.prefix.as_str()).unwrap_or(key);
                    names.push(name.to_string());
                }
            }
        }

        Ok(names)
    }

    async fn read_file(&self, id: &str) -> Result<Vec<u8>> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(self.key(id))
            .send()
            .await
            .map_err(|err| {
                let missing = err
                    .as_service_error()
                    .map(|service_err| service_err.is_no_such_key())
                    .unwrap_or(false);
                if missing {
                    TransferError::not_found(id)
                } else {
                    TransferError::transport(format!("read '{}'", id), err)
                }
            })?;

        let data = resp
            .body
            .collect()
            .await
            .map_err(|e| TransferError::transport(format!("read body of '{}'", id), e))?;

        Ok(data.into_bytes().to_vec())
    }

    async fn write_file(&self, id: &str, data: &[u8]) -> Result<()> {
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(self.key(id))
            .body(ByteStream::from(data.to_vec()));
        if self.encrypt {
            request = request.server_side_encryption(ServerSideEncryption::Aes256);
        }

        request
            .send()
            .await
            .map_err(|e| TransferError::transport(format!("write '{}'", id), e))?;
        Ok(())
    }

    /// S3 deletes are silent for missing keys, so existence is checked first.
    async fn delete_file(&self, id: &str) -> Result<()> {
        if !self.exists(id).await? {
            return Err(TransferError::not_found(id));
        }

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(self.key(id))
            .send()
            .await
            .map_err(|e| TransferError::transport(format!("delete '{}'", id), e))?;
        Ok(())
    }

    async fn move_files(&self) -> Result<()> {
        Ok(())
    }

    async fn exit(&mut self) -> Result<()> {
        Ok(())
    }
}

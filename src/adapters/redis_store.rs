use crate::domain::params::KeyValueParams;
use crate::domain::ports::Storage;
use crate::utils::error::{Result, TransferError};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use url::Url;

/// Values stored under `<prefix><id>` keys.
pub struct RedisStorage {
    prefix: String,
    connection: Option<MultiplexedConnection>,
}

impl RedisStorage {
    pub async fn connect(params: KeyValueParams) -> Result<Self> {
        let url = connection_url(&params)?;
        let client = redis::Client::open(url.as_str())
            .map_err(|e| TransferError::config(format!("Invalid redis connection settings: {}", e)))?;
        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| {
                TransferError::transport(format!("connect to redis {}:{}", params.host, params.port), e)
            })?;

        tracing::debug!(host = %params.host, prefix = %params.path, "Redis connection established");
        Ok(Self {
            prefix: params.path,
            connection: Some(connection),
        })
    }

    fn key(&self, id: &str) -> String {
        format!("{}{}", self.prefix, id)
    }

    fn connection(&self, operation: &str) -> Result<MultiplexedConnection> {
        self.connection
            .clone()
            .ok_or_else(|| TransferError::transport(operation, "redis connection already closed"))
    }
}

fn connection_url(params: &KeyValueParams) -> Result<Url> {
    let mut url = Url::parse(&format!("redis://{}:{}/", params.host, params.port)).map_err(|e| {
        TransferError::InvalidConfigValueError {
            field: "redis.host".to_string(),
            value: params.host.clone(),
            reason: e.to_string(),
        }
    })?;
    if let Some(password) = &params.password {
        url.set_password(Some(password))
            .map_err(|_| TransferError::config("Redis password cannot be set on this host"))?;
    }
    Ok(url)
}

/// Redis glob metacharacters in the prefix must match literally.
fn escape_pattern(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len());
    for ch in prefix.chars() {
        if matches!(ch, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[async_trait]
impl Storage for RedisStorage {
    async fn list_dir(&self) -> Result<Vec<String>> {
        let mut connection = self.connection("list")?;
        let pattern = format!("{}*", escape_pattern(&self.prefix));

        let mut keys: Vec<String> = Vec::new();
        {
            let mut iter = connection
                .scan_match::<_, String>(&pattern)
                .await
                .map_err(|e| TransferError::transport("scan keys", e))?;
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
        }

        // SCAN order is unspecified and may repeat keys
        let mut names: Vec<String> = keys
            .into_iter()
            .filter_map(|key| key.strip_prefix(self.prefix.as_str()).map(String::from))
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    async fn read_file(&self, id: &str) -> Result<Vec<u8>> {
        let mut connection = self.connection("read")?;
        let value: Option<Vec<u8>> = connection
            .get(self.key(id))
            .await
            .map_err(|e| TransferError::transport(format!("read '{}'", id), e))?;
        value.ok_or_else(|| TransferError::not_found(id))
    }

    async fn write_file(&self, id: &str, data: &[u8]) -> Result<()> {
        let mut connection = self.connection("write")?;
        connection
            .set::<_, _, ()>(self.key(id), data)
            .await
            .map_err(|e| TransferError::transport(format!("write '{}'", id), e))
    }

    async fn delete_file(&self, id: &str) -> Result<()> {
        let mut connection = self.connection("delete")?;
        let removed: i64 = connection
            .del(self.key(id))
            .await
            .map_err(|e| TransferError::transport(format!("delete '{}'", id), e))?;
        if removed == 0 {
            return Err(TransferError::not_found(id));
        }
        Ok(())
    }

    async fn move_files(&self) -> Result<()> {
        Ok(())
    }

    async fn exit(&mut self) -> Result<()> {
        if self.connection.take().is_some() {
            tracing::debug!("Redis connection released");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_url_carries_password() {
        let url = connection_url(&KeyValueParams {
            path: "files/".to_string(),
            host: "cache".to_string(),
            port: 6380,
            password: Some("p@ss word".to_string()),
        })
        .unwrap();

        assert_eq!(url.host_str(), Some("cache"));
        assert_eq!(url.port(), Some(6380));
        assert!(url.password().is_some());
    }

    #[test]
    fn test_escape_pattern() {
        assert_eq!(escape_pattern("files/"), "files/");
        assert_eq!(escape_pattern("a*b?[c]"), "a\\*b\\?\\[c\\]");
    }
}

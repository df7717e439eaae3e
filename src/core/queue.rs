use crate::config::{QueueSection, TransferConfig};
use crate::domain::params::{QueueCredentials, QueueParams, DEFAULT_AMQP_PORT};
use crate::domain::ports::{BackendConnector, QueuePublisher};
use crate::utils::error::{Result, TransferError};

/// Builds publisher parameters. A username requires a password; with neither
/// the publisher connects anonymously.
pub fn queue_params(section: &QueueSection) -> Result<QueueParams> {
    let credentials = match (&section.username, &section.password) {
        (Some(username), Some(password)) => Some(QueueCredentials {
            username: username.clone(),
            password: password.clone(),
        }),
        (Some(_), None) => return Err(TransferError::missing("queue.password")),
        (None, Some(_)) => {
            tracing::warn!("queue.password is set without queue.username, connecting anonymously");
            None
        }
        (None, None) => None,
    };

    Ok(QueueParams {
        host: section.host.clone(),
        port: section.port.unwrap_or(DEFAULT_AMQP_PORT),
        queue_name: section.queue_name.clone(),
        credentials,
    })
}

pub async fn resolve_queue<C>(config: &TransferConfig, connector: &C) -> Result<Box<dyn QueuePublisher>>
where
    C: BackendConnector + ?Sized,
{
    let section = config
        .queue
        .as_ref()
        .ok_or_else(|| TransferError::missing("queue"))?;
    let params = queue_params(section)?;

    tracing::info!(
        host = %params.host,
        port = params.port,
        queue = %params.queue_name,
        authenticated = params.credentials.is_some(),
        "Connecting to message queue"
    );
    connector.open_queue(params).await
}

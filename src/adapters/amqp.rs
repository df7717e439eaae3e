use crate::domain::params::QueueParams;
use crate::domain::ports::QueuePublisher;
use crate::utils::error::{Result, TransferError};
use async_trait::async_trait;
use lapin::options::{BasicPublishOptions, ConfirmSelectOptions, QueueDeclareOptions};
use lapin::publisher_confirm::Confirmation;
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use url::Url;

/// Persistent messages.
const DELIVERY_MODE_PERSISTENT: u8 = 2;

/// Publishes file identifiers to a durable AMQP queue via the default exchange.
pub struct AmqpPublisher {
    queue_name: String,
    connection: Option<Connection>,
    channel: Option<Channel>,
}

impl AmqpPublisher {
    pub async fn connect(params: QueueParams) -> Result<Self> {
        let uri = amqp_uri(&params)?;
        let connection = Connection::connect(uri.as_str(), ConnectionProperties::default())
            .await
            .map_err(|e| {
                TransferError::transport(format!("connect to broker {}:{}", params.host, params.port), e)
            })?;
        let channel = connection
            .create_channel()
            .await
            .map_err(|e| TransferError::transport("open channel", e))?;
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(|e| TransferError::transport("enable publisher confirms", e))?;
        channel
            .queue_declare(
                &params.queue_name,
                QueueDeclareOptions {
                    durable: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| TransferError::transport(format!("declare queue {}", params.queue_name), e))?;

        tracing::debug!(queue = %params.queue_name, "Message queue channel ready");
        Ok(Self {
            queue_name: params.queue_name,
            connection: Some(connection),
            channel: Some(channel),
        })
    }
}

/// Anonymous connections fall back to the broker's default `guest` account.
fn amqp_uri(params: &QueueParams) -> Result<Url> {
    let mut uri = Url::parse(&format!("amqp://{}:{}/%2f", params.host, params.port)).map_err(|e| {
        TransferError::InvalidConfigValueError {
            field: "queue.host".to_string(),
            value: params.host.clone(),
            reason: e.to_string(),
        }
    })?;
    if let Some(credentials) = &params.credentials {
        uri.set_username(&credentials.username)
            .and_then(|_| uri.set_password(Some(&credentials.password)))
            .map_err(|_| TransferError::config("Queue credentials cannot be set on this host"))?;
    }
    Ok(uri)
}

/// Only an ack counts as delivered.
fn check_confirmation(id: &str, confirmation: &Confirmation) -> Result<()> {
    match confirmation {
        Confirmation::Ack(_) => Ok(()),
        Confirmation::Nack(_) => Err(TransferError::transport(
            format!("confirm '{}'", id),
            "broker rejected the message",
        )),
        Confirmation::NotRequested => Err(TransferError::transport(
            format!("confirm '{}'", id),
            "publisher confirms are not enabled on the channel",
        )),
    }
}

#[async_trait]
impl QueuePublisher for AmqpPublisher {
    async fn publish_event(&self, id: &str) -> Result<()> {
        let channel = self
            .channel
            .as_ref()
            .ok_or_else(|| TransferError::transport("publish", "queue connection already closed"))?;

        let confirmation = channel
            .basic_publish(
                "",
                &self.queue_name,
                BasicPublishOptions::default(),
                id.as_bytes(),
                BasicProperties::default().with_delivery_mode(DELIVERY_MODE_PERSISTENT),
            )
            .await
            .map_err(|e| TransferError::transport(format!("publish '{}'", id), e))?
            .await
            .map_err(|e| TransferError::transport(format!("confirm '{}'", id), e))?;
        check_confirmation(id, &confirmation)?;

        tracing::debug!(queue = %self.queue_name, file = %id, "Event published");
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(channel) = self.channel.take() {
            if let Err(e) = channel.close(200, "done").await {
                tracing::warn!(error = %e, "Failed to close queue channel");
            }
        }
        if let Some(connection) = self.connection.take() {
            if let Err(e) = connection.close(200, "done").await {
                tracing::warn!(error = %e, "Failed to close queue connection");
            }
        }
        Ok(())
    }
}

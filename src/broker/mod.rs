use async_trait::async_trait;
use lapin::options::{BasicPublishOptions, ExchangeDeclareOptions};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use log::warn;

use crate::config::BrokerConfig;

/// Best-effort error channel: broker failures are logged by callers and
/// never mapped into an HTTP response.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("broker connection failed: {0}")]
    Connection(String),
    #[error("publish failed: {0}")]
    Publish(String),
}

/// A connection+channel pair scoped to a single request. Opened before the
/// authoritative writes, closed after every publish for the request has
/// been attempted.
#[async_trait]
pub trait BrokerChannel: Send + Sync {
    async fn publish(&self, routing_key: &str, payload: Vec<u8>) -> Result<(), BrokerError>;
    /// Releases channel then connection. Safe on a partially opened pair;
    /// double-close is a no-op.
    async fn close(&mut self);
}

#[async_trait]
pub trait BrokerConnector: Send + Sync {
    async fn open(&self) -> Result<Box<dyn BrokerChannel>, BrokerError>;
}

pub struct AmqpConnector {
    config: BrokerConfig,
}

impl AmqpConnector {
    pub fn new(config: BrokerConfig) -> Self {
        Self { config }
    }
}

fn exchange_kind(name: &str) -> ExchangeKind {
    match name {
        "fanout" => ExchangeKind::Fanout,
        "direct" => ExchangeKind::Direct,
        "headers" => ExchangeKind::Headers,
        _ => ExchangeKind::Topic,
    }
}

#[async_trait]
impl BrokerConnector for AmqpConnector {
    async fn open(&self) -> Result<Box<dyn BrokerChannel>, BrokerError> {
        let uri = format!("amqp://{}:{}/%2f", self.config.host, self.config.port);
        let connection = tokio::time::timeout(
            self.config.timeout,
            Connection::connect(&uri, ConnectionProperties::default()),
        )
        .await
        .map_err(|_| BrokerError::Connection(format!("timed out connecting to {}", uri)))?
        .map_err(|err| BrokerError::Connection(err.to_string()))?;
        let channel = connection
            .create_channel()
            .await
            .map_err(|err| BrokerError::Connection(err.to_string()))?;
        channel
            .exchange_declare(
                &self.config.exchange,
                exchange_kind(&self.config.exchange_type),
                ExchangeDeclareOptions {
                    durable: true,
                    ..ExchangeDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|err| BrokerError::Connection(err.to_string()))?;
        Ok(Box::new(AmqpChannel {
            exchange: self.config.exchange.clone(),
            channel: Some(channel),
            connection: Some(connection),
        }))
    }
}

pub struct AmqpChannel {
    exchange: String,
    channel: Option<Channel>,
    connection: Option<Connection>,
}

#[async_trait]
impl BrokerChannel for AmqpChannel {
    async fn publish(&self, routing_key: &str, payload: Vec<u8>) -> Result<(), BrokerError> {
        let channel = self
            .channel
            .as_ref()
            .ok_or_else(|| BrokerError::Publish("channel already closed".to_string()))?;
        channel
            .basic_publish(
                &self.exchange,
                routing_key,
                BasicPublishOptions::default(),
                &payload,
                // delivery mode 2 marks the message persistent
                BasicProperties::default().with_delivery_mode(2),
            )
            .await
            .map_err(|err| BrokerError::Publish(err.to_string()))?
            .await
            .map_err(|err| BrokerError::Publish(err.to_string()))?;
        Ok(())
    }

    async fn close(&mut self) {
        if let Some(channel) = self.channel.take() {
            if let Err(err) = channel.close(200, "request finished").await {
                warn!("broker channel close failed: {}", err);
            }
        }
        if let Some(connection) = self.connection.take() {
            if let Err(err) = connection.close(200, "request finished").await {
                warn!("broker connection close failed: {}", err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exchange_kind_defaults_to_topic() {
        assert_eq!(exchange_kind("fanout"), ExchangeKind::Fanout);
        assert_eq!(exchange_kind("direct"), ExchangeKind::Direct);
        assert_eq!(exchange_kind("topic"), ExchangeKind::Topic);
        assert_eq!(exchange_kind("something-else"), ExchangeKind::Topic);
    }
}

use crate::managers::batch_dispatcher::BatchSubmitter;
use command_protocol::Instructions;
use futures_util::StreamExt;
use lapin::message::Delivery;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicQosOptions, BasicRejectOptions,
    QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{Channel, Connection, ConnectionProperties, Consumer};
use log::{debug, error, info, warn};
use std::sync::Arc;
use thiserror::Error;
use tokio::select;
use tokio_util::sync::CancellationToken;

#[derive(Error, Debug)]
pub enum AmqpConsumerError {
    #[error("Broker operation failed: {0}")]
    Broker(#[from] lapin::Error),
    #[error("Malformed message: {0}")]
    MalformedMessage(String),
}

#[derive(Debug, Clone)]
pub struct AmqpConsumerConfig {
    pub uri: String,
    pub queue: String,
    pub consumer_tag: String,
    pub prefetch: u16,
}

/// Feeds batches published on a durable queue to the dispatcher.
pub struct AmqpConsumer {
    connection: Connection,
    channel: Channel,
    consumer: Consumer,
}

pub fn decode_message(data: &[u8]) -> Result<Instructions, AmqpConsumerError> {
    serde_json::from_slice(data).map_err(|err| AmqpConsumerError::MalformedMessage(err.to_string()))
}

enum Handoff {
    Accepted,
    Closed,
}

impl AmqpConsumer {
    pub async fn connect(config: AmqpConsumerConfig) -> Result<Self, AmqpConsumerError> {
        let connection = Connection::connect(&config.uri, ConnectionProperties::default()).await?;
        let channel = connection.create_channel().await?;
        channel
            .basic_qos(config.prefetch, BasicQosOptions::default())
            .await?;
        channel
            .queue_declare(
                &config.queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;
        let consumer = channel
            .basic_consume(
                &config.queue,
                &config.consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;
        info!("Consuming queue '{}'.", config.queue);

        Ok(Self {
            connection,
            channel,
            consumer,
        })
    }

    pub async fn consume(
        mut self,
        submitter: BatchSubmitter,
        token: Arc<CancellationToken>,
    ) -> Result<(), AmqpConsumerError> {
        info!("Starting AMQP consumer.");
        loop {
            select! {
                delivery = self.consumer.next() => {
                    match delivery {
                        Some(delivery) => {
                            if let Handoff::Closed = Self::handle_delivery(delivery?, &submitter).await? {
                                break;
                            }
                        }
                        None => {
                            warn!("AMQP consumer stream ended.");
                            break;
                        }
                    }
                }
                _ = token.cancelled() => {
                    break;
                }
            }
        }

        self.channel.close(200, "Shutting down").await?;
        self.connection.close(200, "Shutting down").await?;
        info!("AMQP consumer stopped.");
        Ok(())
    }

    async fn handle_delivery(
        delivery: Delivery,
        submitter: &BatchSubmitter,
    ) -> Result<Handoff, AmqpConsumerError> {
        let instructions = match decode_message(&delivery.data) {
            Ok(instructions) => instructions,
            Err(err) => {
                error!("Rejecting message {}: {}", delivery.delivery_tag, err);
                delivery
                    .acker
                    .reject(BasicRejectOptions { requeue: false })
                    .await?;
                return Ok(Handoff::Accepted);
            }
        };

        debug!(
            "Received batch of {} commands from queue.",
            instructions.command_count()
        );
        match submitter.submit(instructions).await {
            Ok(()) => {
                delivery.acker.ack(BasicAckOptions::default()).await?;
                Ok(Handoff::Accepted)
            }
            Err(err) => {
                warn!("Returning message {} to queue: {}", delivery.delivery_tag, err);
                delivery
                    .acker
                    .nack(BasicNackOptions {
                        requeue: true,
                        ..Default::default()
                    })
                    .await?;
                Ok(Handoff::Closed)
            }
        }
    }
}

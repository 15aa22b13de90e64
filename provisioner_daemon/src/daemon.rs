use super::cli::Cli;
use super::fabric::docker_fabric::{DockerFabric, ExecutionOptions};
use super::managers::batch_dispatcher::{batch_channel, BatchDispatcher, BatchSubmitter, DispatchError};
use super::server::amqp_consumer::{AmqpConsumer, AmqpConsumerConfig, AmqpConsumerError};
use super::server::http_server::{HttpServer, HttpServerError};
use anyhow::Error;
use log::{debug, error, info};
use std::future::pending;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::select;
use tokio::signal::unix::{signal, SignalKind};
use tokio::spawn;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct DaemonBuilder {}

impl DaemonBuilder {
    pub async fn build(cli: Cli) -> anyhow::Result<Daemon, Error> {
        let fabric = DockerFabric::new(cli.docker_host.as_deref(), cli.docker_timeout_secs)?;
        let processor = Arc::new(fabric.create_batch_processor(ExecutionOptions {
            max_retries: cli.max_retries,
            retry_delay: Duration::from_millis(cli.retry_delay_ms),
            retry_jitter: cli.retry_jitter,
            enforce_command_timeout: cli.enforce_command_timeout,
            netem_image: cli.netem_image,
        }));
        let (submitter, receiver) = batch_channel(cli.dispatcher_capacity as usize);
        let dispatcher = BatchDispatcher::new(processor, receiver);
        let http_server = HttpServer::bind(cli.listen_address).await?;
        let amqp_consumer = match cli.amqp_uri {
            Some(uri) => Some(
                AmqpConsumer::connect(AmqpConsumerConfig {
                    uri,
                    queue: cli.amqp_queue,
                    consumer_tag: cli.amqp_consumer_tag,
                    prefetch: cli.amqp_prefetch,
                })
                .await?,
            ),
            None => None,
        };

        Ok(Daemon {
            dispatcher,
            submitter,
            http_server,
            amqp_consumer,
            cancellation_token: Arc::new(CancellationToken::new()),
        })
    }
}

pub struct Daemon {
    dispatcher: BatchDispatcher,
    submitter: BatchSubmitter,
    http_server: HttpServer,
    amqp_consumer: Option<AmqpConsumer>,
    cancellation_token: Arc<CancellationToken>,
}

impl Daemon {
    pub fn local_addr(&self) -> anyhow::Result<SocketAddr, Error> {
        Ok(self.http_server.local_addr()?)
    }

    pub async fn run(self) -> anyhow::Result<JoinHandle<Result<(), Error>>, Error> {
        info!("Starting application.");
        let mut dispatcher_thread =
            Self::spawn_dispatcher_thread(self.dispatcher, self.cancellation_token.clone());
        let mut http_thread = Self::spawn_http_server_thread(
            self.http_server,
            self.submitter.clone(),
            self.cancellation_token.clone(),
        );
        let mut amqp_thread = self.amqp_consumer.map(|consumer| {
            Self::spawn_amqp_consumer_thread(
                consumer,
                self.submitter.clone(),
                self.cancellation_token.clone(),
            )
        });
        drop(self.submitter);
        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        Ok(spawn(async move {
            select! {
                _ = sigint.recv() => {
                    info!("SIGINT received shutting down");
                }

                _ = sigterm.recv() => {
                    info!("SIGTERM received shutting down");
                }

                v = &mut dispatcher_thread => {
                    error!("Batch dispatcher exited: {:?}", v);
                }

                v = &mut http_thread => {
                    error!("Error while serving HTTP: {:?}", v);
                }

                v = async {
                    match amqp_thread.as_mut() {
                        Some(thread) => thread.await,
                        None => pending().await,
                    }
                } => {
                    error!("Error while consuming queue: {:?}", v);
                }
            }
            info!("Shutting down application.");
            self.cancellation_token.cancel();

            if let Some(thread) = amqp_thread {
                if !thread.is_finished() {
                    debug!("AmqpConsumer result: {:#?}", thread.await);
                }
            }

            if !http_thread.is_finished() {
                debug!("HttpServer result: {:#?}", http_thread.await);
            }

            if !dispatcher_thread.is_finished() {
                debug!("BatchDispatcher result: {:#?}", dispatcher_thread.await);
            }

            info!("Application successfully shutdown.");
            Ok(())
        }))
    }

    fn spawn_dispatcher_thread(
        dispatcher: BatchDispatcher,
        token: Arc<CancellationToken>,
    ) -> JoinHandle<Result<(), DispatchError>> {
        tokio::spawn(async move { dispatcher.run(token).await })
    }

    fn spawn_http_server_thread(
        server: HttpServer,
        submitter: BatchSubmitter,
        token: Arc<CancellationToken>,
    ) -> JoinHandle<Result<(), HttpServerError>> {
        tokio::spawn(async move { server.serve(submitter, token).await })
    }

    fn spawn_amqp_consumer_thread(
        consumer: AmqpConsumer,
        submitter: BatchSubmitter,
        token: Arc<CancellationToken>,
    ) -> JoinHandle<Result<(), AmqpConsumerError>> {
        tokio::spawn(async move { consumer.consume(submitter, token).await })
    }
}

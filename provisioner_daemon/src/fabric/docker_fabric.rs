use crate::docker::auxiliary::DockerAuxiliaryHandler;
use crate::docker::repository::{DockerEngineRepository, DockerRepository};
use crate::docker::service::DockerServiceHandler;
use crate::managers::batch_processor::BatchProcessor;
use crate::managers::batch_reporter::LogReporter;
use crate::managers::command_executor::DockerCommandExecutor;
use crate::managers::retry_policy::create_retry_policy;
use anyhow::anyhow;
use bollard::{Docker, API_DEFAULT_VERSION};
use log::info;
use std::sync::Arc;
use std::time::Duration;

pub struct ExecutionOptions {
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub retry_jitter: f64,
    pub enforce_command_timeout: bool,
    pub netem_image: String,
}

pub fn connect_docker(host: Option<&str>, timeout_secs: u64) -> Result<Docker, anyhow::Error> {
    let client = match host {
        None => Docker::connect_with_local_defaults()?.with_timeout(Duration::from_secs(timeout_secs)),
        Some(host) if host.starts_with("unix://") || host.starts_with('/') => {
            Docker::connect_with_unix(host, timeout_secs, API_DEFAULT_VERSION)?
        }
        Some(host) if host.starts_with("tcp://") || host.starts_with("http://") => {
            Docker::connect_with_http(host, timeout_secs, API_DEFAULT_VERSION)?
        }
        Some(host) => return Err(anyhow!("Unsupported Docker host: {}", host)),
    };
    Ok(client)
}

/// Assembles the execution stack on top of one Docker client.
pub struct DockerFabric {
    client: Docker,
    repository: Arc<dyn DockerRepository + Send + Sync>,
}

impl DockerFabric {
    pub fn new(host: Option<&str>, timeout_secs: u64) -> Result<Self, anyhow::Error> {
        info!(
            "Using Docker Engine at {}.",
            host.unwrap_or("the local default endpoint")
        );
        Ok(Self::with_client(connect_docker(host, timeout_secs)?))
    }

    pub fn with_client(client: Docker) -> Self {
        Self {
            client,
            repository: Arc::new(DockerEngineRepository {}),
        }
    }

    pub fn create_batch_processor(&self, options: ExecutionOptions) -> BatchProcessor {
        let auxiliary = Box::new(DockerAuxiliaryHandler::new(self.repository.clone()));
        let service = Box::new(DockerServiceHandler::new(
            self.client.clone(),
            self.repository.clone(),
            auxiliary,
            options.netem_image,
        ));
        let executor = Arc::new(DockerCommandExecutor::new(
            service,
            options.enforce_command_timeout,
        ));
        BatchProcessor::new(
            executor,
            create_retry_policy(options.retry_delay, options.retry_jitter),
            Box::new(LogReporter {}),
            options.max_retries,
        )
    }
}

use crate::docker::auxiliary::{AuxiliaryError, DockerAuxiliary};
use crate::docker::repository::DockerRepository;
use crate::docker::service::{DockerService, DockerServiceError};
use crate::managers::batch_reporter::{BatchReporter, BatchState, BatchStatus, CommandOutcome};
use crate::managers::command_executor::CommandExecutor;
use crate::managers::command_result::CommandResult;
use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, ListContainersOptions, RemoveContainerOptions,
    UploadToContainerOptions, WaitContainerOptions,
};
use bollard::errors::Error;
use bollard::image::{CreateImageOptions, ListImagesOptions};
use bollard::models::{
    ContainerCreateResponse, ContainerInspectResponse, ContainerSummary, ContainerWaitResponse,
    ImageSummary, Network, NetworkCreateResponse, Volume,
};
use bollard::network::{
    ConnectNetworkOptions, CreateNetworkOptions, DisconnectNetworkOptions, ListNetworksOptions,
};
use bollard::volume::{CreateVolumeOptions, RemoveVolumeOptions};
use bollard::{Docker, API_DEFAULT_VERSION};
use bytes::Bytes;
use command_protocol::payload::{self, Container, ContainerNetwork, File, Netconf, StartContainer, VolumeMount};
use command_protocol::{Command, Order, OrderType, Target};
use mockall::mock;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub fn create_example_docker_client() -> Docker {
    Docker::connect_with_http("http://127.0.0.1:2375", 4, API_DEFAULT_VERSION).unwrap()
}

pub fn create_example_server_error() -> Error {
    Error::DockerResponseServerError {
        status_code: 500,
        message: String::from("server error"),
    }
}

pub fn create_example_network(name: &str, id: &str) -> Network {
    Network {
        name: Some(name.to_string()),
        id: Some(id.to_string()),
        ..Default::default()
    }
}

pub fn create_example_container_spec() -> Container {
    Container {
        name: String::from("tester"),
        image: String::from("alpine"),
        entrypoint: String::from("/bin/sh"),
        args: vec![String::from("-c"), String::from("echo hello")],
        environment: BTreeMap::from([(String::from("FOO"), String::from("BAR"))]),
        labels: HashMap::from([(String::from("owner"), String::from("genesis"))]),
        cpus: String::from("2.5"),
        memory: String::from("5gb"),
        ports: BTreeMap::from([(8888, 8889)]),
        volumes: vec![VolumeMount {
            name: String::from("data"),
            directory: String::from("/data"),
            read_only: true,
        }],
        network: vec![String::from("testnet")],
    }
}

pub fn create_example_command(id: &str, order_type: OrderType, payload: serde_json::Value) -> Command {
    Command {
        id: id.to_string(),
        target: Target {
            ip: String::from("0.0.0.0"),
        },
        order: Order {
            order_type,
            payload,
        },
        timestamp: 0,
        timeout: 0,
    }
}

#[derive(Clone, Default)]
pub struct RecordingReporter {
    states: Arc<Mutex<Vec<BatchState>>>,
    statuses: Arc<Mutex<Vec<BatchStatus>>>,
}

impl RecordingReporter {
    pub fn states(&self) -> Vec<BatchState> {
        self.states.lock().unwrap().clone()
    }

    pub fn statuses(&self) -> Vec<BatchStatus> {
        self.statuses.lock().unwrap().clone()
    }
}

impl BatchReporter for RecordingReporter {
    fn state_changed(&self, _batch_id: &Uuid, state: &BatchState) {
        self.states.lock().unwrap().push(state.clone());
    }

    fn group_attempted(&self, _batch_id: &Uuid, _group: usize, _attempt: u32, _outcomes: &[CommandOutcome]) {}

    fn finished(&self, status: &BatchStatus) {
        self.statuses.lock().unwrap().push(status.clone());
    }
}

mock! {
    pub DockerRepository {}

    #[async_trait]
    impl DockerRepository for DockerRepository {
        async fn container_create(&self, client: &Docker, options: CreateContainerOptions<String>, config: Config<String>) -> Result<ContainerCreateResponse, Error>;
        async fn container_list(&self, client: &Docker, options: ListContainersOptions<String>) -> Result<Vec<ContainerSummary>, Error>;
        async fn container_start(&self, client: &Docker, container: &str) -> Result<(), Error>;
        async fn container_remove(&self, client: &Docker, container: &str, options: RemoveContainerOptions) -> Result<(), Error>;
        async fn container_inspect(&self, client: &Docker, container: &str) -> Result<ContainerInspectResponse, Error>;
        async fn container_wait(&self, client: &Docker, container: &str, options: WaitContainerOptions<String>) -> Result<ContainerWaitResponse, Error>;
        async fn copy_to_container(&self, client: &Docker, container: &str, options: UploadToContainerOptions<String>, archive: Bytes) -> Result<(), Error>;
        async fn network_create(&self, client: &Docker, options: CreateNetworkOptions<String>) -> Result<NetworkCreateResponse, Error>;
        async fn network_list(&self, client: &Docker, options: ListNetworksOptions<String>) -> Result<Vec<Network>, Error>;
        async fn network_remove(&self, client: &Docker, network: &str) -> Result<(), Error>;
        async fn network_connect(&self, client: &Docker, network: &str, options: ConnectNetworkOptions<String>) -> Result<(), Error>;
        async fn network_disconnect(&self, client: &Docker, network: &str, options: DisconnectNetworkOptions<String>) -> Result<(), Error>;
        async fn volume_create(&self, client: &Docker, options: CreateVolumeOptions<String>) -> Result<Volume, Error>;
        async fn volume_remove(&self, client: &Docker, volume: &str, options: RemoveVolumeOptions) -> Result<(), Error>;
        async fn image_list(&self, client: &Docker, options: ListImagesOptions<String>) -> Result<Vec<ImageSummary>, Error>;
        async fn image_pull(&self, client: &Docker, options: CreateImageOptions<'static, String>) -> Result<(), Error>;
    }
}

mock! {
    pub DockerAuxiliary {}

    #[async_trait]
    impl DockerAuxiliary for DockerAuxiliary {
        async fn ensure_image_pulled(&self, client: &Docker, image: &str) -> Result<(), AuxiliaryError>;
        async fn get_container_by_name(&self, client: &Docker, name: &str) -> Result<ContainerSummary, AuxiliaryError>;
        async fn get_network_by_name(&self, client: &Docker, name: &str) -> Result<Network, AuxiliaryError>;
    }
}

mock! {
    pub DockerService {}

    #[async_trait]
    impl DockerService for DockerService {
        async fn create_container(&self, spec: Container) -> Result<(), DockerServiceError>;
        async fn start_container(&self, spec: StartContainer) -> Result<(), DockerServiceError>;
        async fn remove_container(&self, name: &str) -> Result<(), DockerServiceError>;
        async fn create_network(&self, spec: payload::Network) -> Result<(), DockerServiceError>;
        async fn remove_network(&self, name: &str) -> Result<(), DockerServiceError>;
        async fn create_volume(&self, spec: payload::Volume) -> Result<(), DockerServiceError>;
        async fn remove_volume(&self, name: &str) -> Result<(), DockerServiceError>;
        async fn attach_network(&self, spec: ContainerNetwork) -> Result<(), DockerServiceError>;
        async fn detach_network(&self, spec: ContainerNetwork) -> Result<(), DockerServiceError>;
        async fn pull_image(&self, image: &str) -> Result<(), DockerServiceError>;
        async fn place_file_in_container(&self, container: &str, file: File) -> Result<(), DockerServiceError>;
        async fn emulate(&self, netconf: Netconf) -> Result<(), DockerServiceError>;
    }
}

mock! {
    pub CommandExecutor {}

    #[async_trait]
    impl CommandExecutor for CommandExecutor {
        async fn execute(&self, command: Command) -> CommandResult;
    }
}

use super::archive::{single_file_archive, split_destination};
use super::auxiliary::{AuxiliaryError, DockerAuxiliary};
use super::emulation::netem_script;
use super::repository::DockerRepository;
use super::resources::{parse_cpus, parse_memory};
use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, NetworkingConfig, RemoveContainerOptions,
    UploadToContainerOptions, WaitContainerOptions,
};
use bollard::errors::Error as BollardError;
use bollard::models::{EndpointSettings, HostConfig, Ipam, IpamConfig, Mount, MountTypeEnum, PortBinding};
use bollard::network::{ConnectNetworkOptions, CreateNetworkOptions, DisconnectNetworkOptions};
use bollard::volume::{CreateVolumeOptions, RemoveVolumeOptions};
use bollard::Docker;
use bytes::Bytes;
use command_protocol::payload::{
    Container, ContainerNetwork, File, Netconf, Network, StartContainer, Volume,
};
use ipnet::IpNet;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, PartialEq, Clone)]
pub enum DockerServiceError {
    #[error("Resource not found: {0}")]
    NotFound(String),
    #[error("Ambiguous name: {0}")]
    AmbiguousName(String),
    #[error("Invalid resource: {0}")]
    InvalidResource(String),
    #[error("Invalid network spec: {0}")]
    InvalidNetworkSpec(String),
    #[error("Invalid file spec: {0}")]
    InvalidFileSpec(String),
    #[error("Invalid emulation spec: {0}")]
    InvalidEmulationSpec(String),
    #[error("Container '{0}' exited with status {1}.")]
    NonZeroExit(String, i64),
    #[error("Docker request failed: {0}")]
    Backend(String),
}

impl DockerServiceError {
    /// Fatal errors cannot be fixed by running the command again.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, DockerServiceError::Backend(_))
    }
}

impl From<AuxiliaryError> for DockerServiceError {
    fn from(err: AuxiliaryError) -> Self {
        match err {
            AuxiliaryError::NoSuchContainer(_) | AuxiliaryError::NoSuchNetwork(_) => {
                DockerServiceError::NotFound(err.to_string())
            }
            AuxiliaryError::AmbiguousNetwork(_) => DockerServiceError::AmbiguousName(err.to_string()),
            AuxiliaryError::Backend(message) => DockerServiceError::Backend(message),
        }
    }
}

fn backend(err: BollardError) -> DockerServiceError {
    DockerServiceError::Backend(err.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NetworkTopology {
    Swarm,
    Local,
}

impl NetworkTopology {
    pub fn new(global: bool) -> Self {
        if global {
            NetworkTopology::Swarm
        } else {
            NetworkTopology::Local
        }
    }

    pub fn driver(&self) -> &'static str {
        match self {
            NetworkTopology::Swarm => "overlay",
            NetworkTopology::Local => "bridge",
        }
    }

    /// The engine derives the scope from the driver.
    pub fn scope(&self) -> &'static str {
        match self {
            NetworkTopology::Swarm => "swarm",
            NetworkTopology::Local => "local",
        }
    }
}

const BRIDGE_NAME_OPTION: &str = "com.docker.network.bridge.name";
const ANY_HOST_IP: &str = "0.0.0.0";

pub fn container_config(
    spec: &Container,
    first_network: Option<(&str, &str)>,
) -> Result<Config<String>, DockerServiceError> {
    let nano_cpus = parse_cpus(&spec.cpus)
        .map_err(|err| DockerServiceError::InvalidResource(err.to_string()))?;
    let memory = parse_memory(&spec.memory)
        .map_err(|err| DockerServiceError::InvalidResource(err.to_string()))?;

    let (entrypoint, cmd) = if spec.entrypoint.is_empty() {
        (None, (!spec.args.is_empty()).then(|| spec.args.clone()))
    } else {
        let mut entrypoint = vec![spec.entrypoint.clone()];
        entrypoint.extend(spec.args.iter().cloned());
        (Some(entrypoint), None)
    };

    let mut exposed_ports = HashMap::new();
    let mut port_bindings: HashMap<String, Option<Vec<PortBinding>>> = HashMap::new();
    for (host_port, container_port) in &spec.ports {
        let key = format!("{}/tcp", container_port);
        exposed_ports.insert(key.clone(), HashMap::new());
        port_bindings
            .entry(key)
            .or_insert_with(|| Some(vec![]))
            .get_or_insert_with(Vec::new)
            .push(PortBinding {
                host_ip: Some(ANY_HOST_IP.to_string()),
                host_port: Some(host_port.to_string()),
            });
    }

    let mounts = spec
        .volumes
        .iter()
        .map(|volume| Mount {
            source: Some(volume.name.clone()),
            target: Some(volume.directory.clone()),
            typ: Some(MountTypeEnum::VOLUME),
            read_only: Some(volume.read_only),
            ..Default::default()
        })
        .collect();

    let networking_config = first_network.map(|(name, id)| NetworkingConfig {
        endpoints_config: HashMap::from([(
            name.to_string(),
            EndpointSettings {
                network_id: Some(id.to_string()),
                ..Default::default()
            },
        )]),
    });

    Ok(Config {
        hostname: Some(spec.name.clone()),
        image: Some(spec.image.clone()),
        entrypoint,
        cmd,
        env: Some(
            spec.environment
                .iter()
                .map(|(key, value)| format!("{}={}", key, value))
                .collect(),
        ),
        labels: Some(spec.labels.clone()),
        exposed_ports: Some(exposed_ports),
        host_config: Some(HostConfig {
            nano_cpus,
            memory,
            port_bindings: Some(port_bindings),
            mounts: Some(mounts),
            auto_remove: Some(true),
            ..Default::default()
        }),
        networking_config,
        ..Default::default()
    })
}

fn network_ipam(spec: &Network) -> Result<Ipam, DockerServiceError> {
    let invalid = |reason: String| DockerServiceError::InvalidNetworkSpec(reason);
    let config = match (spec.subnet.is_empty(), spec.gateway.is_empty()) {
        (true, true) => None,
        (true, false) => return Err(invalid(format!("gateway {} without a subnet", spec.gateway))),
        (false, _) => {
            let subnet: IpNet = spec
                .subnet
                .parse()
                .map_err(|_| invalid(format!("subnet '{}' is not a CIDR", spec.subnet)))?;
            let gateway = if spec.gateway.is_empty() {
                None
            } else {
                let gateway: IpAddr = spec
                    .gateway
                    .parse()
                    .map_err(|_| invalid(format!("gateway '{}' is not an address", spec.gateway)))?;
                if !subnet.contains(&gateway) {
                    return Err(invalid(format!(
                        "gateway {} is outside of {}",
                        gateway, subnet
                    )));
                }
                Some(spec.gateway.clone())
            };
            Some(vec![IpamConfig {
                subnet: Some(spec.subnet.clone()),
                gateway,
                ..Default::default()
            }])
        }
    };
    Ok(Ipam {
        driver: Some(String::from("default")),
        config,
        options: None,
    })
}

pub fn network_options(spec: &Network) -> Result<CreateNetworkOptions<String>, DockerServiceError> {
    let topology = NetworkTopology::new(spec.global);
    let mut options = HashMap::new();
    if topology == NetworkTopology::Local {
        options.insert(BRIDGE_NAME_OPTION.to_string(), spec.name.clone());
    }
    Ok(CreateNetworkOptions {
        name: spec.name.clone(),
        check_duplicate: true,
        driver: topology.driver().to_string(),
        attachable: true,
        ipam: network_ipam(spec)?,
        options,
        labels: spec.labels.clone(),
        ..Default::default()
    })
}

fn sidecar_config(image: &str, target_container_id: &str, script: String) -> Config<String> {
    Config {
        image: Some(image.to_string()),
        entrypoint: Some(vec![String::from("sh"), String::from("-c")]),
        cmd: Some(vec![script]),
        host_config: Some(HostConfig {
            network_mode: Some(format!("container:{}", target_container_id)),
            cap_add: Some(vec![String::from("NET_ADMIN")]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[async_trait]
pub trait DockerService {
    async fn create_container(&self, spec: Container) -> Result<(), DockerServiceError>;
    async fn start_container(&self, spec: StartContainer) -> Result<(), DockerServiceError>;
    async fn remove_container(&self, name: &str) -> Result<(), DockerServiceError>;
    async fn create_network(&self, spec: Network) -> Result<(), DockerServiceError>;
    async fn remove_network(&self, name: &str) -> Result<(), DockerServiceError>;
    async fn create_volume(&self, spec: Volume) -> Result<(), DockerServiceError>;
    async fn remove_volume(&self, name: &str) -> Result<(), DockerServiceError>;
    async fn attach_network(&self, spec: ContainerNetwork) -> Result<(), DockerServiceError>;
    async fn detach_network(&self, spec: ContainerNetwork) -> Result<(), DockerServiceError>;
    async fn pull_image(&self, image: &str) -> Result<(), DockerServiceError>;
    async fn place_file_in_container(
        &self,
        container: &str,
        file: File,
    ) -> Result<(), DockerServiceError>;
    async fn emulate(&self, netconf: Netconf) -> Result<(), DockerServiceError>;
}

pub struct DockerServiceHandler {
    client: Docker,
    repository: Arc<dyn DockerRepository + Send + Sync>,
    auxiliary: Box<dyn DockerAuxiliary + Send + Sync>,
    emulation_image: String,
}

impl DockerServiceHandler {
    pub fn new(
        client: Docker,
        repository: Arc<dyn DockerRepository + Send + Sync>,
        auxiliary: Box<dyn DockerAuxiliary + Send + Sync>,
        emulation_image: String,
    ) -> Self {
        Self {
            client,
            repository,
            auxiliary,
            emulation_image,
        }
    }

    async fn container_id(&self, name: &str) -> Result<String, DockerServiceError> {
        self.auxiliary
            .get_container_by_name(&self.client, name)
            .await?
            .id
            .ok_or_else(|| DockerServiceError::Backend(format!("Container '{}' has no id.", name)))
    }

    async fn network_id(&self, name: &str) -> Result<String, DockerServiceError> {
        self.auxiliary
            .get_network_by_name(&self.client, name)
            .await?
            .id
            .ok_or_else(|| DockerServiceError::Backend(format!("Network '{}' has no id.", name)))
    }

    async fn wait_for_exit(&self, name: &str, id: &str) -> Result<(), DockerServiceError> {
        let options = WaitContainerOptions {
            condition: String::from("not-running"),
        };
        match self
            .repository
            .container_wait(&self.client, id, options)
            .await
        {
            Ok(response) if response.status_code == 0 => Ok(()),
            Ok(response) => Err(DockerServiceError::NonZeroExit(
                name.to_string(),
                response.status_code,
            )),
            Err(BollardError::DockerContainerWaitError { code, .. }) => {
                Err(DockerServiceError::NonZeroExit(name.to_string(), code))
            }
            Err(BollardError::DockerResponseServerError {
                status_code: 404, ..
            }) => {
                warn!("Container {} was removed before its exit status was read.", name);
                Ok(())
            }
            Err(err) => Err(backend(err)),
        }
    }

    async fn mac_address_on_network(
        &self,
        container_id: &str,
        network_name: &str,
        network_id: &str,
    ) -> Result<String, DockerServiceError> {
        let inspected = self
            .repository
            .container_inspect(&self.client, container_id)
            .await
            .map_err(backend)?;
        inspected
            .network_settings
            .and_then(|settings| settings.networks)
            .and_then(|networks| {
                networks.into_iter().find_map(|(name, endpoint)| {
                    (name == network_name || endpoint.network_id.as_deref() == Some(network_id))
                        .then_some(endpoint.mac_address)
                        .flatten()
                })
            })
            .filter(|mac| !mac.is_empty())
            .ok_or_else(|| {
                DockerServiceError::NotFound(format!(
                    "Container '{}' has no endpoint on network '{}'.",
                    container_id, network_name
                ))
            })
    }
}

#[async_trait]
impl DockerService for DockerServiceHandler {
    async fn create_container(&self, spec: Container) -> Result<(), DockerServiceError> {
        match self
            .auxiliary
            .get_container_by_name(&self.client, &spec.name)
            .await
        {
            Ok(_) => {
                info!("Container {} already exists.", spec.name);
                return Ok(());
            }
            Err(AuxiliaryError::NoSuchContainer(_)) => {}
            Err(err) => return Err(err.into()),
        }
        self.auxiliary
            .ensure_image_pulled(&self.client, &spec.image)
            .await?;

        let mut network_ids = Vec::with_capacity(spec.network.len());
        for network in &spec.network {
            network_ids.push(self.network_id(network).await?);
        }
        let first_network = spec
            .network
            .first()
            .zip(network_ids.first())
            .map(|(name, id)| (name.as_str(), id.as_str()));
        let config = container_config(&spec, first_network)?;

        let created = self
            .repository
            .container_create(
                &self.client,
                CreateContainerOptions {
                    name: spec.name.clone(),
                    platform: None,
                },
                config,
            )
            .await
            .map_err(backend)?;
        for warning in created.warnings {
            warn!("Container {}: {}", spec.name, warning);
        }
        info!("Created container {} ({}).", spec.name, created.id);
        Ok(())
    }

    async fn start_container(&self, spec: StartContainer) -> Result<(), DockerServiceError> {
        let id = self.container_id(&spec.name).await?;
        self.repository
            .container_start(&self.client, &id)
            .await
            .map_err(backend)?;
        info!("Started container {}.", spec.name);
        if spec.attach {
            self.wait_for_exit(&spec.name, &id).await?;
            info!("Container {} exited successfully.", spec.name);
        }
        Ok(())
    }

    async fn remove_container(&self, name: &str) -> Result<(), DockerServiceError> {
        let id = self.container_id(name).await?;
        self.repository
            .container_remove(
                &self.client,
                &id,
                RemoveContainerOptions {
                    force: true,
                    v: false,
                    link: false,
                },
            )
            .await
            .map_err(backend)?;
        info!("Removed container {}.", name);
        Ok(())
    }

    async fn create_network(&self, spec: Network) -> Result<(), DockerServiceError> {
        let topology = NetworkTopology::new(spec.global);
        let options = network_options(&spec)?;
        match self
            .auxiliary
            .get_network_by_name(&self.client, &spec.name)
            .await
        {
            Ok(_) => {
                info!("Network {} already exists.", spec.name);
                return Ok(());
            }
            Err(AuxiliaryError::NoSuchNetwork(_)) => {}
            Err(err) => return Err(err.into()),
        }
        let created = self
            .repository
            .network_create(&self.client, options)
            .await
            .map_err(backend)?;
        if !created.warning.is_empty() {
            warn!("Network {}: {}", spec.name, created.warning);
        }
        info!(
            "Created {} network {} with {} driver ({}).",
            topology.scope(),
            spec.name,
            topology.driver(),
            created.id
        );
        Ok(())
    }

    async fn remove_network(&self, name: &str) -> Result<(), DockerServiceError> {
        let id = self.network_id(name).await?;
        self.repository
            .network_remove(&self.client, &id)
            .await
            .map_err(backend)?;
        info!("Removed network {}.", name);
        Ok(())
    }

    async fn create_volume(&self, spec: Volume) -> Result<(), DockerServiceError> {
        self.repository
            .volume_create(
                &self.client,
                CreateVolumeOptions {
                    name: spec.name.clone(),
                    labels: spec.labels,
                    ..Default::default()
                },
            )
            .await
            .map_err(backend)?;
        info!("Created volume {}.", spec.name);
        Ok(())
    }

    async fn remove_volume(&self, name: &str) -> Result<(), DockerServiceError> {
        self.repository
            .volume_remove(&self.client, name, RemoveVolumeOptions { force: true })
            .await
            .map_err(backend)?;
        info!("Removed volume {}.", name);
        Ok(())
    }

    async fn attach_network(&self, spec: ContainerNetwork) -> Result<(), DockerServiceError> {
        let network_id = self.network_id(&spec.network).await?;
        let container_id = self.container_id(&spec.container).await?;
        self.repository
            .network_connect(
                &self.client,
                &network_id,
                ConnectNetworkOptions {
                    container: container_id,
                    endpoint_config: EndpointSettings {
                        network_id: Some(network_id.clone()),
                        ..Default::default()
                    },
                },
            )
            .await
            .map_err(backend)?;
        info!("Attached {} to network {}.", spec.container, spec.network);
        Ok(())
    }

    async fn detach_network(&self, spec: ContainerNetwork) -> Result<(), DockerServiceError> {
        let network_id = self.network_id(&spec.network).await?;
        let container_id = self.container_id(&spec.container).await?;
        self.repository
            .network_disconnect(
                &self.client,
                &network_id,
                DisconnectNetworkOptions {
                    container: container_id,
                    force: true,
                },
            )
            .await
            .map_err(backend)?;
        info!("Detached {} from network {}.", spec.container, spec.network);
        Ok(())
    }

    async fn pull_image(&self, image: &str) -> Result<(), DockerServiceError> {
        Ok(self.auxiliary.ensure_image_pulled(&self.client, image).await?)
    }

    async fn place_file_in_container(
        &self,
        container: &str,
        file: File,
    ) -> Result<(), DockerServiceError> {
        let (directory, file_name) = split_destination(&file.destination)
            .map_err(|err| DockerServiceError::InvalidFileSpec(err.to_string()))?;
        let archive = single_file_archive(&file_name, file.mode, &file.data)
            .map_err(|err| DockerServiceError::InvalidFileSpec(err.to_string()))?;
        let id = self.container_id(container).await?;

        debug!(
            "Uploading {} bytes to {}:{}.",
            file.data.len(),
            container,
            file.destination
        );
        self.repository
            .copy_to_container(
                &self.client,
                &id,
                UploadToContainerOptions {
                    path: directory,
                    no_overwrite_dir_non_dir: String::from("true"),
                },
                Bytes::from(archive),
            )
            .await
            .map_err(backend)
    }

    async fn emulate(&self, netconf: Netconf) -> Result<(), DockerServiceError> {
        let container_id = self.container_id(&netconf.container).await?;
        let network_id = self.network_id(&netconf.network).await?;
        let mac_address = self
            .mac_address_on_network(&container_id, &netconf.network, &network_id)
            .await?;
        let script = netem_script(&netconf, &mac_address)
            .map_err(|err| DockerServiceError::InvalidEmulationSpec(err.to_string()))?;

        self.auxiliary
            .ensure_image_pulled(&self.client, &self.emulation_image)
            .await?;
        let sidecar_name = format!("{}-netem-{}", netconf.container, Uuid::new_v4().simple());
        let sidecar = self
            .repository
            .container_create(
                &self.client,
                CreateContainerOptions {
                    name: sidecar_name.clone(),
                    platform: None,
                },
                sidecar_config(&self.emulation_image, &container_id, script),
            )
            .await
            .map_err(backend)?;

        let applied = match self
            .repository
            .container_start(&self.client, &sidecar.id)
            .await
        {
            Ok(()) => self.wait_for_exit(&sidecar_name, &sidecar.id).await,
            Err(err) => Err(backend(err)),
        };
        if let Err(err) = self
            .repository
            .container_remove(
                &self.client,
                &sidecar.id,
                RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                },
            )
            .await
        {
            warn!("Failed to remove sidecar {}: {}", sidecar_name, err);
        }

        applied?;
        info!(
            "Applied network emulation to {} on {}.",
            netconf.container, netconf.network
        );
        Ok(())
    }
}

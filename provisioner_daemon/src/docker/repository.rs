use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, ListContainersOptions,
    RemoveContainerOptions, StartContainerOptions, UploadToContainerOptions,
    WaitContainerOptions,
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
use bollard::Docker;
use bytes::Bytes;
use futures_util::TryStreamExt;

/// One Docker Engine call per method. Options arrive fully built and
/// errors are returned exactly as the engine reported them.
#[async_trait]
pub trait DockerRepository {
    async fn container_create(
        &self,
        client: &Docker,
        options: CreateContainerOptions<String>,
        config: Config<String>,
    ) -> Result<ContainerCreateResponse, Error>;
    async fn container_list(
        &self,
        client: &Docker,
        options: ListContainersOptions<String>,
    ) -> Result<Vec<ContainerSummary>, Error>;
    async fn container_start(&self, client: &Docker, container: &str) -> Result<(), Error>;
    async fn container_remove(
        &self,
        client: &Docker,
        container: &str,
        options: RemoveContainerOptions,
    ) -> Result<(), Error>;
    async fn container_inspect(
        &self,
        client: &Docker,
        container: &str,
    ) -> Result<ContainerInspectResponse, Error>;
    async fn container_wait(
        &self,
        client: &Docker,
        container: &str,
        options: WaitContainerOptions<String>,
    ) -> Result<ContainerWaitResponse, Error>;
    async fn copy_to_container(
        &self,
        client: &Docker,
        container: &str,
        options: UploadToContainerOptions<String>,
        archive: Bytes,
    ) -> Result<(), Error>;
    async fn network_create(
        &self,
        client: &Docker,
        options: CreateNetworkOptions<String>,
    ) -> Result<NetworkCreateResponse, Error>;
    async fn network_list(
        &self,
        client: &Docker,
        options: ListNetworksOptions<String>,
    ) -> Result<Vec<Network>, Error>;
    async fn network_remove(&self, client: &Docker, network: &str) -> Result<(), Error>;
    async fn network_connect(
        &self,
        client: &Docker,
        network: &str,
        options: ConnectNetworkOptions<String>,
    ) -> Result<(), Error>;
    async fn network_disconnect(
        &self,
        client: &Docker,
        network: &str,
        options: DisconnectNetworkOptions<String>,
    ) -> Result<(), Error>;
    async fn volume_create(
        &self,
        client: &Docker,
        options: CreateVolumeOptions<String>,
    ) -> Result<Volume, Error>;
    async fn volume_remove(
        &self,
        client: &Docker,
        volume: &str,
        options: RemoveVolumeOptions,
    ) -> Result<(), Error>;
    async fn image_list(
        &self,
        client: &Docker,
        options: ListImagesOptions<String>,
    ) -> Result<Vec<ImageSummary>, Error>;
    async fn image_pull(
        &self,
        client: &Docker,
        options: CreateImageOptions<'static, String>,
    ) -> Result<(), Error>;
}

pub struct DockerEngineRepository {}

#[async_trait]
impl DockerRepository for DockerEngineRepository {
    async fn container_create(
        &self,
        client: &Docker,
        options: CreateContainerOptions<String>,
        config: Config<String>,
    ) -> Result<ContainerCreateResponse, Error> {
        client.create_container(Some(options), config).await
    }

    async fn container_list(
        &self,
        client: &Docker,
        options: ListContainersOptions<String>,
    ) -> Result<Vec<ContainerSummary>, Error> {
        client.list_containers(Some(options)).await
    }

    async fn container_start(&self, client: &Docker, container: &str) -> Result<(), Error> {
        client
            .start_container(container, None::<StartContainerOptions<String>>)
            .await
    }

    async fn container_remove(
        &self,
        client: &Docker,
        container: &str,
        options: RemoveContainerOptions,
    ) -> Result<(), Error> {
        client.remove_container(container, Some(options)).await
    }

    async fn container_inspect(
        &self,
        client: &Docker,
        container: &str,
    ) -> Result<ContainerInspectResponse, Error> {
        client
            .inspect_container(container, None::<InspectContainerOptions>)
            .await
    }

    async fn container_wait(
        &self,
        client: &Docker,
        container: &str,
        options: WaitContainerOptions<String>,
    ) -> Result<ContainerWaitResponse, Error> {
        let mut responses: Vec<ContainerWaitResponse> = client
            .wait_container(container, Some(options))
            .try_collect()
            .await?;
        Ok(responses.pop().unwrap_or_default())
    }

    async fn copy_to_container(
        &self,
        client: &Docker,
        container: &str,
        options: UploadToContainerOptions<String>,
        archive: Bytes,
    ) -> Result<(), Error> {
        client
            .upload_to_container(container, Some(options), archive)
            .await
    }

    async fn network_create(
        &self,
        client: &Docker,
        options: CreateNetworkOptions<String>,
    ) -> Result<NetworkCreateResponse, Error> {
        client.create_network(options).await
    }

    async fn network_list(
        &self,
        client: &Docker,
        options: ListNetworksOptions<String>,
    ) -> Result<Vec<Network>, Error> {
        client.list_networks(Some(options)).await
    }

    async fn network_remove(&self, client: &Docker, network: &str) -> Result<(), Error> {
        client.remove_network(network).await
    }

    async fn network_connect(
        &self,
        client: &Docker,
        network: &str,
        options: ConnectNetworkOptions<String>,
    ) -> Result<(), Error> {
        client.connect_network(network, options).await
    }

    async fn network_disconnect(
        &self,
        client: &Docker,
        network: &str,
        options: DisconnectNetworkOptions<String>,
    ) -> Result<(), Error> {
        client.disconnect_network(network, options).await
    }

    async fn volume_create(
        &self,
        client: &Docker,
        options: CreateVolumeOptions<String>,
    ) -> Result<Volume, Error> {
        client.create_volume(options).await
    }

    async fn volume_remove(
        &self,
        client: &Docker,
        volume: &str,
        options: RemoveVolumeOptions,
    ) -> Result<(), Error> {
        client.remove_volume(volume, Some(options)).await
    }

    async fn image_list(
        &self,
        client: &Docker,
        options: ListImagesOptions<String>,
    ) -> Result<Vec<ImageSummary>, Error> {
        client.list_images(Some(options)).await
    }

    async fn image_pull(
        &self,
        client: &Docker,
        options: CreateImageOptions<'static, String>,
    ) -> Result<(), Error> {
        client
            .create_image(Some(options), None, None)
            .try_for_each(|_| async { Ok(()) })
            .await
    }
}

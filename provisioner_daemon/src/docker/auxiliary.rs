use super::repository::DockerRepository;
use async_trait::async_trait;
use bollard::container::ListContainersOptions;
use bollard::image::{CreateImageOptions, ListImagesOptions};
use bollard::models::{ContainerSummary, ImageSummary, Network};
use bollard::network::ListNetworksOptions;
use bollard::Docker;
use log::{debug, info};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Clone)]
pub enum AuxiliaryError {
    #[error("No container named '{0}'.")]
    NoSuchContainer(String),
    #[error("No network named '{0}'.")]
    NoSuchNetwork(String),
    #[error("More than one network named '{0}'.")]
    AmbiguousNetwork(String),
    #[error("Docker request failed: {0}")]
    Backend(String),
}

#[async_trait]
pub trait DockerAuxiliary {
    /// Pulls `image` unless a local copy already exists.
    async fn ensure_image_pulled(&self, client: &Docker, image: &str)
        -> Result<(), AuxiliaryError>;
    async fn get_container_by_name(
        &self,
        client: &Docker,
        name: &str,
    ) -> Result<ContainerSummary, AuxiliaryError>;
    async fn get_network_by_name(
        &self,
        client: &Docker,
        name: &str,
    ) -> Result<Network, AuxiliaryError>;
}

pub struct DockerAuxiliaryHandler {
    repository: Arc<dyn DockerRepository + Send + Sync>,
}

impl DockerAuxiliaryHandler {
    pub fn new(repository: Arc<dyn DockerRepository + Send + Sync>) -> Self {
        Self { repository }
    }

    fn backend_error(err: bollard::errors::Error) -> AuxiliaryError {
        AuxiliaryError::Backend(err.to_string())
    }

    fn name_filter(name: &str) -> HashMap<String, Vec<String>> {
        HashMap::from([(String::from("name"), vec![name.to_string()])])
    }
}

/// Splits an image reference into the `fromImage` and `tag` values of a
/// pull request. Untagged references pull `latest` instead of every tag.
pub fn split_image_reference(image: &str) -> (String, String) {
    if image.contains('@') {
        return (image.to_string(), String::new());
    }
    let name_start = image.rfind('/').map(|i| i + 1).unwrap_or(0);
    match image[name_start..].rfind(':') {
        Some(i) => (
            image[..name_start + i].to_string(),
            image[name_start + i + 1..].to_string(),
        ),
        None => (image.to_string(), String::from("latest")),
    }
}

/// A local image satisfies `image` only when one of its repo tags is the
/// normalised reference, or for digest references one of its repo digests.
pub fn image_is_present(local_images: &[ImageSummary], image: &str) -> bool {
    let (from_image, tag) = split_image_reference(image);
    if tag.is_empty() {
        return local_images
            .iter()
            .any(|summary| summary.repo_digests.iter().any(|digest| digest == image));
    }
    let reference = format!("{}:{}", from_image, tag);
    local_images
        .iter()
        .any(|summary| summary.repo_tags.iter().any(|repo_tag| *repo_tag == reference))
}

#[async_trait]
impl DockerAuxiliary for DockerAuxiliaryHandler {
    async fn ensure_image_pulled(
        &self,
        client: &Docker,
        image: &str,
    ) -> Result<(), AuxiliaryError> {
        let local_images = self
            .repository
            .image_list(
                client,
                ListImagesOptions {
                    all: false,
                    filters: HashMap::from([(String::from("reference"), vec![image.to_string()])]),
                    ..Default::default()
                },
            )
            .await
            .map_err(Self::backend_error)?;
        if image_is_present(&local_images, image) {
            debug!("Image {} is already present.", image);
            return Ok(());
        }

        let (from_image, tag) = split_image_reference(image);
        info!("Pulling image {}.", image);
        self.repository
            .image_pull(
                client,
                CreateImageOptions {
                    from_image,
                    tag,
                    ..Default::default()
                },
            )
            .await
            .map_err(Self::backend_error)
    }

    async fn get_container_by_name(
        &self,
        client: &Docker,
        name: &str,
    ) -> Result<ContainerSummary, AuxiliaryError> {
        let containers = self
            .repository
            .container_list(
                client,
                ListContainersOptions {
                    all: true,
                    filters: Self::name_filter(name),
                    ..Default::default()
                },
            )
            .await
            .map_err(Self::backend_error)?;

        containers
            .into_iter()
            .find(|container| {
                container
                    .names
                    .iter()
                    .flatten()
                    .any(|candidate| candidate.trim_start_matches('/') == name)
            })
            .ok_or_else(|| AuxiliaryError::NoSuchContainer(name.to_string()))
    }

    async fn get_network_by_name(
        &self,
        client: &Docker,
        name: &str,
    ) -> Result<Network, AuxiliaryError> {
        let mut networks: Vec<Network> = self
            .repository
            .network_list(
                client,
                ListNetworksOptions {
                    filters: Self::name_filter(name),
                },
            )
            .await
            .map_err(Self::backend_error)?
            .into_iter()
            .filter(|network| network.name.as_deref() == Some(name))
            .collect();

        match networks.len() {
            0 => Err(AuxiliaryError::NoSuchNetwork(name.to_string())),
            1 => Ok(networks.remove(0)),
            _ => Err(AuxiliaryError::AmbiguousNetwork(name.to_string())),
        }
    }
}

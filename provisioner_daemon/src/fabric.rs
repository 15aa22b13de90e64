pub mod docker_fabric;

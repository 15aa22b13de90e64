use clap::Parser;
use command_protocol::Instructions;
use nix::{
    sys::signal::{self, Signal::SIGINT},
    unistd::Pid,
};
use provisioner_daemon::cli::Cli;
use provisioner_daemon::fabric::docker_fabric::{DockerFabric, ExecutionOptions};
use provisioner_daemon::managers::batch_processor::BatchProcessor;
use serde_json::Value;
use std::env;
use std::time::Duration;
use uuid::Uuid;

const DOCKER_HOST_ENV: &str = "DOCKER_HOST";

#[allow(dead_code)]
pub fn create_example_cli() -> Cli {
    let mut args = vec![
        "provisioner_daemon".to_string(),
        "--listen-address".to_string(),
        "127.0.0.1:0".to_string(),
    ];
    if let Ok(host) = env::var(DOCKER_HOST_ENV) {
        args.push("--docker-host".to_string());
        args.push(host);
    }
    Cli::try_parse_from(args).unwrap()
}

#[allow(dead_code)]
pub fn create_example_processor(max_retries: u32) -> BatchProcessor {
    let fabric = DockerFabric::new(env::var(DOCKER_HOST_ENV).ok().as_deref(), 120).unwrap();
    fabric.create_batch_processor(ExecutionOptions {
        max_retries,
        retry_delay: Duration::from_millis(200),
        retry_jitter: 0.0,
        enforce_command_timeout: true,
        netem_image: "gaiadocker/iproute2".to_string(),
    })
}

/// Short enough to double as a Linux bridge name.
#[allow(dead_code)]
pub fn unique_name(prefix: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", prefix, &suffix[..8])
}

#[allow(dead_code)]
pub fn create_batch(groups: Value) -> Instructions {
    serde_json::from_value(serde_json::json!({ "commands": groups })).unwrap()
}

#[allow(dead_code)]
pub fn request_shutdown() {
    signal::kill(Pid::this(), SIGINT).unwrap();
}

use crate::managers::retry_policy::MAX_JITTER;
use clap::Parser;
use std::net::SocketAddr;

fn parse_jitter(value: &str) -> Result<f64, String> {
    let jitter: f64 = value.parse().map_err(|err| format!("{}", err))?;
    if jitter.is_finite() && (0.0..=MAX_JITTER).contains(&jitter) {
        Ok(jitter)
    } else {
        Err(format!("jitter must be between 0 and {}", MAX_JITTER))
    }
}

#[derive(Parser, Debug, Clone)]
#[command(version, about)]
pub struct Cli {
    #[arg(short, long, env = "PROVISIONER_LISTEN_ADDRESS", default_value = "0.0.0.0:8000")]
    pub listen_address: SocketAddr,
    /// Docker Engine endpoint, e.g. unix:///var/run/docker.sock or tcp://10.0.0.2:2375.
    /// Local defaults are used when absent.
    #[arg(short = 'H', long, env = "PROVISIONER_DOCKER_HOST")]
    pub docker_host: Option<String>,
    #[arg(long, env = "PROVISIONER_DOCKER_TIMEOUT_SECS", default_value_t = 120)]
    pub docker_timeout_secs: u64,
    #[arg(short, long, env = "PROVISIONER_MAX_RETRIES", default_value_t = 4)]
    pub max_retries: u32,
    #[arg(long, env = "PROVISIONER_RETRY_DELAY_MS", default_value_t = 1000)]
    pub retry_delay_ms: u64,
    /// Fraction of the retry delay added at random, 0 disables jitter.
    #[arg(long, env = "PROVISIONER_RETRY_JITTER", value_parser = parse_jitter, default_value_t = 0.0)]
    pub retry_jitter: f64,
    #[arg(long, env = "PROVISIONER_ENFORCE_COMMAND_TIMEOUT")]
    pub enforce_command_timeout: bool,
    /// Image of the sidecar that applies traffic control rules.
    #[arg(long, env = "PROVISIONER_NETEM_IMAGE", default_value_t = String::from("gaiadocker/iproute2"))]
    pub netem_image: String,
    #[arg(long, env = "PROVISIONER_DISPATCHER_CAPACITY", value_parser = clap::value_parser!(u16).range(1..), default_value_t = 64)]
    pub dispatcher_capacity: u16,
    /// Queue ingestion is enabled only when set.
    #[arg(long, env = "PROVISIONER_AMQP_URI")]
    pub amqp_uri: Option<String>,
    #[arg(long, env = "PROVISIONER_AMQP_QUEUE", default_value_t = String::from("commands"))]
    pub amqp_queue: String,
    #[arg(long, env = "PROVISIONER_AMQP_CONSUMER_TAG", default_value_t = String::from("provisioner"))]
    pub amqp_consumer_tag: String,
    #[arg(long, env = "PROVISIONER_AMQP_PREFETCH", default_value_t = 8)]
    pub amqp_prefetch: u16,
}

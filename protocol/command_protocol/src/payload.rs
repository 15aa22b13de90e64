use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VolumeMount {
    pub name: String,
    pub directory: String,
    #[serde(default, rename = "readOnly")]
    pub read_only: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Container {
    pub name: String,
    pub image: String,
    #[serde(default)]
    pub entrypoint: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    /// Fractional cores, e.g. "2.5". Empty means no limit.
    #[serde(default)]
    pub cpus: String,
    /// Human readable size, e.g. "5gb". Empty means no limit.
    #[serde(default)]
    pub memory: String,
    /// Host port to container port.
    #[serde(default)]
    pub ports: BTreeMap<u16, u16>,
    #[serde(default)]
    pub volumes: Vec<VolumeMount>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub network: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Network {
    pub name: String,
    #[serde(default)]
    pub global: bool,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub gateway: String,
    #[serde(default)]
    pub subnet: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Volume {
    pub name: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimpleName {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StartContainer {
    pub name: String,
    /// Wait for the container to exit.
    #[serde(default)]
    pub attach: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerNetwork {
    pub container: String,
    pub network: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PullImage {
    pub image: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct File {
    #[serde(default = "default_file_mode")]
    pub mode: u32,
    /// Absolute path of the file inside the container.
    pub destination: String,
    #[serde(default, with = "base64_data")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileAndContainer {
    pub container: String,
    pub file: File,
}

/// Network impairment applied to one container interface.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Netconf {
    pub container: String,
    pub network: String,
    /// Queue limit in packets.
    pub limit: u32,
    /// Percentage.
    pub loss: f64,
    /// Microseconds.
    pub delay: u64,
    /// tc rate, e.g. "100mbit".
    pub rate: String,
    pub duplicate: f64,
    pub corrupt: f64,
    pub reorder: f64,
}

fn default_file_mode() -> u32 {
    0o644
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

fn one_or_many<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(name) if name.is_empty() => vec![],
        OneOrMany::One(name) => vec![name],
        OneOrMany::Many(names) => names,
    })
}

mod base64_data {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

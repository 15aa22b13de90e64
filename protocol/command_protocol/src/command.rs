use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Operation kinds accepted on the wire. Matching is case-insensitive,
/// so `createContainer` and `createcontainer` name the same operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderType {
    CreateContainer,
    StartContainer,
    RemoveContainer,
    CreateNetwork,
    RemoveNetwork,
    AttachNetwork,
    DetachNetwork,
    CreateVolume,
    RemoveVolume,
    PullImage,
    PutFileInContainer,
    Emulation,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::CreateContainer => "createContainer",
            OrderType::StartContainer => "startContainer",
            OrderType::RemoveContainer => "removeContainer",
            OrderType::CreateNetwork => "createNetwork",
            OrderType::RemoveNetwork => "removeNetwork",
            OrderType::AttachNetwork => "attachNetwork",
            OrderType::DetachNetwork => "detachNetwork",
            OrderType::CreateVolume => "createVolume",
            OrderType::RemoveVolume => "removeVolume",
            OrderType::PullImage => "pullImage",
            OrderType::PutFileInContainer => "putFileInContainer",
            OrderType::Emulation => "emulation",
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "createcontainer" => Ok(OrderType::CreateContainer),
            "startcontainer" => Ok(OrderType::StartContainer),
            "removecontainer" => Ok(OrderType::RemoveContainer),
            "createnetwork" => Ok(OrderType::CreateNetwork),
            "removenetwork" => Ok(OrderType::RemoveNetwork),
            "attachnetwork" => Ok(OrderType::AttachNetwork),
            "detachnetwork" => Ok(OrderType::DetachNetwork),
            "createvolume" => Ok(OrderType::CreateVolume),
            "removevolume" => Ok(OrderType::RemoveVolume),
            "pullimage" => Ok(OrderType::PullImage),
            "putfileincontainer" => Ok(OrderType::PutFileInContainer),
            "emulation" => Ok(OrderType::Emulation),
            other => Err(format!("unknown order type '{}'", other)),
        }
    }
}

impl Serialize for OrderType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for OrderType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        OrderType::from_str(&raw).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Target {
    #[serde(default)]
    pub ip: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    #[serde(rename = "type")]
    pub order_type: OrderType,
    #[serde(default)]
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub target: Target,
    pub order: Order,
    /// Unix time in seconds before which the command is not due.
    #[serde(default)]
    pub timestamp: i64,
    /// Nanoseconds, zero means no limit.
    #[serde(default)]
    pub timeout: i64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum InstructionsRepr {
    Wrapped { commands: Vec<Vec<Command>> },
    Bare(Vec<Vec<Command>>),
}

impl From<InstructionsRepr> for Instructions {
    fn from(repr: InstructionsRepr) -> Self {
        match repr {
            InstructionsRepr::Wrapped { commands } | InstructionsRepr::Bare(commands) => {
                Instructions { commands }
            }
        }
    }
}

/// One batch: groups run in order, commands inside a group run together.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "InstructionsRepr")]
pub struct Instructions {
    pub commands: Vec<Vec<Command>>,
}

impl Instructions {
    pub fn command_count(&self) -> usize {
        self.commands.iter().map(Vec::len).sum()
    }
}

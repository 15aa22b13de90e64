use crate::command::{Order, OrderType};
use crate::payload::{
    Container, ContainerNetwork, FileAndContainer, Netconf, Network, PullImage, SimpleName,
    StartContainer, Volume,
};
use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum PayloadError {
    #[error("malformed payload for '{0}': {1}")]
    Malformed(OrderType, String),
}

/// Decoded form of an [`Order`], one variant per operation kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    CreateContainer(Container),
    StartContainer(StartContainer),
    RemoveContainer(SimpleName),
    CreateNetwork(Network),
    RemoveNetwork(SimpleName),
    AttachNetwork(ContainerNetwork),
    DetachNetwork(ContainerNetwork),
    CreateVolume(Volume),
    RemoveVolume(SimpleName),
    PullImage(PullImage),
    PutFileInContainer(FileAndContainer),
    Emulation(Netconf),
}

impl Order {
    pub fn instruction(&self) -> Result<Instruction, PayloadError> {
        Ok(match self.order_type {
            OrderType::CreateContainer => Instruction::CreateContainer(self.decode()?),
            OrderType::StartContainer => Instruction::StartContainer(self.decode()?),
            OrderType::RemoveContainer => Instruction::RemoveContainer(self.decode()?),
            OrderType::CreateNetwork => Instruction::CreateNetwork(self.decode()?),
            OrderType::RemoveNetwork => Instruction::RemoveNetwork(self.decode()?),
            OrderType::AttachNetwork => Instruction::AttachNetwork(self.decode()?),
            OrderType::DetachNetwork => Instruction::DetachNetwork(self.decode()?),
            OrderType::CreateVolume => Instruction::CreateVolume(self.decode()?),
            OrderType::RemoveVolume => Instruction::RemoveVolume(self.decode()?),
            OrderType::PullImage => Instruction::PullImage(self.decode()?),
            OrderType::PutFileInContainer => Instruction::PutFileInContainer(self.decode()?),
            OrderType::Emulation => Instruction::Emulation(self.decode()?),
        })
    }

    fn decode<T: DeserializeOwned>(&self) -> Result<T, PayloadError> {
        T::deserialize(&self.payload)
            .map_err(|err| PayloadError::Malformed(self.order_type, err.to_string()))
    }
}

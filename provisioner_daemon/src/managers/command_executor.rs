use super::command_result::CommandResult;
use crate::docker::service::{DockerService, DockerServiceError};
use async_trait::async_trait;
use command_protocol::{Command, Instruction};
use log::debug;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[async_trait]
pub trait CommandExecutor {
    async fn execute(&self, command: Command) -> CommandResult;
}

pub struct DockerCommandExecutor {
    service: Box<dyn DockerService + Send + Sync>,
    enforce_timeout: bool,
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as i64)
        .unwrap_or_default()
}

impl DockerCommandExecutor {
    pub fn new(service: Box<dyn DockerService + Send + Sync>, enforce_timeout: bool) -> Self {
        Self {
            service,
            enforce_timeout,
        }
    }

    async fn dispatch(&self, instruction: Instruction) -> Result<(), DockerServiceError> {
        match instruction {
            Instruction::CreateContainer(spec) => self.service.create_container(spec).await,
            Instruction::StartContainer(spec) => self.service.start_container(spec).await,
            Instruction::RemoveContainer(spec) => self.service.remove_container(&spec.name).await,
            Instruction::CreateNetwork(spec) => self.service.create_network(spec).await,
            Instruction::RemoveNetwork(spec) => self.service.remove_network(&spec.name).await,
            Instruction::AttachNetwork(spec) => self.service.attach_network(spec).await,
            Instruction::DetachNetwork(spec) => self.service.detach_network(spec).await,
            Instruction::CreateVolume(spec) => self.service.create_volume(spec).await,
            Instruction::RemoveVolume(spec) => self.service.remove_volume(&spec.name).await,
            Instruction::PullImage(spec) => self.service.pull_image(&spec.image).await,
            Instruction::PutFileInContainer(spec) => {
                self.service
                    .place_file_in_container(&spec.container, spec.file)
                    .await
            }
            Instruction::Emulation(spec) => self.service.emulate(spec).await,
        }
    }
}

#[async_trait]
impl CommandExecutor for DockerCommandExecutor {
    async fn execute(&self, command: Command) -> CommandResult {
        let instruction = match command.order.instruction() {
            Ok(instruction) => instruction,
            Err(err) => return CommandResult::Fatal(err.to_string()),
        };

        let now = unix_now();
        if command.timestamp > now {
            return CommandResult::Error(format!(
                "Command {} is not due for another {}s.",
                command.id,
                command.timestamp - now
            ));
        }
        debug!(
            "Executing command {} ({}).",
            command.id, command.order.order_type
        );

        if self.enforce_timeout && command.timeout > 0 {
            let limit = Duration::from_nanos(command.timeout as u64);
            match tokio::time::timeout(limit, self.dispatch(instruction)).await {
                Ok(result) => result.into(),
                Err(_) => CommandResult::Error(format!(
                    "Command {} timed out after {:?}.",
                    command.id, limit
                )),
            }
        } else {
            self.dispatch(instruction).await.into()
        }
    }
}

use crate::docker::service::DockerServiceError;

/// Outcome of one command. `Error` may succeed when retried, `Fatal` never will.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandResult {
    Success,
    Error(String),
    Fatal(String),
}

impl CommandResult {
    pub fn is_success(&self) -> bool {
        matches!(self, CommandResult::Success)
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, CommandResult::Fatal(_))
    }

    /// Group outcome: any Fatal wins, then any Error, otherwise Success.
    pub fn reduce<'a>(results: impl IntoIterator<Item = &'a CommandResult>) -> CommandResult {
        let mut reduced = CommandResult::Success;
        for result in results {
            match result {
                CommandResult::Fatal(_) => return result.clone(),
                CommandResult::Error(_) if reduced.is_success() => reduced = result.clone(),
                _ => {}
            }
        }
        reduced
    }
}

impl From<Result<(), DockerServiceError>> for CommandResult {
    fn from(result: Result<(), DockerServiceError>) -> Self {
        match result {
            Ok(()) => CommandResult::Success,
            Err(err) if err.is_fatal() => CommandResult::Fatal(err.to_string()),
            Err(err) => CommandResult::Error(err.to_string()),
        }
    }
}

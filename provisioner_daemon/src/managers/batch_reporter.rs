use super::command_result::CommandResult;
use log::{debug, error, info, warn};
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub enum BatchState {
    Pending,
    Running { group: usize, attempt: u32 },
    Retrying { group: usize, attempt: u32, delay: Duration },
    Completed,
    Aborted { group: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutcome {
    pub command_id: String,
    pub result: CommandResult,
}

/// Terminal status of a batch, produced exactly once.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchStatus {
    Completed {
        batch_id: Uuid,
        groups: usize,
    },
    Aborted {
        batch_id: Uuid,
        group: usize,
        attempts: u32,
        reason: CommandResult,
        failed_commands: Vec<String>,
    },
}

impl BatchStatus {
    pub fn batch_id(&self) -> &Uuid {
        match self {
            BatchStatus::Completed { batch_id, .. } | BatchStatus::Aborted { batch_id, .. } => {
                batch_id
            }
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, BatchStatus::Completed { .. })
    }
}

pub trait BatchReporter {
    fn state_changed(&self, batch_id: &Uuid, state: &BatchState);
    fn group_attempted(&self, batch_id: &Uuid, group: usize, attempt: u32, outcomes: &[CommandOutcome]);
    fn finished(&self, status: &BatchStatus);
}

pub struct LogReporter {}

impl BatchReporter for LogReporter {
    fn state_changed(&self, batch_id: &Uuid, state: &BatchState) {
        match state {
            BatchState::Retrying {
                group,
                attempt,
                delay,
            } => warn!(
                "Batch {}: group {} failed on attempt {}, retrying in {:?}.",
                batch_id, group, attempt, delay
            ),
            _ => debug!("Batch {}: {:?}.", batch_id, state),
        }
    }

    fn group_attempted(&self, batch_id: &Uuid, group: usize, attempt: u32, outcomes: &[CommandOutcome]) {
        for outcome in outcomes.iter().filter(|outcome| !outcome.result.is_success()) {
            warn!(
                "Batch {}: group {} attempt {}: command {} returned {:?}.",
                batch_id, group, attempt, outcome.command_id, outcome.result
            );
        }
    }

    fn finished(&self, status: &BatchStatus) {
        match status {
            BatchStatus::Completed { batch_id, groups } => {
                info!("Batch {} completed {} groups.", batch_id, groups)
            }
            BatchStatus::Aborted {
                batch_id,
                group,
                attempts,
                reason,
                failed_commands,
            } => error!(
                "Batch {} aborted at group {} after {} attempts: {:?} (commands {:?}).",
                batch_id, group, attempts, reason, failed_commands
            ),
        }
    }
}

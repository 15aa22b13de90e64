use super::batch_reporter::{BatchReporter, BatchState, BatchStatus, CommandOutcome};
use super::command_executor::CommandExecutor;
use super::command_result::CommandResult;
use super::retry_policy::RetryPolicy;
use command_protocol::{Command, Instructions};
use log::info;
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Runs the groups of a batch in order. Commands of one group run
/// concurrently as their own tasks; a group that ends with a retryable error is run again
/// up to `max_retries` times, anything else aborts the batch.
pub struct BatchProcessor {
    executor: Arc<dyn CommandExecutor + Send + Sync>,
    retry_policy: Box<dyn RetryPolicy + Send + Sync>,
    reporter: Box<dyn BatchReporter + Send + Sync>,
    max_retries: u32,
}

impl BatchProcessor {
    pub fn new(
        executor: Arc<dyn CommandExecutor + Send + Sync>,
        retry_policy: Box<dyn RetryPolicy + Send + Sync>,
        reporter: Box<dyn BatchReporter + Send + Sync>,
        max_retries: u32,
    ) -> Self {
        Self {
            executor,
            retry_policy,
            reporter,
            max_retries,
        }
    }

    pub async fn process(&self, instructions: Instructions) -> BatchStatus {
        let batch_id = Uuid::new_v4();
        let groups = instructions.commands.len();
        info!(
            "Batch {}: {} commands in {} groups.",
            batch_id,
            instructions.command_count(),
            groups
        );
        self.reporter.state_changed(&batch_id, &BatchState::Pending);

        for (group, commands) in instructions.commands.into_iter().enumerate() {
            if let Err(status) = self.process_group(&batch_id, group, commands).await {
                self.reporter
                    .state_changed(&batch_id, &BatchState::Aborted { group });
                self.reporter.finished(&status);
                return status;
            }
        }

        let status = BatchStatus::Completed { batch_id, groups };
        self.reporter.state_changed(&batch_id, &BatchState::Completed);
        self.reporter.finished(&status);
        status
    }

    async fn process_group(
        &self,
        batch_id: &Uuid,
        group: usize,
        commands: Vec<Command>,
    ) -> Result<(), BatchStatus> {
        let mut attempt = 1;
        loop {
            self.reporter
                .state_changed(batch_id, &BatchState::Running { group, attempt });
            let outcomes = self.run_group(&commands).await;
            self.reporter
                .group_attempted(batch_id, group, attempt, &outcomes);

            match CommandResult::reduce(outcomes.iter().map(|outcome| &outcome.result)) {
                CommandResult::Success => return Ok(()),
                CommandResult::Error(_) if attempt <= self.max_retries => {
                    let delay = self.retry_policy.delay(attempt);
                    self.reporter.state_changed(
                        batch_id,
                        &BatchState::Retrying {
                            group,
                            attempt,
                            delay,
                        },
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                reason => {
                    return Err(BatchStatus::Aborted {
                        batch_id: *batch_id,
                        group,
                        attempts: attempt,
                        reason,
                        failed_commands: outcomes
                            .into_iter()
                            .filter(|outcome| !outcome.result.is_success())
                            .map(|outcome| outcome.command_id)
                            .collect(),
                    })
                }
            }
        }
    }

    async fn run_group(&self, commands: &[Command]) -> Vec<CommandOutcome> {
        let tasks: Vec<(String, JoinHandle<CommandResult>)> = commands
            .iter()
            .cloned()
            .map(|command| {
                let executor = self.executor.clone();
                let command_id = command.id.clone();
                (command_id, tokio::spawn(async move { executor.execute(command).await }))
            })
            .collect();

        let mut outcomes = Vec::with_capacity(tasks.len());
        for (command_id, task) in tasks {
            let result = match task.await {
                Ok(result) => result,
                Err(err) => CommandResult::Fatal(format!("Command task failed: {}", err)),
            };
            outcomes.push(CommandOutcome { command_id, result });
        }
        outcomes
    }
}

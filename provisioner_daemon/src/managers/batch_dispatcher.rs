use super::batch_processor::BatchProcessor;
use command_protocol::Instructions;
use log::{debug, info, warn};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::{select, task::JoinSet};
use tokio_util::sync::CancellationToken;

#[derive(Error, Debug, PartialEq)]
pub enum DispatchError {
    #[error("Dispatcher is not accepting batches.")]
    Closed,
}

/// Hands batches from a transport over to the dispatcher.
#[derive(Clone)]
pub struct BatchSubmitter {
    sender: Sender<Instructions>,
}

impl BatchSubmitter {
    pub async fn submit(&self, instructions: Instructions) -> Result<(), DispatchError> {
        self.sender
            .send(instructions)
            .await
            .map_err(|_| DispatchError::Closed)
    }
}

pub fn batch_channel(capacity: usize) -> (BatchSubmitter, Receiver<Instructions>) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    (BatchSubmitter { sender }, receiver)
}

/// Runs every submitted batch as its own task until cancelled, then
/// waits for the batches already running.
pub struct BatchDispatcher {
    processor: Arc<BatchProcessor>,
    receiver: Receiver<Instructions>,
}

impl BatchDispatcher {
    pub fn new(processor: Arc<BatchProcessor>, receiver: Receiver<Instructions>) -> Self {
        Self {
            processor,
            receiver,
        }
    }

    pub async fn run(mut self, token: Arc<CancellationToken>) -> Result<(), DispatchError> {
        info!("Starting batch dispatcher.");
        let mut batches = JoinSet::new();
        loop {
            select! {
                received = self.receiver.recv() => {
                    match received {
                        Some(instructions) => {
                            let processor = self.processor.clone();
                            batches.spawn(async move { processor.process(instructions).await });
                        }
                        None => break,
                    }
                }
                finished = batches.join_next(), if !batches.is_empty() => {
                    debug!("Batch has finished with result: {:?}.", finished);
                }
                _ = token.cancelled() => {
                    break;
                }
            }
        }

        self.receiver.close();
        let mut dropped = 0;
        while self.receiver.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            warn!("Dropped {} batches that never started.", dropped);
        }

        while let Some(finished) = batches.join_next().await {
            debug!("Batch {:?} joined.", finished);
        }
        info!("Batch dispatcher stopped.");
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::managers::batch_processor::BatchProcessor;
    use crate::managers::command_result::CommandResult;
    use crate::managers::retry_policy::FixedBackoff;
    use crate::utils::test_utilities::{
        create_example_command, MockCommandExecutor, RecordingReporter,
    };
    use command_protocol::OrderType;
    use serde_json::json;
    use std::time::Duration;

    fn create_dispatcher(
        executor: MockCommandExecutor,
        reporter: RecordingReporter,
    ) -> (BatchDispatcher, BatchSubmitter) {
        let processor = Arc::new(BatchProcessor::new(
            Arc::new(executor),
            Box::new(FixedBackoff::new(Duration::ZERO)),
            Box::new(reporter),
            0,
        ));
        let (submitter, receiver) = batch_channel(4);
        (BatchDispatcher::new(processor, receiver), submitter)
    }

    fn create_batch(id: &str) -> Instructions {
        Instructions {
            commands: vec![vec![create_example_command(
                id,
                OrderType::RemoveVolume,
                json!({"name": id}),
            )]],
        }
    }

    #[tokio::test]
    async fn runs_submitted_batches() {
        let mut executor = MockCommandExecutor::new();
        executor
            .expect_execute()
            .times(2)
            .returning(|_| CommandResult::Success);
        let reporter = RecordingReporter::default();
        let (dispatcher, submitter) = create_dispatcher(executor, reporter.clone());
        let token = Arc::new(CancellationToken::new());

        submitter.submit(create_batch("a")).await.unwrap();
        submitter.submit(create_batch("b")).await.unwrap();
        drop(submitter);

        dispatcher.run(token).await.unwrap();
        let statuses = reporter.statuses();
        assert_eq!(statuses.len(), 2);
        assert!(statuses.iter().all(|status| status.is_completed()));
    }

    #[tokio::test]
    async fn cancelled_dispatcher_rejects_batches() {
        let mut executor = MockCommandExecutor::new();
        executor.expect_execute().never();
        let (dispatcher, submitter) = create_dispatcher(executor, RecordingReporter::default());
        let token = Arc::new(CancellationToken::new());
        token.cancel();

        dispatcher.run(token).await.unwrap();
        assert_eq!(
            submitter.submit(create_batch("a")).await,
            Err(DispatchError::Closed)
        );
    }
}

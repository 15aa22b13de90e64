pub mod batch_dispatcher;
pub mod batch_processor;
pub mod batch_reporter;
pub mod command_executor;
pub mod command_result;
pub mod retry_policy;

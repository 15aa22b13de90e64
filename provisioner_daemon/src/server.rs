pub mod amqp_consumer;
pub mod http_server;

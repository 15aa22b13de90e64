mod docker;
mod server;
mod utils;

pub mod cli;
pub mod daemon;
pub mod fabric;
pub mod managers;

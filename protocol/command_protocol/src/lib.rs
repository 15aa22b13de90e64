pub mod command;
pub mod instruction;
pub mod payload;

pub use command::{Command, Instructions, Order, OrderType, Target};
pub use instruction::{Instruction, PayloadError};

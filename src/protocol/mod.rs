//! RESP protocol support for talking to sentinels
//!
//! Only what a sentinel client needs: reply parsing and command encoding.

pub mod command;
pub mod parser;
pub mod types;

pub use command::{SentinelCommand, encode_command};
pub use parser::Parser;
pub use types::RespValue;

//! Console input handling for Keydrop
//!
//! Turns typed lines into commands the engine (or the app) understands.

mod commands;
mod parser;

pub use commands::{Command, HELP};
pub use parser::{parse_line, ParseError};

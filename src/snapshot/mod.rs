//! Catch-up snapshot for newly connected clients
//!
//! Tails the persisted application log and turns each line into a [`LogEvent`]
//! using the heuristics in [`parser`].
//!
//! [`LogEvent`]: crate::models::LogEvent

pub mod parser;
mod reader;

pub use parser::{parse_line, ParseResult};
pub use reader::{example_events, SnapshotReader};

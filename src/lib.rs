//! Logcast - Real-time Log Broadcast
//!
//! Streams application log events to admin dashboards over WebSockets.
//!
//! ## Features
//!
//! - Bounded, non-blocking publish API that sheds load instead of stalling producers
//! - Ordered fan-out to every connected client with per-connection write deadlines
//! - Keep-alive pings and application-level ping/pong
//! - Catch-up snapshot parsed from the tail of the persisted log file
//! - HTTP ingest and status endpoints

pub mod api;
pub mod broadcast;
pub mod config;
pub mod error;
pub mod models;
pub mod snapshot;

pub use broadcast::{LogBroadcaster, PublishOutcome};
pub use config::Config;
pub use error::{LogcastError, Result};

//! API server implementation
//!
//! Provides the log stream WebSocket plus health, status and ingest endpoints.

pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod websocket;

pub use server::ApiServer;

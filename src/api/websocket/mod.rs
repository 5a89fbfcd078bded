//! WebSocket handlers

pub mod logs;

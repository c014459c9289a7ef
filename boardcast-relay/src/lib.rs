//! Boardcast relay server library.
//!
//! Exposes the relay server for use in tests and embedding.
//! The relay accepts WebSocket connections and forwards every message it
//! receives to all other open connections, unchanged.

pub mod config;
pub mod hub;
pub mod relay;

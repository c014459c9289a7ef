//! Board-side client for the Boardcast relay.
//!
//! A board connects to the relay, publishes its own moves, and receives the
//! moves made on every other connected board.

pub mod cli;
pub mod client;

//! Shared message conventions for Boardcast boards.
//!
//! The relay server never looks inside a payload. Boards agree among
//! themselves on a small JSON envelope, defined here so that Rust clients
//! and the browser board speak the same format.

pub mod envelope;
pub mod square;

//! Configuration module for the memory monitor
//!
//! Settings are read from a TOML (or JSON) file; the agent binary layers CLI
//! arguments and environment variables on top.

pub mod types;

pub use types::*;

//! CLI command implementations.

pub mod common;
pub mod devices;
pub mod processors;
pub mod run;
pub mod snapshot;

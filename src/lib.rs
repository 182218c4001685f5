//! stemdub - replace a video's soundtrack with one of its separated stems
//!
//! This library crate exposes the pipeline and server for integration testing.

pub mod config;
pub mod pipeline;
pub mod server;

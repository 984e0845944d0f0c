//! HTTP API module.
//!
//! This module provides the HTTP server and REST types for the points
//! dashboard backend.

pub mod server;
pub mod types;

pub use server::start_server;
pub use types::*;

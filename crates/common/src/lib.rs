//! Common utilities for the backup tools
//!
//! Shared code used by the protocol, server and client crates.

pub mod error;
pub mod logging;

pub use error::{Error, Result};

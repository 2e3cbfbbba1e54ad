//! Backup server
//!
//! Waits synchronously for request signals, reads one path per wake-up
//! from the channel, copies the file into the backup directory and answers
//! the requesting process with a success or failure signal.

pub mod compression;
pub mod copy;
mod service;
pub mod shutdown;

pub use compression::Compression;
pub use service::{BackupService, ServerOptions};

//! Error types for the backup tools

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing or unusable configuration (work directory, config file)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Another server process owns the rendezvous directory
    #[error("A backup server is already running (PID {0})")]
    AlreadyRunning(i32),

    /// The liveness record exists but does not hold a positive PID
    #[error("Invalid PID record {}: {reason}", .path.display())]
    InvalidRecord { path: PathBuf, reason: String },

    #[error("Empty request line")]
    EmptyRequest,

    #[error("Request line reaches the {0}-byte limit")]
    RequestTooLong(usize),

    /// End of channel before any byte of a request was read
    #[error("Channel closed by writer before a request arrived")]
    ChannelClosed,

    #[error("Copy of {} failed: {source}", .path.display())]
    Copy {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Compression failed: {0}")]
    Compression(String),

    #[error("{0}")]
    Other(String),
}

impl From<nix::errno::Errno> for Error {
    fn from(errno: nix::errno::Errno) -> Self {
        Error::Io(std::io::Error::from(errno))
    }
}

impl Error {
    /// True for errors that come from an interrupted system call
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Error::Io(e) if e.kind() == std::io::ErrorKind::Interrupted)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

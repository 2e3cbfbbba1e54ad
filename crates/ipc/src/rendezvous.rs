//! Location of the rendezvous artifacts
//!
//! Both names are fixed relative to the work directory. A leftover entry at
//! either path is removed and recreated by the next server, never renamed.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use common::{Error, Result};

/// Environment variable naming the work directory
pub const WORK_DIR_ENV: &str = "BACKUP_WORK_DIR";

/// Named pipe carrying request lines
pub const CHANNEL_NAME: &str = "backup.fifo";

/// PID file of the running server
pub const RECORD_NAME: &str = "backup-server.pid";

/// Read the configured work directory, if any
///
/// An empty value counts as absent.
pub fn resolve_work_dir() -> Option<PathBuf> {
    work_dir_from(std::env::var_os(WORK_DIR_ENV))
}

fn work_dir_from(value: Option<OsString>) -> Option<PathBuf> {
    value.filter(|v| !v.is_empty()).map(PathBuf::from)
}

/// Paths shared by the client and server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendezvous {
    work_dir: PathBuf,
    channel_path: PathBuf,
    record_path: PathBuf,
}

impl Rendezvous {
    /// Derive the artifact paths from a work directory
    ///
    /// Does not touch the filesystem; see [`Rendezvous::validate`].
    pub fn new(work_dir: impl AsRef<Path>) -> Self {
        // `join` inserts exactly one separator whether or not the value ends in '/'
        let work_dir = work_dir.as_ref().to_path_buf();
        Self {
            channel_path: work_dir.join(CHANNEL_NAME),
            record_path: work_dir.join(RECORD_NAME),
            work_dir,
        }
    }

    /// Resolve from `BACKUP_WORK_DIR` and check that it is a usable directory
    pub fn from_env() -> Result<Self> {
        let work_dir = resolve_work_dir()
            .ok_or_else(|| Error::Config(format!("{} is not set", WORK_DIR_ENV)))?;
        let rendezvous = Self::new(work_dir);
        rendezvous.validate()?;
        Ok(rendezvous)
    }

    /// Fail unless the work directory exists and is a directory
    pub fn validate(&self) -> Result<()> {
        match std::fs::metadata(&self.work_dir) {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(Error::Config(format!(
                "work directory {} is not a directory",
                self.work_dir.display()
            ))),
            Err(e) => Err(Error::Config(format!(
                "work directory {} is not accessible: {}",
                self.work_dir.display(),
                e
            ))),
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn channel_path(&self) -> &Path {
        &self.channel_path
    }

    pub fn record_path(&self) -> &Path {
        &self.record_path
    }
}

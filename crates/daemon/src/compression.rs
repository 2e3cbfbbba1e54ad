//! On-the-fly compression through an external command
//!
//! The compressor reads the source on stdin and writes the compressed
//! stream to the destination on stdout (`<cmd> -c`).

use std::env;
use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use common::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::copy::BACKUP_FILE_MODE;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    None,
    Gzip,
    Bzip2,
    Xz,
}

impl Compression {
    /// Executable implementing this method, if any
    pub fn command(self) -> Option<&'static str> {
        match self {
            Compression::None => None,
            Compression::Gzip => Some("gzip"),
            Compression::Bzip2 => Some("bzip2"),
            Compression::Xz => Some("xz"),
        }
    }

    /// Suffix appended to the backup file name
    pub fn extension(self) -> &'static str {
        match self {
            Compression::None => "",
            Compression::Gzip => ".gz",
            Compression::Bzip2 => ".bz2",
            Compression::Xz => ".xz",
        }
    }

    /// Fail unless the compressor can be found on `PATH`
    pub fn ensure_available(self) -> Result<()> {
        match self.command() {
            Some(cmd) if find_command(cmd).is_none() => Err(Error::Config(format!(
                "compression command '{}' is not installed",
                cmd
            ))),
            _ => Ok(()),
        }
    }
}

/// Locate an executable named `cmd` in `PATH`
pub fn find_command(cmd: &str) -> Option<PathBuf> {
    let paths = env::var_os("PATH")?;
    env::split_paths(&paths)
        .map(|dir| dir.join(cmd))
        .find(|candidate| is_executable(candidate))
}

fn is_executable(path: &Path) -> bool {
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// Compress `source` into `dest` with the method's command
pub fn compress_file(source: &Path, dest: &Path, compression: Compression) -> Result<()> {
    match compression.command() {
        Some(cmd) => run_compressor(cmd, source, dest),
        None => Err(Error::Compression("no compression method selected".to_string())),
    }
}

fn run_compressor(cmd: &str, source: &Path, dest: &Path) -> Result<()> {
    let input = File::open(source).map_err(|e| Error::Copy {
        path: source.to_path_buf(),
        source: e,
    })?;
    let output = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(BACKUP_FILE_MODE)
        .open(dest)
        .map_err(|e| {
            Error::Compression(format!("cannot create {}: {}", dest.display(), e))
        })?;

    debug!("Running {} -c < {} > {}", cmd, source.display(), dest.display());
    let status = Command::new(cmd)
        .arg("-c")
        .stdin(Stdio::from(input))
        .stdout(Stdio::from(output))
        .status()
        .map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => {
                Error::Compression(format!("command '{}' not found", cmd))
            }
            io::ErrorKind::PermissionDenied => {
                Error::Compression(format!("permission denied running '{}'", cmd))
            }
            _ => Error::Compression(format!("could not run '{}': {}", cmd, e)),
        })?;

    if !status.success() {
        return Err(Error::Compression(format!("'{}' failed ({})", cmd, status)));
    }
    Ok(())
}

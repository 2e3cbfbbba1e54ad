//! Liveness record: the server's PID file
//!
//! The record holds one decimal PID and a newline. A record whose process
//! is gone is stale, which is a normal state rather than corruption.

use std::fs::{self, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use common::{Error, Result};
use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use tracing::debug;

const RECORD_MODE: u32 = 0o644;
const RECORD_READ_LIMIT: u64 = 63;

/// What the PID file says about a previously started server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// No PID file
    Missing,
    /// PID file names a process that no longer exists
    Stale(Pid),
    /// PID file names a live process
    Alive(Pid),
}

/// Truncate-create `path` and write the current PID into it
pub fn write_liveness_record(path: &Path) -> Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;

    // write_all retries on EINTR and continues after short writes
    file.write_all(format!("{}\n", Pid::this()).as_bytes())?;
    file.flush()?;

    fs::set_permissions(path, fs::Permissions::from_mode(RECORD_MODE))?;
    Ok(())
}

/// Read and validate the PID stored at `path`
///
/// Anything that is not a positive decimal integer is an
/// [`Error::InvalidRecord`]; it is never read as PID 0 or a negative PID,
/// both of which would make `kill` address a process group.
pub fn read_liveness_record(path: &Path) -> Result<Pid> {
    let mut contents = String::new();
    fs::File::open(path)?
        .take(RECORD_READ_LIMIT)
        .read_to_string(&mut contents)
        .map_err(|e| match e.kind() {
            io::ErrorKind::InvalidData => invalid(path, "not UTF-8"),
            _ => Error::Io(e),
        })?;

    let text = contents.strip_suffix('\n').unwrap_or(&contents);
    if text.is_empty() {
        return Err(invalid(path, "empty"));
    }
    if !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid(path, &format!("{:?} is not a decimal process id", text)));
    }

    let raw: i32 = text
        .parse()
        .map_err(|_| invalid(path, &format!("'{}' is not a process id", text)))?;
    if raw <= 0 {
        return Err(invalid(path, &format!("{} is not a positive process id", raw)));
    }
    Ok(Pid::from_raw(raw))
}

fn invalid(path: &Path, reason: &str) -> Error {
    Error::InvalidRecord {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// Zero-effect existence check for `pid`
///
/// Only `ESRCH` means dead. `EPERM` means some other user's process holds
/// the PID, which still counts as alive.
pub fn probe(pid: Pid) -> bool {
    match kill(pid, None) {
        Ok(()) => true,
        Err(Errno::ESRCH) => false,
        Err(e) => {
            debug!("Probe of PID {} returned {}, treating as alive", pid, e);
            true
        }
    }
}

/// Classify the PID file at `path`
///
/// An unreadable or malformed record is returned as an error; callers
/// choose whether that is fatal.
pub fn check_server(path: &Path) -> Result<Liveness> {
    let pid = match read_liveness_record(path) {
        Ok(pid) => pid,
        Err(Error::Io(e)) if e.kind() == io::ErrorKind::NotFound => return Ok(Liveness::Missing),
        Err(e) => return Err(e),
    };

    if probe(pid) {
        Ok(Liveness::Alive(pid))
    } else {
        Ok(Liveness::Stale(pid))
    }
}

/// Remove the PID file; a missing file is not an error
pub fn remove_liveness_record(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

//! Client side of the backup protocol
//!
//! One [`Client::submit`] call per process: the completion flag the signal
//! handlers write to is process-global.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI32, Ordering};
use std::thread;
use std::time::Duration;

use common::{Error, Result};
use nix::sys::signal::Signal;
use nix::unistd::Pid;
use tracing::{debug, trace};

use crate::channel::open_writer;
use crate::pid::{check_server, Liveness};
use crate::protocol::write_request;
use crate::rendezvous::Rendezvous;
use crate::signals::{
    block, install_handler, notify, FAILURE_SIGNAL, REQUEST_SIGNAL, SUCCESS_SIGNAL,
};

const PENDING: i32 = 0;
const SUCCEEDED: i32 = 1;
const FAILED: i32 = 2;

static COMPLETION: AtomicI32 = AtomicI32::new(PENDING);

extern "C" fn record_completion(signum: libc::c_int) {
    if signum == SUCCESS_SIGNAL as libc::c_int {
        COMPLETION.store(SUCCEEDED, Ordering::SeqCst);
    } else if signum == FAILURE_SIGNAL as libc::c_int {
        COMPLETION.store(FAILED, Ordering::SeqCst);
    }
}

const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// How a submitted request ended, from the client's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The server signalled a completed copy
    Succeeded,
    /// The server signalled a failed copy
    Failed,
    /// No completion signal arrived within the wait budget
    Unanswered,
}

/// Result of one [`Client::submit`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// Absolute path written to the channel
    pub path: PathBuf,
    pub outcome: Outcome,
    /// Wait budget that applied to this request
    pub budget: Duration,
}

/// Time to wait for a result: one second per KiB, never less than one second
pub fn wait_budget(file_size: u64) -> Duration {
    Duration::from_secs(file_size / 1024 + 1)
}

/// Request driver talking to the server through a [`Rendezvous`]
#[derive(Debug, Clone)]
pub struct Client {
    rendezvous: Rendezvous,
}

impl Client {
    pub fn new(rendezvous: Rendezvous) -> Self {
        Self { rendezvous }
    }

    /// PID of the running server
    ///
    /// Fails without touching the channel when the PID file is missing,
    /// malformed, or names a dead process, so a client never blocks on a
    /// FIFO nobody will open.
    pub fn server_pid(&self) -> Result<Pid> {
        let record = self.rendezvous.record_path();
        match check_server(record) {
            Ok(Liveness::Alive(pid)) => Ok(pid),
            Ok(Liveness::Stale(pid)) => Err(Error::Other(format!(
                "backup server is not running (stale PID {} in {})",
                pid,
                record.display()
            ))),
            Ok(Liveness::Missing) => Err(Error::Other(format!(
                "backup server is not running (no {})",
                record.display()
            ))),
            Err(e) => Err(e),
        }
    }

    /// Ask the server to back up `file` and wait for its answer
    pub fn submit(&self, file: &Path) -> Result<Submission> {
        let size = validate_target(file)?;
        let server = self.server_pid()?;

        block(&[Signal::SIGPIPE])?;
        COMPLETION.store(PENDING, Ordering::SeqCst);
        install_handler(SUCCESS_SIGNAL, record_completion)?;
        install_handler(FAILURE_SIGNAL, record_completion)?;

        debug!("Opening {}", self.rendezvous.channel_path().display());
        let mut channel = open_writer(self.rendezvous.channel_path())?;

        let path = fs::canonicalize(file)?;
        write_request(&mut channel, &path)?;
        trace!("Request written for {}", path.display());

        notify(server, REQUEST_SIGNAL)?;
        debug!("Notified server {}", server);

        let budget = wait_budget(size);
        let outcome = wait_for_completion(budget);
        drop(channel);

        Ok(Submission {
            path,
            outcome,
            budget,
        })
    }
}

/// Check that `file` exists and is a regular file, returning its size
fn validate_target(file: &Path) -> Result<u64> {
    let meta = fs::metadata(file).map_err(|e| {
        Error::Other(format!("cannot access {}: {}", file.display(), e))
    })?;
    if !meta.is_file() {
        return Err(Error::Other(format!(
            "{} is not a regular file",
            file.display()
        )));
    }
    Ok(meta.len())
}

fn wait_for_completion(budget: Duration) -> Outcome {
    let mut waited = Duration::ZERO;
    loop {
        match COMPLETION.load(Ordering::SeqCst) {
            SUCCEEDED => return Outcome::Succeeded,
            FAILED => return Outcome::Failed,
            _ if waited >= budget => return Outcome::Unanswered,
            _ => {
                thread::sleep(POLL_INTERVAL);
                waited += POLL_INTERVAL;
            }
        }
    }
}

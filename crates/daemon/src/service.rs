//! Backup server service
//!
//! [`BackupService::start`] performs the filesystem preconditions and
//! creates the rendezvous artifacts. [`BackupService::run`] installs the
//! signal plumbing, opens the channel and serves requests until a
//! termination signal arrives. The artifacts are removed on every exit
//! path, including failed startup, because they are owned by a guard that
//! cleans up on drop.

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use common::Error;
use ipc::{
    check_server, create_channel, notify, open_reader, read_request, remove_channel,
    remove_liveness_record, write_liveness_record, Liveness, Notification, NotificationWaiter,
    Rendezvous, FAILURE_SIGNAL, REQUEST_SIGNAL, SUCCESS_SIGNAL,
};

use crate::compression::Compression;
use crate::copy::back_up;
use crate::shutdown;

/// Where and how backups are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerOptions {
    pub backup_dir: PathBuf,
    pub compression: Compression,
}

/// Rendezvous artifacts created by this process
#[derive(Debug, Default)]
struct Artifacts {
    channel: Option<PathBuf>,
    record: Option<PathBuf>,
}

impl Drop for Artifacts {
    fn drop(&mut self) {
        if let Some(path) = self.channel.take() {
            if let Err(e) = remove_channel(&path) {
                tracing::error!("Failed to remove channel {}: {}", path.display(), e);
            }
        }
        if let Some(path) = self.record.take() {
            if let Err(e) = remove_liveness_record(&path) {
                tracing::error!("Failed to remove PID file {}: {}", path.display(), e);
            }
        }
    }
}

/// The backup server
#[derive(Debug)]
pub struct BackupService {
    rendezvous: Rendezvous,
    options: ServerOptions,
    artifacts: Artifacts,
}

impl BackupService {
    /// Check preconditions and claim the rendezvous directory
    ///
    /// The work directory must already have been validated. A PID file
    /// naming a live process is fatal; a stale or unreadable one is
    /// replaced.
    pub fn start(rendezvous: Rendezvous, options: ServerOptions) -> Result<Self> {
        if !options.backup_dir.is_dir() {
            anyhow::bail!(
                "Backup directory does not exist or is not accessible: {}",
                options.backup_dir.display()
            );
        }

        options.compression.ensure_available()?;
        if let Some(cmd) = options.compression.command() {
            tracing::info!("Compressing backups with {}", cmd);
        }

        match check_server(rendezvous.record_path()) {
            Ok(Liveness::Alive(pid)) => return Err(Error::AlreadyRunning(pid.as_raw()).into()),
            Ok(Liveness::Stale(pid)) => {
                tracing::warn!("PID file names PID {} which is not running, replacing it", pid);
            }
            Ok(Liveness::Missing) => {}
            Err(e) => tracing::warn!("Could not read previous PID file, replacing it: {}", e),
        }

        tracing::debug!("Claiming work directory {}", rendezvous.work_dir().display());
        let mut artifacts = Artifacts::default();

        create_channel(rendezvous.channel_path()).with_context(|| {
            format!("Failed to create channel {}", rendezvous.channel_path().display())
        })?;
        artifacts.channel = Some(rendezvous.channel_path().to_path_buf());

        write_liveness_record(rendezvous.record_path()).with_context(|| {
            format!("Failed to write PID file {}", rendezvous.record_path().display())
        })?;
        artifacts.record = Some(rendezvous.record_path().to_path_buf());

        Ok(Self {
            rendezvous,
            options,
            artifacts,
        })
    }

    /// Serve requests until shutdown
    ///
    /// Returns `Ok` after a termination signal and `Err` when waiting for
    /// requests fails. Either way the artifacts are gone when this returns.
    pub fn run(self) -> Result<()> {
        shutdown::install().context("Failed to install termination handlers")?;
        let waiter =
            NotificationWaiter::new(REQUEST_SIGNAL).context("Failed to block request signal")?;

        tracing::info!(
            "Waiting for backup requests on {}, writing to {}",
            self.rendezvous.channel_path().display(),
            self.options.backup_dir.display()
        );

        let Some(mut channel) = self.open_channel()? else {
            tracing::info!("Shutting down before any client connected");
            return Ok(());
        };

        let mut result = Ok(());
        while !shutdown::requested() {
            let notification = match waiter.wait() {
                Ok(notification) => notification,
                Err(e) if e.is_interrupted() => continue,
                Err(e) => {
                    tracing::error!("Waiting for requests failed: {}", e);
                    result = Err(anyhow::Error::from(e).context("Signal wait failed"));
                    break;
                }
            };
            self.handle(notification, &mut channel);
        }

        tracing::info!("Shutting down");
        drop(channel);
        result
    }

    /// Open the channel's read end, or `None` if shutdown arrives first
    fn open_channel(&self) -> Result<Option<File>> {
        let path = self.rendezvous.channel_path();
        loop {
            match open_reader(path) {
                Ok(file) => return Ok(Some(file)),
                Err(e) if e.is_interrupted() => {
                    if shutdown::requested() {
                        return Ok(None);
                    }
                }
                Err(e) => {
                    return Err(anyhow::Error::from(e))
                        .with_context(|| format!("Failed to open channel {}", path.display()))
                }
            }
        }
    }

    /// Serve the request announced by `notification`
    fn handle(&self, notification: Notification, channel: &mut File) {
        let source = match read_request(channel) {
            Ok(path) => path,
            Err(e) => {
                // No trustworthy request to answer; the client will time out
                tracing::warn!("Discarding request: {}", e);
                return;
            }
        };

        let client = notification.sender;
        tracing::debug!("Request from PID {} for {}", client, source.display());

        let reply = match self.back_up(&source) {
            Ok(dest) => {
                tracing::info!("Backup completed: {} -> {}", source.display(), dest.display());
                SUCCESS_SIGNAL
            }
            Err(e) => {
                tracing::error!("Backup of {} failed: {}", source.display(), e);
                FAILURE_SIGNAL
            }
        };

        if let Err(e) = notify(client, reply) {
            tracing::warn!("Could not notify client {}: {}", client, e);
        }
    }

    fn back_up(&self, source: &Path) -> common::Result<PathBuf> {
        back_up(source, &self.options.backup_dir, self.options.compression)
    }
}

//! Named pipe lifecycle
//!
//! Opening a FIFO blocks until the other end is opened too. That blocking
//! open is what orders a client after a listening server.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::os::fd::FromRawFd;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use common::Result;
use nix::fcntl::{open, OFlag};
use nix::sys::stat::Mode;
use nix::unistd::mkfifo;
use tracing::debug;

const CHANNEL_MODE: u32 = 0o666;

/// Create a fresh named pipe at `path`, removing whatever was there
pub fn create_channel(path: &Path) -> Result<()> {
    if fs::symlink_metadata(path).is_ok() {
        debug!("Removing previous entry at {}", path.display());
        fs::remove_file(path)?;
    }

    mkfifo(path, Mode::from_bits_truncate(CHANNEL_MODE))?;
    // mkfifo honours the umask; the client may run under a different one
    fs::set_permissions(path, fs::Permissions::from_mode(CHANNEL_MODE))?;
    Ok(())
}

/// Open the read end, blocking until a writer appears
///
/// Unlike `File::open` this does not retry on `EINTR`, so a termination
/// signal can pull the server out of the wait. The caller sees the error
/// as `ErrorKind::Interrupted` and decides whether to retry.
pub fn open_reader(path: &Path) -> Result<File> {
    let fd = open(path, OFlag::O_RDONLY | OFlag::O_CLOEXEC, Mode::empty())?;
    // SAFETY: `open` just returned this descriptor and nothing else owns it
    Ok(unsafe { File::from_raw_fd(fd) })
}

/// Open the write end, blocking until the server holds the read end
pub fn open_writer(path: &Path) -> Result<File> {
    let file = OpenOptions::new().write(true).open(path)?;
    Ok(file)
}

/// Remove the channel; a missing channel is not an error
pub fn remove_channel(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::os::unix::fs::FileTypeExt;

    #[test]
    fn test_create_channel_makes_fifo() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backup.fifo");

        create_channel(&path).unwrap();

        let meta = fs::symlink_metadata(&path).unwrap();
        assert!(meta.file_type().is_fifo());
        assert_eq!(meta.permissions().mode() & 0o777, CHANNEL_MODE);
    }

    #[test]
    fn test_create_channel_replaces_existing_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backup.fifo");
        fs::write(&path, b"leftover").unwrap();

        create_channel(&path).unwrap();
        assert!(fs::symlink_metadata(&path).unwrap().file_type().is_fifo());

        // Second server start on an existing FIFO
        create_channel(&path).unwrap();
        assert!(fs::symlink_metadata(&path).unwrap().file_type().is_fifo());
    }

    #[test]
    fn test_create_channel_surfaces_os_error() {
        let path = Path::new("/nonexistent-dir-for-backup-tests/backup.fifo");
        assert!(create_channel(path).is_err());
    }

    #[test]
    fn test_reader_and_writer_rendezvous() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backup.fifo");
        create_channel(&path).unwrap();

        let writer_path = path.clone();
        let writer = std::thread::spawn(move || {
            let mut w = open_writer(&writer_path).unwrap();
            w.write_all(b"/tmp/a\n").unwrap();
        });

        let mut reader = open_reader(&path).unwrap();
        writer.join().unwrap();

        let mut buf = String::new();
        reader.read_to_string(&mut buf).unwrap();
        assert_eq!(buf, "/tmp/a\n");
    }

    #[test]
    fn test_remove_channel_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backup.fifo");
        create_channel(&path).unwrap();

        remove_channel(&path).unwrap();
        assert!(!path.exists());
        remove_channel(&path).unwrap();
    }
}

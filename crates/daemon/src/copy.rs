//! Copy collaborator and destination naming

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Write};
use std::os::unix::fs::{MetadataExt, OpenOptionsExt};
use std::path::{Path, PathBuf};

use common::{Error, Result};

use crate::compression::{compress_file, Compression};

pub const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Mode for new backup files, before the umask
pub const BACKUP_FILE_MODE: u32 = 0o666;

/// `backup_dir` joined with the final segment of `source`, plus the
/// compression suffix
pub fn destination_for(backup_dir: &Path, source: &Path, compression: Compression) -> Result<PathBuf> {
    let name = source.file_name().ok_or_else(|| {
        Error::Other(format!("{} has no file name", source.display()))
    })?;

    let mut name = OsString::from(name);
    name.push(compression.extension());
    Ok(backup_dir.join(name))
}

/// True when both paths exist and name the same inode
pub fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::metadata(a), fs::metadata(b)) {
        (Ok(ma), Ok(mb)) => ma.dev() == mb.dev() && ma.ino() == mb.ino(),
        _ => false,
    }
}

/// Buffered copy of `source` over `dest`, returning the bytes copied
pub fn copy_file(source: &Path, dest: &Path) -> Result<u64> {
    let input = File::open(source).map_err(copy_error(source))?;
    let mut output = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(BACKUP_FILE_MODE)
        .open(dest)
        .map_err(copy_error(dest))?;

    let mut reader = BufReader::with_capacity(COPY_BUFFER_SIZE, input);
    let copied = io::copy(&mut reader, &mut output).map_err(copy_error(dest))?;
    output.flush().map_err(copy_error(dest))?;
    Ok(copied)
}

fn copy_error(path: &Path) -> impl FnOnce(io::Error) -> Error {
    let path = path.to_path_buf();
    move |source| Error::Copy { path, source }
}

/// Back up `source` into `backup_dir`, returning the file written
pub fn back_up(source: &Path, backup_dir: &Path, compression: Compression) -> Result<PathBuf> {
    let dest = destination_for(backup_dir, source, compression)?;

    if same_file(source, &dest) {
        return Err(Error::Other(format!(
            "{} is already the backup location",
            source.display()
        )));
    }

    match compression {
        Compression::None => {
            copy_file(source, &dest)?;
        }
        _ => compress_file(source, &dest, compression)?,
    }
    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destination_uses_final_segment() {
        let dest = destination_for(
            Path::new("/backups"),
            Path::new("/home/u/docs/report.txt"),
            Compression::None,
        )
        .unwrap();
        assert_eq!(dest, PathBuf::from("/backups/report.txt"));

        let dest = destination_for(
            Path::new("/backups/"),
            Path::new("/home/u/docs/report.txt"),
            Compression::Bzip2,
        )
        .unwrap();
        assert_eq!(dest, PathBuf::from("/backups/report.txt.bz2"));

        assert!(destination_for(Path::new("/backups"), Path::new("/"), Compression::None).is_err());
    }

    #[test]
    fn test_back_up_copies_contents() {
        let src_dir = tempfile::tempdir().unwrap();
        let backup_dir = tempfile::tempdir().unwrap();
        let source = src_dir.path().join("photo.raw");
        let contents: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        fs::write(&source, &contents).unwrap();

        let dest = back_up(&source, backup_dir.path(), Compression::None).unwrap();

        assert_eq!(dest, backup_dir.path().join("photo.raw"));
        assert_eq!(fs::read(&dest).unwrap(), contents);
    }

    #[test]
    fn test_back_up_overwrites_previous_backup() {
        let src_dir = tempfile::tempdir().unwrap();
        let backup_dir = tempfile::tempdir().unwrap();
        let source = src_dir.path().join("notes.txt");
        fs::write(backup_dir.path().join("notes.txt"), b"an older and much longer version").unwrap();
        fs::write(&source, b"new").unwrap();

        let dest = back_up(&source, backup_dir.path(), Compression::None).unwrap();
        assert_eq!(fs::read(dest).unwrap(), b"new");
    }

    #[test]
    fn test_back_up_refuses_to_copy_onto_source() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("self.txt");
        fs::write(&source, b"keep me").unwrap();

        assert!(back_up(&source, dir.path(), Compression::None).is_err());
        assert_eq!(fs::read(&source).unwrap(), b"keep me");
    }

    #[test]
    fn test_unwritable_destination_is_copy_error() {
        let src_dir = tempfile::tempdir().unwrap();
        let backup_dir = tempfile::tempdir().unwrap();
        let source = src_dir.path().join("blocked.txt");
        fs::write(&source, b"x").unwrap();
        // A directory squatting on the destination name cannot be opened for writing
        fs::create_dir(backup_dir.path().join("blocked.txt")).unwrap();

        let err = back_up(&source, backup_dir.path(), Compression::None).unwrap_err();
        assert!(matches!(err, Error::Copy { .. }), "{:?}", err);
    }

    #[test]
    fn test_missing_source_is_copy_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = copy_file(&dir.path().join("gone"), &dir.path().join("out")).unwrap_err();
        assert!(matches!(err, Error::Copy { ref path, .. } if path.ends_with("gone")));
    }
}

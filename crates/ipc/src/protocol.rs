//! Request line codec
//!
//! A request is the absolute path of the file to back up, as raw bytes,
//! followed by a single `\n`. There is no length prefix and no escaping, so
//! a path containing a newline cannot be sent.

use std::ffi::OsString;
use std::io::{self, Read, Write};
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::path::{Path, PathBuf};

use common::{Error, Result};

/// Upper bound on a request line, terminator excluded
///
/// Lines of this length or more are rejected rather than truncated.
pub const MAX_REQUEST_LEN: usize = libc::PATH_MAX as usize;

const TERMINATOR: u8 = b'\n';

/// Read one request line from the channel
///
/// Reads byte by byte so nothing past the terminator is consumed. End of
/// channel after at least one byte ends the line, which tolerates a writer
/// that closes right after its last byte; end of channel before any byte is
/// [`Error::ChannelClosed`].
pub fn read_request<R: Read>(channel: &mut R) -> Result<PathBuf> {
    let mut line = Vec::new();

    loop {
        match read_byte(channel)? {
            None if line.is_empty() => return Err(Error::ChannelClosed),
            None | Some(TERMINATOR) => break,
            Some(byte) => {
                line.push(byte);
                if line.len() >= MAX_REQUEST_LEN {
                    discard_rest_of_line(channel)?;
                    return Err(Error::RequestTooLong(MAX_REQUEST_LEN));
                }
            }
        }
    }

    if line.is_empty() {
        return Err(Error::EmptyRequest);
    }
    Ok(PathBuf::from(OsString::from_vec(line)))
}

fn read_byte<R: Read>(channel: &mut R) -> Result<Option<u8>> {
    let mut byte = [0u8; 1];
    loop {
        match channel.read(&mut byte) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(byte[0])),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

// Keep the stream aligned on line boundaries for the next request
fn discard_rest_of_line<R: Read>(channel: &mut R) -> Result<()> {
    while let Some(byte) = read_byte(channel)? {
        if byte == TERMINATOR {
            break;
        }
    }
    Ok(())
}

/// Encode `path` as a request line
pub fn encode_request(path: &Path) -> Result<Vec<u8>> {
    let bytes = path.as_os_str().as_bytes();
    if bytes.is_empty() {
        return Err(Error::EmptyRequest);
    }
    if bytes.contains(&TERMINATOR) {
        return Err(Error::Other(format!(
            "path {} contains a newline and cannot be sent",
            path.display()
        )));
    }
    if bytes.len() >= MAX_REQUEST_LEN {
        return Err(Error::RequestTooLong(MAX_REQUEST_LEN));
    }

    let mut line = Vec::with_capacity(bytes.len() + 1);
    line.extend_from_slice(bytes);
    line.push(TERMINATOR);
    Ok(line)
}

/// Write `path` as one request line
///
/// `write_all` continues after partial writes and retries on `EINTR`, so
/// the line is never restarted from the beginning.
pub fn write_request<W: Write>(channel: &mut W, path: &Path) -> Result<()> {
    let line = encode_request(path)?;
    channel.write_all(&line)?;
    channel.flush()?;
    Ok(())
}

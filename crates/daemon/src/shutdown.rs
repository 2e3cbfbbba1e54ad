//! Termination flag set from signal context
//!
//! The handler may not allocate, lock or log. It writes a fixed message
//! with `write(2)` and flips the flag; the event loop polls the flag
//! between waits.

use std::sync::atomic::{AtomicBool, Ordering};

use common::Result;
use ipc::{install_handler, TERMINATION_SIGNALS};
use nix::errno::Errno;

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

const SHUTDOWN_MESSAGE: &[u8] = b"backup-server: termination signal received, shutting down\n";

extern "C" fn request_shutdown(_signum: libc::c_int) {
    let saved = Errno::last_raw();
    // SAFETY: write(2) is async-signal-safe and the buffer is static
    unsafe {
        libc::write(
            libc::STDERR_FILENO,
            SHUTDOWN_MESSAGE.as_ptr().cast(),
            SHUTDOWN_MESSAGE.len(),
        );
    }
    SHUTDOWN.store(true, Ordering::SeqCst);
    Errno::set_raw(saved);
}

/// Route every termination signal to the shutdown flag
pub fn install() -> Result<()> {
    for signal in TERMINATION_SIGNALS {
        install_handler(signal, request_shutdown)?;
    }
    Ok(())
}

/// Whether a termination signal has arrived
pub fn requested() -> bool {
    SHUTDOWN.load(Ordering::SeqCst)
}

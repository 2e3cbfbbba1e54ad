//! Signal identities and the synchronous notification wait

use std::io;
use std::mem::MaybeUninit;

use common::Result;
use nix::errno::Errno;
use nix::sys::signal::{kill, sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use nix::unistd::Pid;

/// Client to server: a request line is waiting in the channel
pub const REQUEST_SIGNAL: Signal = Signal::SIGUSR1;

/// Server to client: the backup completed
pub const SUCCESS_SIGNAL: Signal = Signal::SIGUSR1;

/// Server to client: the backup failed
pub const FAILURE_SIGNAL: Signal = Signal::SIGUSR2;

/// Signals that ask the server to shut down
pub const TERMINATION_SIGNALS: [Signal; 4] = [
    Signal::SIGTERM,
    Signal::SIGINT,
    Signal::SIGHUP,
    Signal::SIGQUIT,
];

/// Install `handler` for `signal` without `SA_RESTART`
///
/// Blocking calls interrupted by the handler fail with `EINTR` instead of
/// resuming, which lets the caller look at whatever the handler recorded.
/// The handler must be async-signal-safe: atomics and `write(2)` only.
pub fn install_handler(signal: Signal, handler: extern "C" fn(libc::c_int)) -> Result<()> {
    let action = SigAction::new(SigHandler::Handler(handler), SaFlags::empty(), SigSet::empty());
    // SAFETY: callers pass handlers restricted to async-signal-safe operations
    unsafe { sigaction(signal, &action) }?;
    Ok(())
}

/// Block `signals` for the calling thread
pub fn block(signals: &[Signal]) -> Result<()> {
    let mut set = SigSet::empty();
    for &signal in signals {
        set.add(signal);
    }
    set.thread_block()?;
    Ok(())
}

/// Send `signal` to `pid`
pub fn notify(pid: Pid, signal: Signal) -> Result<()> {
    kill(pid, signal)?;
    Ok(())
}

/// A signal retrieved synchronously, with the PID that sent it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Notification {
    pub signal: Signal,
    pub sender: Pid,
}

/// Synchronous receiver for one signal
///
/// Construction blocks the signal for the calling thread so it stays pending
/// until [`NotificationWaiter::wait`] collects it. Pending standard signals
/// are not counted: several deliveries before a wait yield one notification.
#[derive(Debug)]
pub struct NotificationWaiter {
    set: SigSet,
}

impl NotificationWaiter {
    pub fn new(signal: Signal) -> Result<Self> {
        let mut set = SigSet::empty();
        set.add(signal);
        set.thread_block()?;
        Ok(Self { set })
    }

    /// Block until the signal is pending, then consume it
    ///
    /// A handler running for some other signal makes this fail with an
    /// error whose kind is `Interrupted`.
    pub fn wait(&self) -> Result<Notification> {
        let mut info = MaybeUninit::<libc::siginfo_t>::zeroed();
        // SAFETY: the set is initialised and `info` is valid for writes
        let signo = unsafe { libc::sigwaitinfo(self.set.as_ref(), info.as_mut_ptr()) };
        if signo == -1 {
            return Err(io::Error::from(Errno::last()).into());
        }

        // SAFETY: sigwaitinfo succeeded and filled `info`
        let info = unsafe { info.assume_init() };
        let signal = Signal::try_from(signo)?;
        // SAFETY: si_pid is valid for signals sent with kill/tgkill, which is
        // the only way the waited signal reaches us
        let sender = Pid::from_raw(unsafe { info.si_pid() });
        Ok(Notification { signal, sender })
    }
}

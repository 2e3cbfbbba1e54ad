//! Rendezvous protocol between the `backup` client and `backup-server`
//!
//! Both processes meet in a work directory named by `BACKUP_WORK_DIR`. The
//! server owns two artifacts there: a named pipe carrying request lines and
//! a PID file advertising which process is listening.
//!
//! # Architecture
//!
//! ```text
//!   backup (client)                          backup-server
//! ┌──────────────────┐                     ┌──────────────────────┐
//! │ read PID file    │                     │ sigwaitinfo(SIGUSR1) │
//! │ open FIFO (W)    │── "/abs/path\n" ───>│ read one line        │
//! │ kill(SIGUSR1)    │──────────────────-->│ copy to backup dir   │
//! │ poll for result  │<── SIGUSR1/SIGUSR2 ─│ kill(si_pid, ...)    │
//! └──────────────────┘                     └──────────────────────┘
//! ```
//!
//! The result signal goes to the sender PID captured by the server's wait,
//! never to a cached PID, so each request is answered to its own client.
//!
//! Standard signals are not queued. Two requests signalled before the server
//! re-enters its wait collapse into one wake-up and one of them goes
//! unanswered; that client reports a timeout. There is exactly one in-flight
//! request at a time and exactly one server per work directory.

mod channel;
mod client;
mod pid;
mod protocol;
mod rendezvous;
mod signals;

pub use channel::{create_channel, open_reader, open_writer, remove_channel};
pub use client::{wait_budget, Client, Outcome, Submission};
pub use pid::{
    check_server, probe, read_liveness_record, remove_liveness_record, write_liveness_record,
    Liveness,
};
pub use protocol::{encode_request, read_request, write_request, MAX_REQUEST_LEN};
pub use rendezvous::{resolve_work_dir, Rendezvous, CHANNEL_NAME, RECORD_NAME, WORK_DIR_ENV};
pub use signals::{
    block, install_handler, notify, Notification, NotificationWaiter, FAILURE_SIGNAL,
    REQUEST_SIGNAL, SUCCESS_SIGNAL, TERMINATION_SIGNALS,
};

pub use nix::sys::signal::Signal;
pub use nix::unistd::Pid;

//! Helpers for driving the real `backup` and `backup-server` binaries.

#![allow(dead_code)]

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Output, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tempfile::TempDir;

pub const READY_MESSAGE: &str = "Waiting for backup requests";
pub const STARTUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Scratch directories for one test: work dir, backup dir, sources, config
pub struct Sandbox {
    pub work: TempDir,
    pub backups: TempDir,
    pub sources: TempDir,
    pub config: TempDir,
}

impl Sandbox {
    pub fn new() -> Self {
        Self {
            work: tempfile::tempdir().unwrap(),
            backups: tempfile::tempdir().unwrap(),
            sources: tempfile::tempdir().unwrap(),
            config: tempfile::tempdir().unwrap(),
        }
    }

    pub fn channel_path(&self) -> PathBuf {
        self.work.path().join("backup.fifo")
    }

    pub fn record_path(&self) -> PathBuf {
        self.work.path().join("backup-server.pid")
    }

    /// Create a source file large enough for a multi-second wait budget
    pub fn source(&self, name: &str) -> (PathBuf, Vec<u8>) {
        let contents: Vec<u8> = name.bytes().cycle().take(16 * 1024).collect();
        let path = self.sources.path().join(name);
        fs::write(&path, &contents).unwrap();
        (path, contents)
    }

    fn command(&self, exe: &str) -> Command {
        let mut cmd = Command::new(exe);
        cmd.env("BACKUP_WORK_DIR", self.work.path())
            .env("BACKUP_CONFIG_PATH", self.config.path())
            .env("RUST_LOG", "info")
            .env("NO_COLOR", "1");
        cmd
    }

    pub fn spawn_server(&self) -> Server {
        let mut child = self
            .command(env!("CARGO_BIN_EXE_backup-server"))
            .arg(self.backups.path())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap();

        let stderr = child.stderr.take().unwrap();
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            for line in BufReader::new(stderr).lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });

        Server { child, lines: rx }
    }

    /// Run the server to completion, for startups expected to fail
    pub fn run_server(&self) -> Output {
        let mut child = self
            .command(env!("CARGO_BIN_EXE_backup-server"))
            .arg(self.backups.path())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap();
        wait_timeout(&mut child, STARTUP_TIMEOUT).expect("server did not exit");
        child.wait_with_output().unwrap()
    }

    pub fn spawn_client(&self, file: &Path) -> Child {
        self.command(env!("CARGO_BIN_EXE_backup"))
            .arg(file)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap()
    }

    /// Run a client and collect its output, failing if it hangs
    pub fn run_client(&self, file: &Path) -> Output {
        let mut child = self.spawn_client(file);
        if wait_timeout(&mut child, Duration::from_secs(60)).is_none() {
            let _ = child.kill();
            panic!("client did not finish");
        }
        child.wait_with_output().unwrap()
    }
}

pub struct Server {
    pub child: Child,
    lines: Receiver<String>,
}

impl Server {
    /// Block until the server logs that it is serving
    pub fn wait_ready(&self) {
        self.expect_log(READY_MESSAGE);
    }

    /// Consume log lines until one contains `needle`
    pub fn expect_log(&self, needle: &str) {
        let deadline = Instant::now() + STARTUP_TIMEOUT;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.lines.recv_timeout(remaining) {
                Ok(line) if line.contains(needle) => return,
                Ok(_) => continue,
                Err(_) => panic!("server never logged {:?}", needle),
            }
        }
    }

    pub fn pid(&self) -> Pid {
        Pid::from_raw(self.child.id() as i32)
    }

    pub fn signal(&self, signal: Signal) {
        kill(self.pid(), signal).unwrap();
    }

    /// Send SIGTERM and wait for the exit status
    pub fn terminate(mut self) -> ExitStatus {
        self.signal(Signal::SIGTERM);
        let status = wait_timeout(&mut self.child, STARTUP_TIMEOUT);
        status.expect("server ignored SIGTERM")
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

pub fn wait_timeout(child: &mut Child, timeout: Duration) -> Option<ExitStatus> {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if let Some(status) = child.try_wait().unwrap() {
            return Some(status);
        }
        thread::sleep(Duration::from_millis(20));
    }
    None
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

/// PID of a process that has already exited and been reaped
pub fn dead_pid() -> i32 {
    let mut child = Command::new("true").spawn().unwrap();
    let pid = child.id() as i32;
    child.wait().unwrap();
    pid
}

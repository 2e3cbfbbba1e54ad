//! `backup`: ask the running `backup-server` to back up one file

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use ipc::{Client, Outcome, Rendezvous, Submission};

#[derive(Parser)]
#[command(name = "backup")]
#[command(about = "Back up a file through the running backup-server")]
#[command(version)]
struct Cli {
    /// Regular file to back up
    file: PathBuf,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    // Default to WARN so stdout only carries the outcome line
    // Use RUST_LOG=debug to trace the protocol steps
    common::logging::init(tracing::Level::WARN);

    match run(&cli) {
        Ok(submission) => report(&submission),
        Err(e) => {
            eprintln!("backup: error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<Submission> {
    let rendezvous = Rendezvous::from_env()?;
    let client = Client::new(rendezvous);
    Ok(client.submit(&cli.file)?)
}

fn report(submission: &Submission) -> ExitCode {
    let path = submission.path.display();
    match submission.outcome {
        Outcome::Succeeded => {
            println!("backup: {} backed up successfully", path);
            ExitCode::SUCCESS
        }
        Outcome::Failed => {
            println!("backup: server failed to back up {}", path);
            ExitCode::FAILURE
        }
        Outcome::Unanswered => {
            println!(
                "backup: no answer from server within {}s for {}",
                submission.budget.as_secs(),
                path
            );
            ExitCode::FAILURE
        }
    }
}

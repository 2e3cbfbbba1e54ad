//! `backup-server`: receives backup requests from `backup` clients

mod config;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser};
use daemon::{BackupService, Compression, ServerOptions};
use ipc::Rendezvous;

#[derive(Parser)]
#[command(name = "backup-server")]
#[command(about = "Serve file backup requests sent through BACKUP_WORK_DIR")]
#[command(version)]
struct Cli {
    /// Directory receiving the backups (default: config file, then current directory)
    backup_dir: Option<PathBuf>,

    #[command(flatten)]
    compression: CompressionArgs,
}

#[derive(Args)]
#[group(multiple = false)]
struct CompressionArgs {
    /// Compress backups with gzip
    #[arg(short = 'z', long)]
    gzip: bool,

    /// Compress backups with bzip2
    #[arg(short = 'j', long)]
    bzip2: bool,

    /// Compress backups with xz
    #[arg(short = 'x', long)]
    xz: bool,
}

impl CompressionArgs {
    fn selected(&self) -> Option<Compression> {
        if self.gzip {
            Some(Compression::Gzip)
        } else if self.bzip2 {
            Some(Compression::Bzip2)
        } else if self.xz {
            Some(Compression::Xz)
        } else {
            None
        }
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            // Usage errors exit 1 like every other failure; --help exits 0
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    common::logging::init(tracing::Level::INFO);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("backup-server: error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let rendezvous = Rendezvous::from_env()?;
    let cfg = config::load_config()?;

    let backup_dir = match cli.backup_dir.or(cfg.server.backup_dir) {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to determine current directory")?,
    };
    let compression = cli.compression.selected().unwrap_or(cfg.server.compression);

    let service = BackupService::start(
        rendezvous,
        ServerOptions {
            backup_dir,
            compression,
        },
    )?;
    service.run()
}

//! Standalone CLI for [`xwrap::elf::rewrite::shift_file_offsets`].

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use xwrap::elf::rewrite::{shift_file_offsets, MappedFile};

/// Add `delta` to every file-offset field in the ELF and program headers.
#[derive(Parser)]
struct Cli {
    file: PathBuf,
    delta: i64,
}

fn main() -> ExitCode {
    xwrap::logging::init();
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => {
            tracing::info!(file = %cli.file.display(), delta = cli.delta, "shift-elf done");
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(%err, "shift-elf failed");
            ExitCode::from(err.exit_code() as u8)
        }
    }
}

fn run(cli: &Cli) -> xwrap::error::Result<()> {
    let mut file = MappedFile::open(&cli.file)?;
    shift_file_offsets::run(&mut file, cli.delta)?;
    file.flush()
}

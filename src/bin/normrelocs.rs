//! Standalone CLI for [`xwrap::elf::rewrite::normalize_relocs`].

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use xwrap::elf::rewrite::{normalize_relocs, MappedFile};

/// Normalize debug/non-debug relocations between a section symbol and its
/// zero-offset named alias.
#[derive(Parser)]
struct Cli {
    file: PathBuf,
    sym: Option<String>,
}

fn main() -> ExitCode {
    xwrap::logging::init();
    let cli = Cli::parse();
    match run(&cli) {
        Ok(count) => {
            tracing::info!(file = %cli.file.display(), count, "normrelocs done");
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(%err, "normrelocs failed");
            ExitCode::from(err.exit_code() as u8)
        }
    }
}

fn run(cli: &Cli) -> xwrap::error::Result<usize> {
    let mut file = MappedFile::open(&cli.file)?;
    let count = normalize_relocs::run(&mut file, cli.sym.as_deref())?;
    file.flush()?;
    Ok(count)
}

//! Standalone CLI for [`xwrap::elf::rewrite::und_protect`].

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use xwrap::elf::rewrite::{und_protect, MappedFile};

/// Set `STV_PROTECTED` visibility on every undefined dynamic symbol that
/// isn't already hidden or protected.
#[derive(Parser)]
struct Cli {
    file: PathBuf,
}

fn main() -> ExitCode {
    xwrap::logging::init();
    let cli = Cli::parse();
    match run(&cli) {
        Ok(count) => {
            tracing::info!(file = %cli.file.display(), count, "undprot done");
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(%err, "undprot failed");
            ExitCode::from(err.exit_code() as u8)
        }
    }
}

fn run(cli: &Cli) -> xwrap::error::Result<usize> {
    let mut file = MappedFile::open(&cli.file)?;
    let count = und_protect::run(&mut file)?;
    file.flush()?;
    Ok(count)
}

//! Standalone CLI for [`xwrap::elf::rewrite::pie_to_rel`].

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use xwrap::elf::rewrite::{pie_to_rel, MappedFile};

/// Rebase a static-PIE's symbols and sections to file-relative values and
/// retype it as `ET_REL`.
#[derive(Parser)]
struct Cli {
    file: PathBuf,
}

fn main() -> ExitCode {
    xwrap::logging::init();
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => {
            tracing::info!(file = %cli.file.display(), "pie2rel done");
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(%err, "pie2rel failed");
            ExitCode::from(err.exit_code() as u8)
        }
    }
}

fn run(cli: &Cli) -> xwrap::error::Result<()> {
    let mut file = MappedFile::open(&cli.file)?;
    pie_to_rel::run(&mut file)?;
    file.flush()
}

//! Standalone CLI for [`xwrap::elf::rewrite::abs_to_section`].

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use xwrap::elf::rewrite::{abs_to_section, MappedFile};

/// Reassign zero-valued ABS symbols that name a section back onto that section.
#[derive(Parser)]
struct Cli {
    file: PathBuf,
    /// Limit the rewrite to a single symbol name.
    sym: Option<String>,
}

fn main() -> ExitCode {
    xwrap::logging::init();
    let cli = Cli::parse();
    match run(&cli) {
        Ok(count) => {
            tracing::info!(file = %cli.file.display(), count, "abs2sectsym done");
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(%err, "abs2sectsym failed");
            ExitCode::from(err.exit_code() as u8)
        }
    }
}

fn run(cli: &Cli) -> xwrap::error::Result<usize> {
    let mut file = MappedFile::open(&cli.file)?;
    let count = abs_to_section::run(&mut file, cli.sym.as_deref())?;
    file.flush()?;
    Ok(count)
}

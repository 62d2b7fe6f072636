//! Standalone CLI for [`xwrap::elf::rewrite::sym_to_undef`].

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use xwrap::elf::rewrite::{sym_to_undef, MappedFile};

/// Demote every symbol table entry named `sym` to an undefined symbol.
#[derive(Parser)]
struct Cli {
    file: PathBuf,
    sym: String,
}

fn main() -> ExitCode {
    xwrap::logging::init();
    let cli = Cli::parse();
    match run(&cli) {
        Ok(count) => {
            tracing::info!(file = %cli.file.display(), sym = %cli.sym, count, "sym2und done");
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(%err, "sym2und failed");
            ExitCode::from(err.exit_code() as u8)
        }
    }
}

fn run(cli: &Cli) -> xwrap::error::Result<usize> {
    let mut file = MappedFile::open(&cli.file)?;
    let count = sym_to_undef::run(&mut file, &cli.sym)?;
    file.flush()?;
    Ok(count)
}

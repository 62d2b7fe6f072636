//! Standalone CLI for [`xwrap::elf::rewrite::sym_to_dyn_reconcile`].

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use xwrap::elf::rewrite::{sym_to_dyn_reconcile, MappedFile};

/// Reconcile `.dynsym` entries against `.symtab` by name and address.
#[derive(Parser)]
struct Cli {
    file: PathBuf,
}

fn main() -> ExitCode {
    xwrap::logging::init();
    let cli = Cli::parse();
    match run(&cli) {
        Ok(count) => {
            tracing::info!(file = %cli.file.display(), count, "sym2dyn done");
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(%err, "sym2dyn failed");
            ExitCode::from(err.exit_code() as u8)
        }
    }
}

fn run(cli: &Cli) -> xwrap::error::Result<usize> {
    let mut file = MappedFile::open(&cli.file)?;
    let count = sym_to_dyn_reconcile::run(&mut file)?;
    file.flush()?;
    Ok(count)
}

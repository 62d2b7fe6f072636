//! Standalone CLI for [`xwrap::elf::rewrite::dyn_tag_append`].

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use xwrap::elf::rewrite::{dyn_tag_append, MappedFile};

/// Append a `(tag, value)` entry to `.dynamic` by consuming a spare `DT_NULL`.
#[derive(Parser)]
struct Cli {
    file: PathBuf,
    tag: i64,
    val: Option<u64>,
}

fn main() -> ExitCode {
    xwrap::logging::init();
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => {
            tracing::info!(file = %cli.file.display(), tag = cli.tag, "dynappend done");
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(%err, "dynappend failed");
            ExitCode::from(err.exit_code() as u8)
        }
    }
}

fn run(cli: &Cli) -> xwrap::error::Result<()> {
    let mut file = MappedFile::open(&cli.file)?;
    dyn_tag_append::run(&mut file, cli.tag, cli.val)?;
    file.flush()
}

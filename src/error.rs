//! Crate-wide error type and its mapping onto the process exit codes used
//! by both the standalone rewrite tools and the linker plugin (see the
//! error-handling design in the crate-level docs).

use std::fmt;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, XwrapError>;

#[derive(Debug)]
pub enum XwrapError {
    /// Bad argument count or unparsable argument.
    Usage(String),
    /// open/fstat/mmap failure.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Not ELF, wrong class/encoding, or a required section is missing.
    FormatUnsupported { path: PathBuf, reason: String },
    /// dyn_tag_append found no spare `DT_NULL` entry.
    NoSpareDynamicTag,
    /// sym_to_dyn_reconcile needs to rebuild a `SHT_GNU_HASH` table.
    UnimplementedGnuHash,
    /// A restart criterion's fix-up did not satisfy its own predicate.
    RestartLoop { condition: String },
    /// `execve`-equivalent re-exec of the driver failed.
    RestartExecFailed { source: std::io::Error },
    /// A subprocess invocation of the driver (e.g. `ld -r`) exited non-zero.
    SubprocessFailed { command: String, status: i32 },
    /// A symbol is both an explicit `--wrap` target and an xwrap target.
    WrapXwrapConflict { symbol: String },
}

impl XwrapError {
    /// Process exit code matching the error-handling design.
    pub fn exit_code(&self) -> i32 {
        match self {
            XwrapError::Usage(_) => 1,
            XwrapError::Io { .. } => 2,
            XwrapError::FormatUnsupported { .. } => 5,
            XwrapError::NoSpareDynamicTag => 6,
            XwrapError::UnimplementedGnuHash => 99,
            XwrapError::RestartLoop { .. } => 70,
            XwrapError::RestartExecFailed { .. } => 71,
            XwrapError::SubprocessFailed { .. } => 72,
            XwrapError::WrapXwrapConflict { .. } => 7,
        }
    }
}

impl fmt::Display for XwrapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XwrapError::Usage(msg) => write!(f, "{msg}"),
            XwrapError::Io { path, source } => {
                write!(f, "could not access {}: {source}", path.display())
            }
            XwrapError::FormatUnsupported { path, reason } => {
                write!(f, "{}: {reason}", path.display())
            }
            XwrapError::NoSpareDynamicTag => {
                write!(f, "no spare DT_NULL entry in .dynamic")
            }
            XwrapError::UnimplementedGnuHash => {
                write!(f, "unimplemented: rewriting GNU hash table")
            }
            XwrapError::RestartLoop { condition } => {
                write!(f, "restart loop detected for condition `{condition}`")
            }
            XwrapError::RestartExecFailed { source } => {
                write!(f, "re-exec of driver failed: {source}")
            }
            XwrapError::SubprocessFailed { command, status } => {
                write!(f, "subprocess `{command}` exited with status {status}")
            }
            XwrapError::WrapXwrapConflict { symbol } => {
                write!(f, "cannot wrap and xwrap the same symbol (`{symbol}`)")
            }
        }
    }
}

impl std::error::Error for XwrapError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            XwrapError::Io { source, .. } => Some(source),
            XwrapError::RestartExecFailed { source } => Some(source),
            _ => None,
        }
    }
}

//! `xwrap`: rewrites relocatable object files so that `--wrap`-style
//! symbol interposition also works for symbols defined *in the same
//! link*, by combining a handful of targeted ELF mutation primitives
//! with a linker-plugin driver that classifies inputs, aliases the
//! wrapped symbol via a synthesized linker script, and splices a
//! rewritten surrogate back into the ongoing link.
//!
//! Module map:
//! - [`error`]: the crate-wide error type and its process exit codes.
//! - [`env`]: the handful of environment variables this crate reads/sets.
//! - [`logging`]: shared `tracing` subscriber initialization.
//! - [`elf`]: ELF file mapping (read-only classification, read-write
//!   rewrite primitives).
//! - [`cmdline`]: the linker driver's argv parser.
//! - [`classify`]: input classification built on [`elf::fmap`].
//! - [`restart`]: the self-restart driver and its concrete criteria.
//! - [`xwrap`]: orchestration tying the above into the `xwrap` pass.
//! - [`plugin`]: the linker-plugin transfer-vector ABI and adapter.

pub mod classify;
pub mod cmdline;
pub mod elf;
pub mod env;
pub mod error;
pub mod logging;
pub mod plugin;
pub mod restart;
pub mod xwrap;

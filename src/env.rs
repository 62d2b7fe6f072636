//! Centralizes the handful of environment variables this crate reads or
//! writes, so orchestration and the restart driver do not scatter
//! `std::env` calls throughout the codebase.

use std::path::PathBuf;

/// Directory for all temporary files created by this crate. Defaults to
/// `/tmp` when `TMPDIR` is unset, matching the original tool's behavior.
pub fn tmpdir() -> PathBuf {
    std::env::var_os("TMPDIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/tmp"))
}

/// Whether `LD_DELAY_STARTUP` debug-aid mode is requested.
pub fn delay_startup_requested() -> bool {
    std::env::var_os("LD_DELAY_STARTUP").is_some()
}

/// Clears `LD_DELAY_STARTUP` so that a restart does not delay again.
///
/// # Safety
/// Mutating the environment is only sound while the process is
/// single-threaded, which holds at plugin-load time (`onload` runs before
/// the driver has spawned any worker threads on our behalf).
pub unsafe fn clear_delay_startup() {
    std::env::remove_var("LD_DELAY_STARTUP");
}

/// The restart-guard environment variable name for a given mangled
/// condition string (see [`crate::restart::mangle_condition`]).
pub fn restart_guard_name(mangled_condition: &str) -> String {
    format!("LD_PLUGIN_RESTART_GUARD_{mangled_condition}")
}

pub fn restart_guard_present(mangled_condition: &str) -> bool {
    std::env::var_os(restart_guard_name(mangled_condition)).is_some()
}

/// Sets the restart guard so a subsequent re-exec can detect a loop.
///
/// # Safety
/// See [`clear_delay_startup`]: only sound before any additional threads
/// have been spawned.
pub unsafe fn set_restart_guard(mangled_condition: &str) {
    std::env::set_var(restart_guard_name(mangled_condition), "");
}

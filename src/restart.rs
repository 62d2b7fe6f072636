//! Self-restart driver: if the current invocation doesn't satisfy some
//! precondition on its own argv, fix the argv up and re-exec the driver
//! binary, guarding against infinite restart loops with an environment
//! variable stamped before the exec.

use std::io::Write;
use std::os::unix::process::CommandExt;
use std::path::PathBuf;

use crate::env;
use crate::error::{Result, XwrapError};

/// Turns a human-readable condition string into an environment-variable-
/// safe suffix: every byte outside `_` or `'0'..='z'` becomes `_`.
pub fn mangle_condition(condition: &str) -> String {
    condition
        .bytes()
        .map(|b| {
            if b == b'_' || (b'0'..=b'z').contains(&b) {
                b as char
            } else {
                '_'
            }
        })
        .collect()
}

/// Runs one restart criterion: `criterion(argv)` reports whether argv
/// fails some precondition and, if so, the argv that would satisfy it.
/// Returns whether this invocation *is* a restart that was performed to
/// satisfy `condition` (so the caller can skip redundant work), or
/// re-execs the process and never returns.
pub fn restart_if(
    condition: &str,
    argv: &[String],
    criterion: impl FnOnce(&[String]) -> (bool, Vec<String>),
) -> Result<bool> {
    let mangled = mangle_condition(condition);
    let (need, new_argv) = criterion(argv);

    if need {
        if env::restart_guard_present(&mangled) {
            return Err(XwrapError::RestartLoop {
                condition: condition.to_string(),
            });
        }
        tracing::info!(condition, "restarting driver to satisfy missing precondition");
        // SAFETY: called during single-threaded plugin start-up, before
        // any additional threads exist.
        unsafe {
            env::set_restart_guard(&mangled);
        }
        return Err(exec_driver(&new_argv));
    }

    Ok(env::restart_guard_present(&mangled))
}

fn exec_driver(argv: &[String]) -> XwrapError {
    let exe = PathBuf::from("/proc/self/exe");
    let mut cmd = std::process::Command::new(&exe);
    cmd.args(argv);
    // `exec` replaces the current process image; on success this call
    // never returns.
    let err = cmd.exec();
    XwrapError::RestartExecFailed { source: err }
}

/// `missing_option_subseq`: argv must contain `needle` as a contiguous
/// run of tokens; if not, it is appended.
pub fn missing_option_subseq_check(argv: &[String], needle: &[&str]) -> (bool, Vec<String>) {
    let present = argv.windows(needle.len()).any(|w| w.iter().map(String::as_str).eq(needle.iter().copied()));
    if present {
        (false, argv.to_vec())
    } else {
        let mut fixed = argv.to_vec();
        fixed.extend(needle.iter().map(|s| s.to_string()));
        (true, fixed)
    }
}

/// `missing_wrap_options`: argv must contain `--wrap <s>` for every
/// target in `required_wraps` not already covered by an existing `--wrap`
/// in `existing_wraps`.
pub fn missing_wrap_options_check(
    argv: &[String],
    required_wraps: &std::collections::HashSet<String>,
    existing_wraps: &std::collections::HashSet<String>,
) -> (bool, Vec<String>) {
    let missing: Vec<&String> = required_wraps.difference(existing_wraps).collect();
    if missing.is_empty() {
        return (false, argv.to_vec());
    }
    let mut fixed = argv.to_vec();
    for target in missing {
        fixed.push("--wrap".to_string());
        fixed.push(target.clone());
    }
    (true, fixed)
}

/// `missing_ldscript`: when `in_input_targets` is non-empty, argv's
/// element at index 1 must be a `/proc/self/fd/N` path whose realpath
/// basename begins with `tmp.xwrap-ldplugin-lds`; otherwise a linker
/// script mapping each target to its `__wrap_` alias is synthesized and
/// inserted at position 1.
pub fn missing_ldscript_check(
    argv: &[String],
    in_input_targets: &std::collections::HashSet<String>,
) -> Result<(bool, Vec<String>)> {
    if in_input_targets.is_empty() {
        return Ok((false, argv.to_vec()));
    }
    if let Some(existing) = argv.get(1) {
        if is_xwrap_ldscript_fd(existing) {
            return Ok((false, argv.to_vec()));
        }
    }

    let mut script = String::new();
    let mut names: Vec<&String> = in_input_targets.iter().collect();
    names.sort();
    for name in names {
        script.push_str(&format!("{name} = __wrap_{name};\n"));
    }

    let dir = env::tmpdir();
    let path = dir.join(format!("tmp.xwrap-ldplugin-lds.{}", std::process::id()));
    let mut file = std::fs::File::create(&path).map_err(|source| XwrapError::Io {
        path: path.clone(),
        source,
    })?;
    file.write_all(script.as_bytes())
        .map_err(|source| XwrapError::Io {
            path: path.clone(),
            source,
        })?;
    // The path must stay valid across the re-exec that follows: clear
    // FD_CLOEXEC (std opens files close-on-exec by default) and leak the
    // handle so the fd outlives this function's stack frame.
    let fd = std::os::unix::io::AsRawFd::as_raw_fd(&file);
    unsafe {
        libc::fcntl(fd, libc::F_SETFD, 0);
    }
    let fd_path = format!("/proc/self/fd/{fd}");
    std::mem::forget(file);

    let mut fixed = argv.to_vec();
    fixed.insert(1, fd_path);
    Ok((true, fixed))
}

fn is_xwrap_ldscript_fd(path: &str) -> bool {
    if !path.starts_with("/proc/self/fd/") {
        return false;
    }
    match std::fs::read_link(path) {
        Ok(real) => real
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with("tmp.xwrap-ldplugin-lds"))
            .unwrap_or(false),
        Err(_) => false,
    }
}

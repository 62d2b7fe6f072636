//! Component G: ties the command-line model, input classifier, rewrite
//! primitives and self-restart driver together into the `xwrap`
//! orchestration described by the crate's design: claim every input that
//! defines a wrap target, rewrite it into a surrogate that still reaches
//! its original body via a `__real_` alias, and hand the surrogate back
//! to the link in place of the original.

use std::collections::{BTreeMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::classify;
use crate::cmdline;
use crate::elf::fmap::extract_member;
use crate::elf::rewrite::{normalize_relocs, MappedFile};
use crate::env;
use crate::error::{Result, XwrapError};
use crate::restart;

/// One input file `xwrap` has taken over from the driver.
pub struct ClaimedFile {
    pub input_path: PathBuf,
    pub input_offset: u64,
    pub surrogate_path: PathBuf,
    pub targets: HashSet<String>,
}

/// Orchestration state built once per link invocation, after the
/// restart-driven argv has stabilized.
pub struct Xwrap {
    pub argv: Vec<String>,
    pub ld_cmd: PathBuf,
    pub classified: BTreeMap<(PathBuf, u64), HashSet<String>>,
    pub claims: Vec<ClaimedFile>,
    tmp_files: Vec<PathBuf>,
}

impl Xwrap {
    /// Runs the three restart checks of the construction order; returns
    /// `Ok(None)` when this call re-execs (which, on success, never
    /// returns — `Ok(None)` is reachable only if a caller mocks restart).
    /// Returns `Ok(Some(xwrap))` once argv already satisfies every
    /// precondition.
    pub fn bootstrap(argv: Vec<String>, ld_cmd: PathBuf) -> Result<Self> {
        restart::restart_if("-z muldefs", &argv, |argv| {
            restart::missing_option_subseq_check(argv, &["-z", "muldefs"])
        })?;

        let parsed = cmdline::parse(&argv[1..]).map_err(|e| XwrapError::Usage(e.to_string()))?;
        let input_paths: Vec<PathBuf> = parsed
            .inputs
            .iter()
            .filter_map(|i| match i {
                cmdline::ObjectInput::File(f) => Some(PathBuf::from(&f.path)),
                cmdline::ObjectInput::Library(l) => Some(PathBuf::from(&l.name)),
                _ => None,
            })
            .collect();
        let xwrap_targets = parsed.plugin_opt_targets();
        let existing_wraps = parsed.wrap_targets();
        let classified = classify::classify_inputs(&input_paths, &xwrap_targets)?;

        let in_input_targets: HashSet<String> = classified
            .values()
            .flat_map(|names| names.iter().cloned())
            .collect();
        let required_wraps: HashSet<String> = xwrap_targets.difference(&in_input_targets).cloned().collect();

        // A symbol can't be both an explicit --wrap target and an xwrap
        // target in the same input: the two interposition mechanisms
        // would fight over the same symbol.
        if let Some(symbol) = in_input_targets.intersection(&existing_wraps).next() {
            return Err(XwrapError::WrapXwrapConflict {
                symbol: symbol.clone(),
            });
        }

        restart::restart_if("missing wrap options", &argv, |argv| {
            restart::missing_wrap_options_check(argv, &required_wraps, &existing_wraps)
        })?;

        let (need_ldscript, fixed) = restart::missing_ldscript_check(&argv, &in_input_targets)?;
        restart::restart_if("missing ldscript", &argv, move |_| (need_ldscript, fixed.clone()))?;

        Ok(Xwrap {
            argv,
            ld_cmd,
            classified,
            claims: Vec::new(),
            tmp_files: Vec::new(),
        })
    }

    /// `claim_file`: does `(path, offset)` define any wrap target? If so,
    /// materialize and return the surrogate path; the caller (the plugin
    /// adapter) is responsible for telling the driver it claimed the file.
    pub fn claim_file(&mut self, path: &Path, offset: u64) -> Result<Option<PathBuf>> {
        let key = (path.to_path_buf(), offset);
        let Some(targets) = self.classified.get(&key).cloned() else {
            return Ok(None);
        };
        if targets.is_empty() {
            return Ok(None);
        }
        let surrogate = self.create_surrogate(path, offset, &targets)?;
        self.claims.push(ClaimedFile {
            input_path: path.to_path_buf(),
            input_offset: offset,
            surrogate_path: surrogate.clone(),
            targets,
        });
        Ok(Some(surrogate))
    }

    fn next_tmp_path(&mut self, purpose: &str) -> PathBuf {
        let path = env::tmpdir().join(format!(
            "tmp.{purpose}.{}.{}",
            std::process::id(),
            self.tmp_files.len()
        ));
        self.tmp_files.push(path.clone());
        path
    }

    /// Copies the claimed member to a temporary file, normalizes its
    /// relocations for each wrap target, then re-invokes the driver as a
    /// `-r` subprocess to synthesize `__real_<sym> = <sym>` aliases,
    /// producing the final surrogate object.
    fn create_surrogate(&mut self, path: &Path, offset: u64, targets: &HashSet<String>) -> Result<PathBuf> {
        let bytes = extract_member(path, offset)?;
        let staged = self.next_tmp_path("xwrap-surrogate-stage");
        write_file(&staged, &bytes)?;

        {
            let mut file = MappedFile::open(&staged)?;
            for target in targets {
                normalize_relocs::run(&mut file, Some(target.as_str()))?;
            }
            file.flush()?;
        }

        let surrogate = self.next_tmp_path("xwrap-surrogate");
        let mut cmd = Command::new(&self.ld_cmd);
        cmd.arg("-r").arg("-o").arg(&surrogate).arg(&staged);
        let mut names: Vec<&String> = targets.iter().collect();
        names.sort();
        for name in names {
            cmd.arg(format!("--defsym=__real_{name}={name}"));
        }
        tracing::info!(?path, offset, ?surrogate, "running -r pass to synthesize __real_ aliases");
        let status = cmd.status().map_err(|source| XwrapError::Io {
            path: self.ld_cmd.clone(),
            source,
        })?;
        if !status.success() {
            return Err(XwrapError::SubprocessFailed {
                command: format!("{} -r -o {} {}", self.ld_cmd.display(), surrogate.display(), staged.display()),
                status: status.code().unwrap_or(-1),
            });
        }
        Ok(surrogate)
    }

    /// `all_symbols_read`: every claimed surrogate still needs to be fed
    /// back into the link via the driver's `add_input_file` operation,
    /// which the caller supplies (so this module stays free of the raw
    /// plugin ABI).
    pub fn surrogates(&self) -> impl Iterator<Item = &Path> {
        self.claims.iter().map(|c| c.surrogate_path.as_path())
    }

    /// Best-effort cleanup of every temporary this run created.
    pub fn cleanup(&self) {
        for path in &self.tmp_files {
            if let Err(err) = std::fs::remove_file(path) {
                tracing::warn!(?path, %err, "failed to remove temporary file");
            }
        }
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = std::fs::File::create(path).map_err(|source| XwrapError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    file.write_all(bytes).map_err(|source| XwrapError::Io {
        path: path.to_path_buf(),
        source,
    })
}

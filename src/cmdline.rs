//! Parses a linker driver's argv into positional input files and
//! recognized options, the way `ld` itself does: iteratively, tracking a
//! binding-mode/`--as-needed` stack across `--push-state`/`--pop-state`,
//! resolving `-l`/`-L` against a search path, and disambiguating joined
//! vs. separated option-argument forms.
//!
//! `clap`'s declarative derive grammar can't express this (joined vs.
//! separated ambiguity, a mode stack, library-path search) so this stays
//! a hand-rolled scanner, same as the driver-argv parser it replaces.

use std::path::{Path, PathBuf};

use anyhow::anyhow;

/// Binding mode toggled by `-Bstatic`/`-Bdynamic` and their GNU ld
/// aliases (`-dn`/`-non_shared`/`-static`, `-dy`/`-call_shared`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BindingMode {
    #[default]
    Default,
    Static,
    Dynamic,
}

#[derive(Debug, Clone, Copy)]
struct OptStack {
    as_needed: bool,
    binding: BindingMode,
}

#[derive(Debug, Clone)]
pub struct FileInput {
    pub path: String,
    pub as_needed: bool,
}

#[derive(Debug, Clone)]
pub struct LibraryInput {
    pub name: String,
    pub as_needed: bool,
    pub binding: BindingMode,
}

#[derive(Debug, Clone)]
pub enum ObjectInput {
    File(FileInput),
    Library(LibraryInput),
    StartGroup,
    EndGroup,
}

/// One recognized option occurrence, in argv order. `name` is the
/// canonical (long, when one exists) spelling so callers don't need to
/// know every alias.
#[derive(Debug, Clone)]
pub struct ParsedOption {
    pub name: String,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DriverArgs {
    pub inputs: Vec<ObjectInput>,
    pub options: Vec<ParsedOption>,
    pub search_dirs: Vec<String>,
}

impl DriverArgs {
    pub fn option_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.options
            .iter()
            .filter(move |o| o.name == name)
            .filter_map(|o| o.value.as_deref())
    }

    pub fn has_flag(&self, name: &str) -> bool {
        self.options.iter().any(|o| o.name == name)
    }

    pub fn wrap_targets(&self) -> std::collections::HashSet<String> {
        self.option_values("--wrap").map(str::to_string).collect()
    }

    /// The xwrap-target symbol names, taken from `-plugin-opt` values
    /// (each value names one target directly).
    pub fn plugin_opt_targets(&self) -> std::collections::HashSet<String> {
        self.option_values("-plugin-opt").map(str::to_string).collect()
    }
}

/// `(canonical long name, aliases..., takes an argument)`, ordered so
/// that any option string that is a prefix of another comes *after* it
/// (`-rpath-link` before `-rpath`, `-plugin-opt` before `-plugin`, etc.)
/// so the longest match wins.
const OPTS_WITH_ARG: &[(&str, &[&str])] = &[
    ("--export-dynamic-symbol-list", &[]),
    ("--export-dynamic-symbol", &[]),
    ("--dependency-file", &[]),
    ("--retain-symbols-file", &[]),
    ("--version-exports-section", &[]),
    ("--version-script", &[]),
    ("--require-defined", &[]),
    ("--spare-dynamic-tags", &[]),
    ("--dynamic-list", &[]),
    ("--sort-section", &[]),
    ("--ignore-unresolved-symbol", &[]),
    ("--out-implib", &[]),
    ("--oformat", &[]),
    ("--task-link", &[]),
    ("--section-start", &[]),
    ("--defsym", &[]),
    ("--wrap", &[]),
    ("-plugin-opt", &[]),
    ("-plugin", &[]),
    ("-rpath-link", &[]),
    ("-rpath", &[]),
    ("-Ttext-segment", &[]),
    ("-Trodata-segment", &[]),
    ("-Tldata-segment", &[]),
    ("-Ttext", &[]),
    ("-Tdata", &[]),
    ("-Tbss", &[]),
    ("--architecture", &["-A"]),
    ("--format", &["-b"]),
    ("--mri-script", &["-c"]),
    ("--entry", &["-e"]),
    ("--auxiliary", &["-f"]),
    ("--filter", &["-F"]),
    ("--gpsize", &["-G"]),
    ("-soname", &["-h"]),
    ("--dynamic-linker", &["-I"]),
    ("--just-symbols", &["-R"]),
    ("--trace-symbol", &["-y"]),
    ("--output", &["-o"]),
    ("-a", &[]),
    ("-m", &[]),
    ("-Y", &[]),
    ("-assert", &[]),
    ("-fini", &[]),
    ("-init", &[]),
    ("-Map", &[]),
    ("-z", &[]),
    ("-P", &[]),
];

fn lookup_opt(token: &str) -> Option<(&'static str, &'static str)> {
    for (canonical, aliases) in OPTS_WITH_ARG {
        if token.starts_with(canonical) {
            return Some((canonical, canonical));
        }
        for alias in *aliases {
            if token.starts_with(alias) {
                return Some((canonical, alias));
            }
        }
    }
    None
}

/// Splits `token` into `(literal-match-length, joined-value)` if `token`
/// carries a joined argument for `literal` (e.g. `-Map=out.map` or
/// `-belf64-x86-64`), or `None` if `token` is exactly `literal` (meaning
/// the argument is a separate, following token).
fn joined_value<'t>(token: &'t str, literal: &str) -> Option<&'t str> {
    if token.len() == literal.len() {
        return None;
    }
    let rest = &token[literal.len()..];
    Some(rest.strip_prefix('=').unwrap_or(rest))
}

fn resolve_library(name: &str, search_dirs: &[String], static_only: bool) -> Option<PathBuf> {
    for dir in search_dirs {
        if !static_only {
            let so = Path::new(dir).join(format!("lib{name}.so"));
            if so.exists() {
                return Some(so);
            }
        }
        let a = Path::new(dir).join(format!("lib{name}.a"));
        if a.exists() {
            return Some(a);
        }
    }
    None
}

/// Parses the driver's argv (excluding argv[0]) into a [`DriverArgs`].
pub fn parse(args: &[String]) -> anyhow::Result<DriverArgs> {
    let mut out = DriverArgs::default();
    let mut cur = OptStack {
        as_needed: false,
        binding: BindingMode::Default,
    };
    let mut stack = Vec::new();
    let mut iter = args.iter().peekable();
    let mut literal_parsing = true;

    while let Some(arg) = iter.next() {
        if !literal_parsing {
            out.inputs.push(ObjectInput::File(FileInput {
                path: arg.clone(),
                as_needed: cur.as_needed,
            }));
            continue;
        }
        match arg.as_str() {
            "--" => {
                literal_parsing = false;
            }
            "--push-state" => stack.push(cur),
            "--pop-state" => {
                cur = stack.pop().ok_or_else(|| anyhow!("--pop-state without matching --push-state"))?;
            }
            "--as-needed" => cur.as_needed = true,
            "--no-as-needed" => cur.as_needed = false,
            "-Bstatic" | "-dn" | "-non_shared" | "-static" => cur.binding = BindingMode::Static,
            "-Bdynamic" | "-dy" | "-call_shared" => cur.binding = BindingMode::Dynamic,
            "--start-group" => out.inputs.push(ObjectInput::StartGroup),
            "--end-group" => out.inputs.push(ObjectInput::EndGroup),
            s if s.starts_with("-L") && s.len() > 2 => {
                out.search_dirs.push(s[2..].to_string());
            }
            "-L" => {
                let dir = iter
                    .next()
                    .ok_or_else(|| anyhow!("missing argument after -L"))?;
                out.search_dirs.push(dir.clone());
            }
            s if s.starts_with("-l") && s.len() > 2 => {
                let name = &s[2..];
                let is_static = cur.binding == BindingMode::Static;
                let resolved = resolve_library(name, &out.search_dirs, is_static)
                    .map(|p| p.to_string_lossy().into_owned());
                out.inputs.push(ObjectInput::Library(LibraryInput {
                    name: resolved.unwrap_or_else(|| name.to_string()),
                    as_needed: cur.as_needed,
                    binding: cur.binding,
                }));
            }
            s if s.starts_with('-') && s.len() > 1 => {
                if let Some((canonical, literal)) = lookup_opt(s) {
                    let value = match joined_value(s, literal) {
                        Some(v) => Some(v.to_string()),
                        None => Some(
                            iter.next()
                                .ok_or_else(|| anyhow!("missing argument after {s}"))?
                                .clone(),
                        ),
                    };
                    out.options.push(ParsedOption {
                        name: canonical.to_string(),
                        value,
                    });
                } else {
                    out.options.push(ParsedOption {
                        name: s.to_string(),
                        value: None,
                    });
                }
            }
            s => {
                out.inputs.push(ObjectInput::File(FileInput {
                    path: s.to_string(),
                    as_needed: cur.as_needed,
                }));
            }
        }
    }
    Ok(out)
}

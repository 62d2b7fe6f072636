//! Shared `tracing` initialization for every binary and for the plugin
//! cdylib's `onload` entry point.

use std::sync::Once;

static INIT: Once = Once::new();

/// Installs a `tracing_subscriber::fmt` subscriber driven by `RUST_LOG`
/// (default `info`). Safe to call more than once; only the first call
/// takes effect, which matters for `onload`, which may run more than once
/// across a self-restart within the same process tree but never twice
/// within a single process.
pub fn init() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    });
}

use std::env;
use std::io;

use once_cell::sync::OnceCell;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{reload, EnvFilter, Registry};

static FILTER: OnceCell<reload::Handle<EnvFilter, Registry>> = OnceCell::new();

/// Filter directive: RUST_LOG wins, else debug for this crate with `--debug`, else warnings only.
pub fn default_filter(debug: bool) -> String {
    match env::var("RUST_LOG") {
        Ok(v) if !v.trim().is_empty() => v,
        _ if debug => "spoon=debug".to_string(),
        _ => "warn".to_string(),
    }
}

fn env_filter(debug: bool) -> EnvFilter {
    EnvFilter::try_new(default_filter(debug)).unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Install the stderr subscriber once; later calls are ignored.
///
/// Runs before the config file is read, so `debug` reflects the command line
/// only. [`set_debug`] applies the resolved value afterwards.
pub fn init_logging(debug: bool) {
    if FILTER.get().is_some() {
        return;
    }
    let (filter, handle) = reload::Layer::new(env_filter(debug));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .without_time()
        .with_target(false);
    if tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .is_err()
    {
        eprintln!("spoon: logging init skipped (global subscriber already set)");
        return;
    }
    let _ = FILTER.set(handle);
}

/// Swap the active filter once the final `debug` setting is known.
pub fn set_debug(debug: bool) {
    if let Some(handle) = FILTER.get() {
        if let Err(e) = handle.reload(env_filter(debug)) {
            tracing::warn!("failed to update log filter: {e}");
        }
    }
}

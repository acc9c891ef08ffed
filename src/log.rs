//! Structured logging setup.
//!
//! Log levels:
//! - ERROR: Failures that abort a request or a loop
//! - WARN: Recoverable surprises (rejected expressions, failed polls)
//! - INFO: Lifecycle notifications (startup, shutdown, resolved expressions)
//! - DEBUG: Per-task dispatch and result traces
//! - TRACE: HTTP request internals
//!
//! Debug mode can be enabled with the `--debug` flag or `CALCFLOW_DEBUG=1`.
//! `RUST_LOG`, when set, replaces the default filter entirely.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static DEBUG_ENABLED: AtomicBool = AtomicBool::new(false);

/// Initialize logging at the default level.
pub fn init() {
    init_with_debug(false);
}

/// Initialize logging with explicit debug mode setting.
///
/// Safe to call more than once; only the first call installs a subscriber.
pub fn init_with_debug(debug: bool) {
    let debug_enabled = debug || env_debug(std::env::var("CALCFLOW_DEBUG").ok().as_deref());
    DEBUG_ENABLED.store(debug_enabled, Ordering::SeqCst);

    let filter = match std::env::var("RUST_LOG") {
        Ok(directives) => EnvFilter::new(directives),
        Err(_) => default_filter(default_level(debug_enabled)),
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .try_init();
}

/// Check if debug mode is enabled.
pub fn is_debug() -> bool {
    DEBUG_ENABLED.load(Ordering::Relaxed)
}

fn env_debug(value: Option<&str>) -> bool {
    value
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn default_level(debug: bool) -> Level {
    if debug {
        Level::DEBUG
    } else {
        Level::INFO
    }
}

fn default_filter(level: Level) -> EnvFilter {
    // Keep dependency chatter down unless asked for via RUST_LOG.
    let mut filter = EnvFilter::new(format!("calcflow={}", level));
    for directive in ["tower_http=info", "hyper=warn", "reqwest=warn"] {
        if let Ok(d) = directive.parse() {
            filter = filter.add_directive(d);
        }
    }
    filter
}

//! Tracing subscriber setup for hosts embedding the session controller.

use tracing_subscriber::{fmt, EnvFilter};

/// Filter directives are read from this variable; `info` when unset or invalid.
pub const LOG_ENV_VAR: &str = "DRAFT_SESSION_LOG";

/// Installs a global fmt subscriber. Returns `false` if one was already installed.
pub fn init_tracing() -> bool {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}

//! sqldeck query core.
//!
//! The engine behind a browser-served SQL workbench: context-sensitive
//! completion over a cached schema snapshot, a versioned schema cache with
//! explicit invalidation, and a permission-gated execution gateway over
//! pluggable database backends.

pub mod api;
pub mod config;
pub mod error;
pub mod services;

pub use api::{GeneratedSql, QueryCore};
pub use config::CoreConfig;
pub use error::{CoreError, CoreResult};

/// Install the process-wide tracing subscriber. Hosts call this once at
/// startup; repeated calls are ignored.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

//! Core of a Postgres admin client that talks to a local HTTP backend:
//! a shared persistent key-value store with cross-context change
//! propagation, a paginated query execution engine, keyboard shortcut
//! dispatch, and the user-level actions built on top of them.

pub mod actions;
pub mod boundary;
pub mod keymap;
pub mod notify;
pub mod services;
pub mod store;

pub use actions::{Actions, ConnectionForm};
pub use services::{HealthChecker, HttpBackendApi, QueryEngine};
pub use store::{SharedStore, StoreContext};

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber. `RUST_LOG` overrides the
/// default `info` filter.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

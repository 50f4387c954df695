pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod sync;

#[cfg_attr(not(test), allow(dead_code))]
pub mod test_support;

use env_logger::Env;
use std::sync::Once;

pub use error::{ConfigError, SyncError};
pub use sync::SyncService;

static LOGGER: Once = Once::new();

/// Initialise `env_logger` once; `RUST_LOG` overrides the default filter.
pub fn init_logger() {
    LOGGER.call_once(|| {
        env_logger::Builder::from_env(Env::default().default_filter_or("info,sqlx=warn")).init();
    });
}

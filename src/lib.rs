//! reposcope - live repository state for Git clients
//!
//! Keeps branches, tags, history, working copy changes and commit details of
//! an open repository up to date, driven by a file watcher, an auto-fetch
//! timer and explicit refreshes.

pub mod commands;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod state;
pub mod utils;

#[cfg(test)]
mod test_utils;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub use config::AppPreferences;
pub use error::{ReposcopeError, Result};
pub use state::{Repository, RepositorySnapshot};

/// Install the default tracing subscriber.
///
/// `RUST_LOG` overrides the default filter. Calling this more than once, or
/// after another subscriber was installed, does nothing.
pub fn init_tracing() {
    let result = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reposcope=debug,git2=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    if result.is_ok() {
        tracing::info!("Starting reposcope");
    }
}

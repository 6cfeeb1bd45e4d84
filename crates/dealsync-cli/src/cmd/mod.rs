pub mod board;
pub mod config;
pub mod gate;
pub mod init;
pub mod stage;
pub mod sync;

use anyhow::Context;
use dealsync_core::config::Config;
use dealsync_core::SyncError;
use std::path::Path;

/// Load `.dealsync/config.yaml`, or the built-in defaults when the project
/// has not been initialised.
pub fn load_config(root: &Path) -> anyhow::Result<Config> {
    match Config::load(root) {
        Ok(cfg) => Ok(cfg),
        Err(SyncError::NotInitialized) => {
            tracing::debug!(root = %root.display(), "no config file, using defaults");
            Ok(Config::default())
        }
        Err(e) => Err(e).context("failed to load config"),
    }
}

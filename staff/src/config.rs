//! Staff service configuration.

use std::path::PathBuf;

/// Configuration for the staff permission service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaffConfig {
    /// Whether effective permissions are memoised
    pub permission_cache: bool,
    /// Capacity of the invalidation broadcast channel
    pub invalidation_buffer: usize,
    /// Emit logs as JSON instead of human-readable lines
    pub log_json: bool,
    /// Hierarchy snapshot loaded by the inspection tool
    pub snapshot_path: Option<PathBuf>,
}

impl Default for StaffConfig {
    fn default() -> Self {
        Self {
            permission_cache: true,
            invalidation_buffer: 256,
            log_json: true,
            snapshot_path: None,
        }
    }
}

impl StaffConfig {
    /// Creates configuration from environment variables.
    ///
    /// Environment variables:
    /// - `STAFF_PERMISSION_CACHE`: Enable/disable the permission cache (default: true)
    /// - `STAFF_INVALIDATION_BUFFER`: Invalidation channel capacity (default: 256)
    /// - `STAFF_LOG_JSON`: JSON log output (default: true)
    /// - `STAFF_SNAPSHOT_PATH`: Path of a hierarchy snapshot (optional)
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("STAFF_PERMISSION_CACHE") {
            config.permission_cache = val.parse().unwrap_or(true);
        }
        if let Ok(val) = std::env::var("STAFF_INVALIDATION_BUFFER") {
            // broadcast::channel panics on zero capacity
            config.invalidation_buffer = val
                .parse()
                .ok()
                .filter(|&n: &usize| n > 0)
                .unwrap_or(256);
        }
        if let Ok(val) = std::env::var("STAFF_LOG_JSON") {
            config.log_json = val.parse().unwrap_or(true);
        }
        if let Ok(val) = std::env::var("STAFF_SNAPSHOT_PATH") {
            if !val.trim().is_empty() {
                config.snapshot_path = Some(PathBuf::from(val));
            }
        }

        config
    }
}

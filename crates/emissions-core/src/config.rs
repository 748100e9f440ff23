//! Engine configuration resolved from the environment.

use std::path::{Path, PathBuf};

/// Environment variable naming the SQLite database file.
pub const DB_PATH_ENV: &str = "EMISSIONS_DB_PATH";

/// Environment variable bounding the worker pool used for batch calculations.
pub const BATCH_WORKERS_ENV: &str = "EMISSIONS_BATCH_WORKERS";

pub const DEFAULT_DB_PATH: &str = "~/.emissions/emissions.db";

#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    pub db_path: PathBuf,
    pub batch_workers: usize,
}

impl EngineConfig {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: expand_tilde(&db_path.as_ref().to_string_lossy()),
            batch_workers: default_workers(),
        }
    }

    pub fn with_batch_workers(mut self, workers: usize) -> Self {
        self.batch_workers = workers.max(1);
        self
    }

    /// Build a config from `EMISSIONS_DB_PATH` / `EMISSIONS_BATCH_WORKERS`,
    /// falling back to defaults for absent or unparseable values.
    pub fn from_env() -> Self {
        let db_path = std::env::var(DB_PATH_ENV)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_DB_PATH.to_string());
        let workers = std::env::var(BATCH_WORKERS_ENV)
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok());

        let config = Self::new(db_path);
        match workers {
            Some(n) => config.with_batch_workers(n),
            None => config,
        }
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            let mut expanded = PathBuf::from(home);
            if path.len() > 2 {
                expanded.push(&path[2..]);
            }
            return expanded;
        }
    }
    PathBuf::from(path)
}

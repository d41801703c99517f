//! Runtime configuration
//!
//! # Environment variables
//!
//! | Variable | Default | Purpose |
//! |----------|---------|---------|
//! | POS_DATA_DIR | /var/lib/pos-core | Database directory |
//! | POS_LOG_DIR | (unset) | Log directory; console-only when unset |
//! | POS_LOG_LEVEL | info | Default log level (`RUST_LOG` still wins) |

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub log_dir: Option<PathBuf>,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            data_dir: std::env::var_os("POS_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("/var/lib/pos-core")),
            log_dir: std::env::var_os("POS_LOG_DIR").map(PathBuf::from),
            log_level: std::env::var("POS_LOG_LEVEL").unwrap_or_else(|_| "info".into()),
        }
    }

    /// Path of the database file inside the data directory
    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join("pos.redb")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

//! Server configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Directory holding `queue-auth.json` and `backups/`.
    pub data_dir: PathBuf,
    /// Directory served for all non-API paths.
    pub static_dir: PathBuf,
    /// Landing document served when a static path misses.
    pub landing_file: String,
    pub max_payload_size: usize,
    /// How often the inactivity sweep runs.
    pub sweep_interval_secs: u64,
    /// A queue untouched for longer than this is swept.
    pub retention_secs: i64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8420".to_string(),
            data_dir: PathBuf::from("data"),
            static_dir: PathBuf::from("public"),
            landing_file: "index.html".to_string(),
            max_payload_size: 1_048_576,
            sweep_interval_secs: 86_400,
            retention_secs: 86_400,
        }
    }
}

impl ServerConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn landing_path(&self) -> PathBuf {
        self.static_dir.join(&self.landing_file)
    }
}

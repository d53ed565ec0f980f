use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use pyrite_core::{Error, Result};

/// Node configuration, read from a JSON file.
///
/// ```json
/// {
///   "database": { "path": "./data/chain", "clean": false },
///   "keys_dir": "./data/keys",
///   "api_address": "127.0.0.1:50051",
///   "net": {
///     "listen_address": "0.0.0.0:20203",
///     "public_port": 20203,
///     "peers": ["203.0.113.7:20203"]
///   },
///   "miner": { "threads": 4, "enabled": true }
/// }
/// ```
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub keys_dir: PathBuf,
    pub api_address: SocketAddr,
    pub net: NetConfig,
    #[serde(default)]
    pub miner: MinerConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    /// Empty the database directory on startup (resync from the network).
    #[serde(default)]
    pub clean: bool,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NetConfig {
    pub listen_address: SocketAddr,
    /// Port advertised to peers; defaults to the listen port.
    #[serde(default)]
    pub public_port: Option<u16>,
    #[serde(default)]
    pub peers: Vec<SocketAddr>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct MinerConfig {
    /// Worker threads; defaults to hardware concurrency.
    #[serde(default)]
    pub threads: Option<usize>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            threads: None,
            enabled: true,
        }
    }
}

fn default_true() -> bool {
    true
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::InaccessibleFile(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&raw)
            .map_err(|e| Error::Parsing(format!("{}: {e}", path.display())))
    }
}

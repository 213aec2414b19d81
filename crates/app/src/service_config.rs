use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use common::prelude::DriveConfig;

/// Which node store the service talks to
#[derive(Debug, Clone)]
pub enum StoreBackend {
    /// The remote filesystem API
    Remote { base_url: Url, api_key: String },
    /// An in-process store seeded with the given users, for local testing
    Memory { users: Vec<String> },
}

#[derive(Debug)]
pub struct Config {
    // store configuration
    pub backend: StoreBackend,
    /// lock, cache and retry tunables
    pub drive: DriveConfig,

    // http server configuration
    /// Port for the API HTTP server
    pub listen_port: u16,

    // background work
    /// How often expired cache entries are reclaimed
    pub sweep_interval: Duration,

    // logging
    pub log_level: tracing::Level,
    /// Directory for log files (optional, logs to stdout only if not set)
    pub log_dir: Option<PathBuf>,
}

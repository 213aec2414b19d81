use std::path::PathBuf;

use clap::Args;
use url::Url;

use drive_app::state::{AppConfig, AppState};

#[derive(Args, Debug, Clone)]
pub struct Init {
    /// Port for the HTTP API
    #[arg(long, default_value_t = 3000)]
    pub listen_port: u16,

    /// Base URL of the remote filesystem API
    #[arg(long)]
    pub api_base_url: Option<Url>,

    /// Directory for log files (defaults to <config dir>/logs when serving)
    #[arg(long)]
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("init failed: {0}")]
    StateFailed(#[from] drive_app::state::StateError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Init {
    type Error = InitError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let config = AppConfig {
            listen_port: self.listen_port,
            api_base_url: self.api_base_url.clone(),
            log_dir: self.log_dir.clone(),
            ..Default::default()
        };

        let state = AppState::init(ctx.config_path.clone(), Some(config))?;

        let remote = match &state.config.api_base_url {
            Some(url) => url.to_string(),
            None => "not set (use --memory-store or edit config.toml)".to_string(),
        };

        Ok(format!(
            "Initialized drive directory at: {}\n\
             - Config: {}\n\
             - Listen port: {}\n\
             - Remote API: {}\n\
             - Lock timeout: {}s",
            state.drive_dir.display(),
            state.config_path.display(),
            state.config.listen_port,
            remote,
            state.config.lock_timeout_secs,
        ))
    }
}

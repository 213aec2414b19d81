use std::path::PathBuf;

use clap::Args;

use drive_app::state::AppState;
use drive_app::{spawn_service, ServiceConfig, StoreBackend};

#[derive(Args, Debug, Clone)]
pub struct Serve {
    /// Override the API port (default from config)
    #[arg(long)]
    pub port: Option<u16>,

    /// Run against an in-process store instead of the remote API
    #[arg(long)]
    pub memory_store: bool,

    /// Users to create in the in-process store (repeatable)
    #[arg(long = "user", requires = "memory_store")]
    pub users: Vec<String>,

    /// Bearer key for the remote API
    #[arg(long, env = "DRIVE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Directory for log files (default from config)
    #[arg(long)]
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("state error: {0}")]
    StateError(#[from] drive_app::state::StateError),

    #[error("no remote API configured: set api_base_url in config.toml or pass --memory-store")]
    MissingApiBaseUrl,

    #[error("no API key: set DRIVE_API_KEY, pass --api-key or set api_key in config.toml")]
    MissingApiKey,
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Serve {
    type Error = ServeError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let state = AppState::load(ctx.config_path.clone())?;

        let backend = if self.memory_store {
            StoreBackend::Memory {
                users: self.users.clone(),
            }
        } else {
            let base_url = state
                .config
                .api_base_url
                .clone()
                .ok_or(ServeError::MissingApiBaseUrl)?;
            let api_key = self
                .api_key
                .clone()
                .or_else(|| state.config.api_key.clone())
                .ok_or(ServeError::MissingApiKey)?;
            StoreBackend::Remote { base_url, api_key }
        };

        let config = ServiceConfig {
            backend,
            drive: state.config.drive_config(),
            listen_port: self.port.unwrap_or(state.config.listen_port),
            sweep_interval: state.config.sweep_interval(),
            log_level: tracing::Level::DEBUG,
            log_dir: Some(self.log_dir.clone().unwrap_or_else(|| state.log_dir())),
        };

        spawn_service(&config).await;
        Ok("drive service stopped".to_string())
    }
}

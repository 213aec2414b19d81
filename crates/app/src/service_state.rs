use std::sync::Arc;

use common::prelude::{
    CacheValue, Drive, DriveConfig, MemoryCache, MemoryNodeStore, NewUser, NodeStore, StoreError,
};

use crate::remote::{HttpNodeStore, RemoteError};
use crate::service_config::{Config, StoreBackend};

pub type ServiceDrive = Drive<Arc<dyn NodeStore>>;

/// Main service state, shared by every request handler
#[derive(Clone)]
pub struct State {
    drive: Arc<ServiceDrive>,
    cache: Arc<MemoryCache<CacheValue>>,
}

impl State {
    pub async fn from_config(config: &Config) -> Result<Self, StateSetupError> {
        match &config.backend {
            StoreBackend::Remote { base_url, api_key } => {
                tracing::info!(%base_url, "using remote node store");
                let store = HttpNodeStore::new(base_url, api_key)?;
                Ok(Self::with_store(Arc::new(store), config.drive.clone()))
            }
            StoreBackend::Memory { users } => {
                tracing::info!(users = ?users, "using in-memory node store");
                Self::memory(users, config.drive.clone()).await
            }
        }
    }

    pub fn with_store(store: Arc<dyn NodeStore>, config: DriveConfig) -> Self {
        let cache = Arc::new(MemoryCache::<CacheValue>::with_capacity(
            config.cache.max_entries,
        ));
        let drive = Drive::new(store, cache.clone(), config);
        Self {
            drive: Arc::new(drive),
            cache,
        }
    }

    /// State over a fresh in-memory store holding `users`
    pub async fn memory(users: &[String], config: DriveConfig) -> Result<Self, StateSetupError> {
        let state = Self::with_store(Arc::new(MemoryNodeStore::new()), config);
        for username in users {
            let user = NewUser {
                username: username.clone(),
                email: format!("{username}@localhost"),
                salt: String::new(),
                key: String::new(),
            };
            state.drive.store().create_user(&user).await?;
        }
        Ok(state)
    }

    pub fn drive(&self) -> &ServiceDrive {
        &self.drive
    }

    pub fn cache(&self) -> &Arc<MemoryCache<CacheValue>> {
        &self.cache
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateSetupError {
    #[error("remote store setup failed: {0}")]
    Remote(#[from] RemoteError),
    #[error("seeding users failed: {0}")]
    Seed(#[from] StoreError),
}

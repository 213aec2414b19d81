// Service modules
pub mod http_server;
pub mod process;
pub mod remote;
pub mod service_config;
pub mod service_state;

// App state (configuration, paths)
pub mod state;

// Build metadata
pub mod version;

pub use process::{spawn_service, start_service, ShutdownHandle};
pub use service_config::{Config as ServiceConfig, StoreBackend};
pub use service_state::State as ServiceState;
pub use state::{AppConfig, AppState, StateError};

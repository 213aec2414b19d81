mod client;
mod error;

pub use client::HttpNodeStore;
pub use error::RemoteError;

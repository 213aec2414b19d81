#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("HTTP client setup failed: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("API key is not a valid header value")]
    InvalidApiKey(#[from] reqwest::header::InvalidHeaderValue),
    #[error("unsupported API base URL: {0}")]
    BaseUrl(String),
}

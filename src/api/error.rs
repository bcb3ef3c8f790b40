use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("server returned HTTP {code}")]
    HttpStatus { code: u16 },

    #[error("could not parse dataset response: {0}")]
    Parse(#[from] serde_json::Error),
}

impl SyncError {
    pub fn from_status(status: reqwest::StatusCode) -> Self {
        SyncError::HttpStatus {
            code: status.as_u16(),
        }
    }

    /// Timeouts and connection failures surface as `Network`; they are the
    /// expected failure mode for background freshness probes.
    pub fn is_network(&self) -> bool {
        matches!(self, SyncError::Network(_))
    }
}

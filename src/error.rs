use thiserror::Error;

/// Failures talking to the remote playback API.
#[derive(Debug, Error)]
pub enum SyncError {
    /// 401/403: the token expired or was revoked, the user has to log in again
    #[error("access token rejected (HTTP {0})")]
    AuthExpired(u16),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("unexpected HTTP status {0}")]
    UnexpectedStatus(u16),
}

impl SyncError {
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, SyncError::AuthExpired(_))
    }
}

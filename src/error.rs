use thiserror::Error;

#[derive(Error, Debug)]
pub enum LeaderboardError {
    #[error("local storage is not available")]
    StorageUnavailable,

    #[error("local storage error: {0}")]
    Storage(String),

    #[error("stored scores are corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("remote leaderboard is not configured")]
    NotConfigured,

    #[error("invalid remote configuration: {0}")]
    InvalidConfig(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("remote returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("malformed remote response: {0}")]
    MalformedResponse(String),

    #[error("invalid score: {0}")]
    InvalidScore(String),

    #[error("DOM call failed: {0}")]
    Dom(String),

    #[error("missing page element #{0}")]
    MissingElement(&'static str),

    #[error("cancelled by user")]
    Cancelled,
}

pub type Result<T, E = LeaderboardError> = std::result::Result<T, E>;

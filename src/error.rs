#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("invalid commits payload: {0}")]
    PayloadError(#[from] serde_json::Error),

    #[error("commits payload must be a JSON array, got {0}")]
    PayloadShapeError(String),

    #[error("deploy command failed: {0}")]
    DeployCommandError(String),

    #[error("news feed request failed: {0}")]
    NewsFeedError(String),

    #[error("datastore request failed: {0}")]
    DatastoreError(String),
}

pub type Result<T> = std::result::Result<T, Error>;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("auth error: {0}")]
    Auth(String),
    #[error("remote store error: {0}")]
    Store(String),
    #[error("object storage error: {0}")]
    Storage(String),
    #[error("text generation error: {0}")]
    Generation(String),
    #[error("credential error: {0}")]
    Credential(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("state error: {0}")]
    State(String),
    #[error("no authenticated session")]
    SessionExpired,
}

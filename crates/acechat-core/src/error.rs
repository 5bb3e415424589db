use thiserror::Error;

/// Errors surfaced by the chat backend and the settings store.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Http(#[from] reqwest::Error),

    #[error("Server error: {0}")]
    Status(u16),

    #[error("invalid response: {0}")]
    Json(#[from] serde_json::Error),

    /// The server answered but refused the operation (missing `"status": "success"`,
    /// or an explicit `error` field).
    #[error("{0}")]
    Rejected(String),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("could not determine config directory")]
    NoConfigDir,
}

pub type Result<T> = std::result::Result<T, Error>;

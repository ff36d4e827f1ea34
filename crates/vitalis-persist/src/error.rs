use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersistError {
    #[error("Backend request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Backend error ({status}): {body}")]
    Backend { status: u16, body: String },

    #[error("Invalid backend configuration: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, PersistError>;

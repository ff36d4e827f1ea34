use thiserror::Error;

#[derive(Debug, Error)]
pub enum DigestError {
    #[error("Invalid digest request: {0}")]
    InvalidRequest(String),
}

pub type Result<T> = std::result::Result<T, DigestError>;

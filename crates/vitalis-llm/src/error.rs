use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Gateway rate limit exceeded")]
    RateLimited { retry_after: Option<u64> },

    #[error("Gateway credits exhausted")]
    PaymentRequired,

    #[error("Gateway error ({status}): {body}")]
    Upstream { status: u16, body: String },

    #[error("Gateway request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid gateway response: {0}")]
    InvalidResponse(String),

    #[error("Invalid gateway configuration: {0}")]
    Config(String),
}

impl GatewayError {
    /// Map a non-2xx gateway status to the error callers branch on
    pub fn from_status(status: u16, retry_after: Option<u64>, body: String) -> Self {
        match status {
            429 => Self::RateLimited { retry_after },
            402 => Self::PaymentRequired,
            _ => Self::Upstream { status, body },
        }
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};

use crate::error::{PersistError, Result};

/// Connection settings for the hosted backend
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub base_url: String,
    pub service_key: String,
    pub timeout: Duration,
}

impl BackendConfig {
    pub fn new(base_url: impl Into<String>, service_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            service_key: service_key.into(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.base_url.is_empty() {
            return Err(PersistError::Config("base_url is required".to_string()));
        }
        if self.service_key.trim().is_empty() {
            return Err(PersistError::Config("service_key is required".to_string()));
        }
        Ok(())
    }

    pub(crate) fn api_key_header(&self) -> Result<HeaderValue> {
        HeaderValue::from_str(&self.service_key)
            .map_err(|_| PersistError::Config("Invalid service key format".to_string()))
    }

    /// HTTP client carrying the service credentials on every request
    pub(crate) fn service_client(&self) -> Result<reqwest::Client> {
        self.validate()?;

        let mut headers = HeaderMap::new();
        headers.insert("apikey", self.api_key_header()?);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.service_key))
                .map_err(|_| PersistError::Config("Invalid service key format".to_string()))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        Ok(reqwest::Client::builder()
            .default_headers(headers)
            .timeout(self.timeout)
            .build()?)
    }
}

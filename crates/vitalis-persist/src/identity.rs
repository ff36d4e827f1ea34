use async_trait::async_trait;
use reqwest::header::{HeaderValue, AUTHORIZATION};
use serde::Deserialize;

use crate::builder::BackendConfig;
use crate::error::{PersistError, Result};

/// Resolves a caller's bearer token to a user id
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// `Ok(None)` when the token is not accepted by the auth service
    async fn resolve(&self, access_token: &str) -> Result<Option<String>>;
}

/// Asks the backend's auth endpoint who owns the token
pub struct RestIdentityResolver {
    http_client: reqwest::Client,
    user_url: String,
    api_key: HeaderValue,
}

#[derive(Deserialize)]
struct AuthUser {
    id: String,
}

impl RestIdentityResolver {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        config.validate()?;

        let http_client = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            http_client,
            user_url: format!("{}/auth/v1/user", config.base_url),
            api_key: config.api_key_header()?,
        })
    }
}

#[async_trait]
impl IdentityResolver for RestIdentityResolver {
    async fn resolve(&self, access_token: &str) -> Result<Option<String>> {
        let Ok(bearer) = HeaderValue::from_str(&format!("Bearer {}", access_token)) else {
            return Ok(None);
        };

        let response = self
            .http_client
            .get(&self.user_url)
            .header("apikey", self.api_key.clone())
            .header(AUTHORIZATION, bearer)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PersistError::Backend {
                status: status.as_u16(),
                body,
            });
        }

        let user: AuthUser = response.json().await?;
        Ok(Some(user.id))
    }
}

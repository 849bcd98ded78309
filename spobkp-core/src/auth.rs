use std::sync::Mutex;
use std::time::{Duration, Instant};

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use url::Url;

const TOKEN_PATH: &str = "oauth2/v2.0/token";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
// A cached token this close to expiry is not reused.
const EXPIRY_SKEW: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid authority url: {0}")]
    Url(#[from] url::ParseError),
    #[error("token endpoint returned {status}: {body}")]
    Api { status: StatusCode, body: String },
    #[error("credential exchange rejected: {error}: {description}")]
    Provider { error: String, description: String },
    #[error("token response did not include an access token")]
    MissingAccessToken,
}

pub struct AuthClient {
    http: Client,
    token_url: Url,
    client_id: String,
    client_secret: String,
    scope: String,
    cached: Mutex<Option<CachedToken>>,
}

#[derive(Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Option<Instant>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

impl AuthClient {
    pub fn new(
        authority: &str,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        scope: impl Into<String>,
    ) -> Result<Self, AuthError> {
        // The authority carries a tenant path segment, so the token path is
        // appended rather than joined from the root.
        let token_url = Url::parse(&format!(
            "{}/{}",
            authority.trim_end_matches('/'),
            TOKEN_PATH
        ))?;
        Ok(Self {
            http: Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            token_url,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            scope: scope.into(),
            cached: Mutex::new(None),
        })
    }

    /// Returns a still-valid cached token when one exists; only otherwise
    /// performs the client-credentials exchange.
    pub async fn acquire_token(&self) -> Result<String, AuthError> {
        if let Some(token) = self.cached_token() {
            tracing::debug!("access token already cached, no new exchange required");
            return Ok(token);
        }
        self.request_token().await
    }

    fn cached_token(&self) -> Option<String> {
        let cached = self.cached.lock().ok()?;
        let token = cached.as_ref()?;
        match token.expires_at {
            Some(expires_at) if expires_at <= Instant::now() + EXPIRY_SKEW => None,
            _ => Some(token.access_token.clone()),
        }
    }

    async fn request_token(&self) -> Result<String, AuthError> {
        tracing::debug!(url = %self.token_url, scope = %self.scope, "requesting a new access token");
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", self.scope.as_str()),
        ];
        let response = self
            .http
            .post(self.token_url.clone())
            .form(&form)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Api { status, body });
        }

        let parsed: TokenResponse = response.json().await?;
        if let Some(error) = parsed.error {
            return Err(AuthError::Provider {
                error,
                description: parsed.error_description.unwrap_or_default(),
            });
        }
        let access_token = parsed
            .access_token
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::MissingAccessToken)?;

        let expires_at = parsed
            .expires_in
            .map(|secs| Instant::now() + Duration::from_secs(secs));
        if let Ok(mut cached) = self.cached.lock() {
            *cached = Some(CachedToken {
                access_token: access_token.clone(),
                expires_at,
            });
        }
        Ok(access_token)
    }
}

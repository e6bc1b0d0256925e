use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid base url: {0}")]
    Url(#[from] url::ParseError),
    #[error("api returned {status}: {body}")]
    Api { status: StatusCode, body: String },
}

#[derive(Clone)]
pub struct AuthClient {
    http: Client,
    base_url: Url,
}

impl AuthClient {
    pub fn new(base_url: &str) -> Result<Self, AuthError> {
        Ok(Self {
            http: Client::new(),
            base_url: Url::parse(base_url)?,
        })
    }

    /// Exchanges a refresh token for a fresh access token. The server may
    /// rotate the refresh token; when it doesn't, the old one stays valid and
    /// the caller keeps it.
    pub async fn refresh_session(&self, refresh_token: &str) -> Result<SessionToken, AuthError> {
        let url = self.base_url.join("/v1/auth/refresh")?;
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];
        let response = self.http.post(url).form(&form).send().await?;
        if response.status().is_success() {
            let mut token = response.json::<SessionToken>().await?;
            if token.refresh_token.is_none() {
                token.refresh_token = Some(refresh_token.to_string());
            }
            Ok(token)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(AuthError::Api { status, body })
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionToken {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

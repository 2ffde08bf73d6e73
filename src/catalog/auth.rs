//! Bearer token acquisition for the catalog API.
//!
//! Either a pre-issued token from configuration, or the client-credentials grant
//! against the accounts service, cached until shortly before it expires.

use std::cell::RefCell;
use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::CatalogError;
use crate::settings::Credentials;

const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

struct CachedToken {
    value: String,
    expires_at: Option<Instant>,
}

impl CachedToken {
    fn is_fresh(&self, now: Instant) -> bool {
        match self.expires_at {
            Some(at) => now + EXPIRY_MARGIN < at,
            None => true,
        }
    }
}

pub struct TokenProvider {
    credentials: Credentials,
    token_url: String,
    cached: RefCell<Option<CachedToken>>,
}

impl TokenProvider {
    pub fn new(credentials: Credentials, token_url: &str) -> Self {
        let cached = match &credentials {
            Credentials::Static(token) => Some(CachedToken {
                value: token.clone(),
                expires_at: None,
            }),
            Credentials::ClientCredentials { .. } => None,
        };
        Self {
            credentials,
            token_url: token_url.to_string(),
            cached: RefCell::new(cached),
        }
    }

    /// Current bearer token, requesting a new one when missing or about to expire.
    pub fn bearer(&self, http: &Client) -> Result<String, CatalogError> {
        if let Some(token) = self.cached.borrow().as_ref() {
            if token.is_fresh(Instant::now()) {
                return Ok(token.value.clone());
            }
        }

        let fresh = self.request_token(http)?;
        let value = fresh.value.clone();
        *self.cached.borrow_mut() = Some(fresh);
        Ok(value)
    }

    /// Drop the cached token so the next call re-authenticates. No-op for static tokens.
    pub fn invalidate(&self) {
        if matches!(self.credentials, Credentials::ClientCredentials { .. }) {
            self.cached.borrow_mut().take();
        }
    }

    fn request_token(&self, http: &Client) -> Result<CachedToken, CatalogError> {
        let Credentials::ClientCredentials {
            client_id,
            client_secret,
        } = &self.credentials
        else {
            return Err(CatalogError::Auth("static access token was rejected".into()));
        };

        debug!(url = %self.token_url, "Requesting client-credentials token");
        let response = http
            .post(&self.token_url)
            .basic_auth(client_id, Some(client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(CatalogError::Auth(format!("token endpoint returned HTTP {}: {}", status.as_u16(), body)));
        }

        let token: TokenResponse = response.json()?;
        info!(expires_in = ?token.expires_in, "Acquired access token");
        Ok(CachedToken {
            value: token.access_token,
            expires_at: token.expires_in.map(|secs| Instant::now() + Duration::from_secs(secs)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_token_is_served_without_a_request() {
        let provider = TokenProvider::new(Credentials::Static("abc".into()), "http://127.0.0.1:9/token");
        let http = Client::new();
        assert_eq!(provider.bearer(&http).unwrap(), "abc");
        provider.invalidate();
        assert_eq!(provider.bearer(&http).unwrap(), "abc");
    }

    #[test]
    fn token_near_expiry_is_stale() {
        let now = Instant::now();
        let soon = CachedToken {
            value: "x".into(),
            expires_at: Some(now + Duration::from_secs(30)),
        };
        let later = CachedToken {
            value: "x".into(),
            expires_at: Some(now + Duration::from_secs(3600)),
        };
        assert!(!soon.is_fresh(now));
        assert!(later.is_fresh(now));
    }

    #[test]
    fn token_response_decodes() {
        let body = r#"{"access_token":"BQD","token_type":"Bearer","expires_in":3600}"#;
        let t: TokenResponse = serde_json::from_str(body).unwrap();
        assert_eq!(t.access_token, "BQD");
        assert_eq!(t.expires_in, Some(3600));
    }
}

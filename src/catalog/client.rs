use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::RETRY_AFTER;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, warn};

use super::auth::TokenProvider;
use super::{CatalogService, SearchQuery};
use crate::error::CatalogError;
use crate::models::{RawFeatures, SearchPage};
use crate::settings::Settings;

const SEARCH_ENDPOINT: &str = "search";
const FEATURES_ENDPOINT: &str = "audio-features";

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    tracks: Option<SearchPage>,
}

#[derive(Deserialize)]
struct FeaturesResponse {
    #[serde(default)]
    audio_features: Vec<Option<RawFeatures>>,
}

/// Retry behaviour for rate-limited or failing requests. `max_retries == 0` disables it.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_backoff: Duration,
}

impl RetryPolicy {
    fn backoff(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        retry_after.unwrap_or_else(|| self.base_backoff * 2u32.saturating_pow(attempt))
    }
}

/// Blocking HTTP client for a Spotify-style Web API.
pub struct SpotifyClient {
    http: Client,
    api_base: String,
    auth: TokenProvider,
    retry: RetryPolicy,
}

impl SpotifyClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let credentials = settings.credentials()?;
        let http = Client::builder().timeout(settings.request_timeout()).build()?;

        Ok(Self {
            http,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            auth: TokenProvider::new(credentials, &settings.token_url),
            retry: RetryPolicy {
                max_retries: settings.max_retries,
                base_backoff: Duration::from_millis(settings.base_backoff_ms),
            },
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.api_base, endpoint)
    }

    /// Send with a bearer token, retrying per the policy. A 401 refreshes the token once.
    fn send<F>(&self, endpoint: &'static str, build: F) -> Result<Response, CatalogError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let mut attempt = 0;
        let mut reauthenticated = false;
        loop {
            let token = self.auth.bearer(&self.http)?;
            let result = build(&self.http).bearer_auth(token).send();

            let (error, retry_after) = match result {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) if response.status() == StatusCode::UNAUTHORIZED && !reauthenticated => {
                    debug!(endpoint, "Access token rejected, re-authenticating");
                    self.auth.invalidate();
                    reauthenticated = true;
                    continue;
                }
                Ok(response) => {
                    let retry_after = retry_after(&response);
                    let status = response.status().as_u16();
                    let body = response.text().unwrap_or_default();
                    (CatalogError::Status { endpoint, status, body }, retry_after)
                }
                Err(e) => (CatalogError::Http(e), None),
            };

            if !error.is_retryable() || attempt >= self.retry.max_retries {
                return Err(error);
            }

            let backoff = self.retry.backoff(attempt, retry_after);
            warn!(
                "{} failed (attempt {}/{}), backing off {:.1}s: {}",
                endpoint,
                attempt + 1,
                self.retry.max_retries,
                backoff.as_secs_f64(),
                error
            );
            std::thread::sleep(backoff);
            attempt += 1;
        }
    }
}

fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

impl CatalogService for SpotifyClient {
    fn search(&self, query: &SearchQuery, limit: usize, offset: usize) -> Result<SearchPage, CatalogError> {
        let url = self.url(SEARCH_ENDPOINT);
        let limit = limit.to_string();
        let offset = offset.to_string();
        let response = self.send(SEARCH_ENDPOINT, |http| {
            http.get(&url).query(&[
                ("q", query.predicate.as_str()),
                ("type", query.result_type.as_str()),
                ("limit", limit.as_str()),
                ("offset", offset.as_str()),
            ])
        })?;

        let body: SearchResponse = response.json()?;
        Ok(body.tracks.unwrap_or_default())
    }

    fn audio_features(&self, ids: &[String]) -> Result<Vec<Option<RawFeatures>>, CatalogError> {
        let url = self.url(FEATURES_ENDPOINT);
        let joined = ids.join(",");
        let response = self.send(FEATURES_ENDPOINT, |http| http.get(&url).query(&[("ids", joined.as_str())]))?;

        let body: FeaturesResponse = response.json()?;
        Ok(body.audio_features)
    }
}

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::SettingsError;

pub const MAX_PAGE_SIZE: usize = 50;
pub const MAX_LOOKUP_BATCH: usize = 100;
/// The only search result type the response decoder reads.
pub const TRACK_RESULT_TYPE: &str = "track";

const DEFAULT_CONFIG_FILE: &str = "catalog_fetch";
const ENV_PREFIX: &str = "CATALOG";

/// What the fetcher does when a page comes back with no items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmptyPagePolicy {
    /// Keep requesting offsets until the total budget is spent.
    #[default]
    Continue,
    /// Stop at the first empty page.
    Stop,
}

#[derive(Clone, Deserialize)]
pub struct Settings {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub access_token: Option<String>,
    pub api_base: String,
    pub token_url: String,
    pub query: String,
    pub result_type: String,
    pub page_size: usize,
    pub total_results: usize,
    pub batch_size: usize,
    pub empty_page_policy: EmptyPagePolicy,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub base_backoff_ms: u64,
    pub output_path: String,
    pub show_progress: bool,
}

/// Values from the command line, applied on top of file and environment.
#[derive(Debug, Default)]
pub struct Overrides {
    pub config_file: Option<PathBuf>,
    pub total_results: Option<usize>,
    pub output_path: Option<String>,
    pub query: Option<String>,
    pub stop_on_empty_page: bool,
}

pub enum Credentials {
    Static(String),
    ClientCredentials { client_id: String, client_secret: String },
}

impl Settings {
    pub fn load(overrides: &Overrides) -> Result<Self, SettingsError> {
        let file = match &overrides.config_file {
            Some(path) => File::from(path.as_path()).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let mut builder = Config::builder()
            .set_default("api_base", "https://api.spotify.com/v1")?
            .set_default("token_url", "https://accounts.spotify.com/api/token")?
            .set_default("query", "year:2018")?
            .set_default("result_type", TRACK_RESULT_TYPE)?
            .set_default("page_size", 50_i64)?
            .set_default("total_results", 10_000_i64)?
            .set_default("batch_size", 100_i64)?
            .set_default("empty_page_policy", "continue")?
            .set_default("request_timeout_secs", 30_i64)?
            .set_default("max_retries", 0_i64)?
            .set_default("base_backoff_ms", 2000_i64)?
            .set_default("output_path", "SpotifyAudioFeatures{date}.csv")?
            .set_default("show_progress", true)?
            .add_source(file)
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .set_override_option("total_results", overrides.total_results.map(|n| n as i64))?
            .set_override_option("output_path", overrides.output_path.clone())?
            .set_override_option("query", overrides.query.clone())?;
        if overrides.stop_on_empty_page {
            builder = builder.set_override("empty_page_policy", "stop")?;
        }

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        check_range("page_size", self.page_size, MAX_PAGE_SIZE)?;
        check_range("batch_size", self.batch_size, MAX_LOOKUP_BATCH)?;
        if self.result_type != TRACK_RESULT_TYPE {
            return Err(SettingsError::Unsupported {
                key: "result_type",
                value: self.result_type.clone(),
                expected: TRACK_RESULT_TYPE,
            });
        }
        Ok(())
    }

    pub fn credentials(&self) -> Result<Credentials, SettingsError> {
        if let Some(token) = self.access_token.as_deref().filter(|t| !t.is_empty()) {
            return Ok(Credentials::Static(token.to_string()));
        }
        match (&self.client_id, &self.client_secret) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => {
                Ok(Credentials::ClientCredentials {
                    client_id: id.clone(),
                    client_secret: secret.clone(),
                })
            }
            _ => Err(SettingsError::MissingCredentials),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Output path with `{date}` replaced by today's date as DDMMYYYY.
    pub fn resolved_output_path(&self) -> PathBuf {
        let today = chrono::Local::now().date_naive();
        PathBuf::from(render_output_path(&self.output_path, today))
    }
}

fn check_range(key: &'static str, value: usize, max: usize) -> Result<(), SettingsError> {
    if value == 0 || value > max {
        return Err(SettingsError::OutOfRange { key, value, max });
    }
    Ok(())
}

fn render_output_path(template: &str, date: chrono::NaiveDate) -> String {
    template.replace("{date}", &date.format("%d%m%Y").to_string())
}

fn redact(value: &Option<String>) -> &'static str {
    match value {
        Some(v) if !v.is_empty() => "<set>",
        _ => "<unset>",
    }
}

// Secrets never reach the logs.
impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("client_id", &self.client_id)
            .field("client_secret", &redact(&self.client_secret))
            .field("access_token", &redact(&self.access_token))
            .field("api_base", &self.api_base)
            .field("token_url", &self.token_url)
            .field("query", &self.query)
            .field("result_type", &self.result_type)
            .field("page_size", &self.page_size)
            .field("total_results", &self.total_results)
            .field("batch_size", &self.batch_size)
            .field("empty_page_policy", &self.empty_page_policy)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("base_backoff_ms", &self.base_backoff_ms)
            .field("output_path", &self.output_path)
            .field("show_progress", &self.show_progress)
            .finish()
    }
}

#[cfg(test)]
pub(crate) fn test_settings() -> Settings {
    Settings {
        client_id: None,
        client_secret: None,
        access_token: Some("token".into()),
        api_base: "http://localhost".into(),
        token_url: "http://localhost/token".into(),
        query: "year:2018".into(),
        result_type: "track".into(),
        page_size: 50,
        total_results: 10_000,
        batch_size: 100,
        empty_page_policy: EmptyPagePolicy::Continue,
        request_timeout_secs: 30,
        max_retries: 0,
        base_backoff_ms: 2000,
        output_path: "out.csv".into(),
        show_progress: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_page_size_above_service_max() {
        let mut s = test_settings();
        s.page_size = 51;
        assert!(matches!(
            s.validate(),
            Err(SettingsError::OutOfRange { key: "page_size", value: 51, max: 50 })
        ));
    }

    #[test]
    fn rejects_zero_batch_size() {
        let mut s = test_settings();
        s.batch_size = 0;
        assert!(s.validate().is_err());
    }

    #[test]
    fn rejects_result_types_other_than_track() {
        let mut s = test_settings();
        s.result_type = "album".into();
        assert!(matches!(
            s.validate(),
            Err(SettingsError::Unsupported { key: "result_type", ref value, .. }) if value == "album"
        ));
        s.result_type = "track".into();
        assert!(s.validate().is_ok());
    }

    #[test]
    fn static_token_wins_over_client_credentials() {
        let mut s = test_settings();
        s.client_id = Some("id".into());
        s.client_secret = Some("secret".into());
        assert!(matches!(s.credentials(), Ok(Credentials::Static(t)) if t == "token"));
    }

    #[test]
    fn missing_credentials() {
        let mut s = test_settings();
        s.access_token = None;
        s.client_id = Some("id".into());
        assert!(matches!(s.credentials(), Err(SettingsError::MissingCredentials)));
    }

    #[test]
    fn date_placeholder_in_output_path() {
        let date = chrono::NaiveDate::from_ymd_opt(2019, 5, 25).unwrap();
        assert_eq!(
            render_output_path("SpotifyAudioFeatures{date}.csv", date),
            "SpotifyAudioFeatures25052019.csv"
        );
        assert_eq!(render_output_path("fixed.csv", date), "fixed.csv");
    }

    #[test]
    fn debug_redacts_secrets() {
        let mut s = test_settings();
        s.client_secret = Some("hunter2".into());
        let out = format!("{:?}", s);
        assert!(!out.contains("hunter2"));
        assert!(!out.contains("\"token\""));
    }
}

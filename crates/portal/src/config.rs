//! Configuration loaded from environment variables.

use std::env;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::drain::{DEFAULT_MAX_PAGES, DEFAULT_PAGE_SIZE, DrainSettings};
use crate::gateway::{GatewaySettings, RetryPolicy};

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port (default: 8000).
    pub port: u16,

    /// Elasticsearch base URL.
    pub es_url: String,

    /// Basic-auth credentials for the search cluster.
    pub es_username: Option<String>,
    pub es_password: Option<String>,

    /// Per-request timeout towards the cluster (default: 60s).
    pub es_timeout: Duration,

    /// Skip TLS certificate verification (default: true).
    pub es_accept_invalid_certs: bool,

    /// Retries of unavailable-engine failures (default: 2).
    pub es_max_retries: u32,

    /// Page-size ceiling for bulk drains (default: 10000).
    pub download_page_size: u64,

    /// Upper bound on page fetches per drain (default: 100).
    pub download_max_pages: u32,

    /// CORS allowed origins (comma-separated, default: "*").
    pub cors_allowed_origins: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = var("PORT")
            .unwrap_or_else(|| "8000".to_string())
            .parse()
            .context("PORT must be a valid u16")?;

        let es_url = var("ES_CONNECTION_URL")
            .filter(|v| !v.trim().is_empty())
            .context("ES_CONNECTION_URL environment variable is required")?;

        let es_username = var("ES_USERNAME").filter(|v| !v.is_empty());
        let es_password = var("ES_PASSWORD").filter(|v| !v.is_empty());

        let es_timeout_secs: u64 = var("ES_TIMEOUT_SECS")
            .unwrap_or_else(|| "60".to_string())
            .parse()
            .context("ES_TIMEOUT_SECS must be a valid u64")?;

        let es_accept_invalid_certs = match var("ES_ACCEPT_INVALID_CERTS") {
            Some(v) => parse_bool(&v).context("ES_ACCEPT_INVALID_CERTS must be true or false")?,
            None => true,
        };

        let es_max_retries = var("ES_MAX_RETRIES")
            .unwrap_or_else(|| "2".to_string())
            .parse()
            .context("ES_MAX_RETRIES must be a valid u32")?;

        let download_page_size = var("DOWNLOAD_PAGE_SIZE")
            .map(|v| v.parse())
            .transpose()
            .context("DOWNLOAD_PAGE_SIZE must be a valid u64")?
            .unwrap_or(DEFAULT_PAGE_SIZE);

        let download_max_pages = var("DOWNLOAD_MAX_PAGES")
            .map(|v| v.parse())
            .transpose()
            .context("DOWNLOAD_MAX_PAGES must be a valid u32")?
            .unwrap_or(DEFAULT_MAX_PAGES);

        let cors_allowed_origins = var("CORS_ALLOWED_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_else(|| vec!["*".to_string()]);

        Ok(Self {
            port,
            es_url,
            es_username,
            es_password,
            es_timeout: Duration::from_secs(es_timeout_secs),
            es_accept_invalid_certs,
            es_max_retries,
            download_page_size,
            download_max_pages,
            cors_allowed_origins,
        })
    }

    pub fn gateway_settings(&self) -> GatewaySettings {
        GatewaySettings {
            url: self.es_url.clone(),
            username: self.es_username.clone(),
            password: self.es_password.clone(),
            timeout: self.es_timeout,
            accept_invalid_certs: self.es_accept_invalid_certs,
            retry: RetryPolicy {
                max_retries: self.es_max_retries,
                ..RetryPolicy::default()
            },
        }
    }

    pub fn drain_settings(&self) -> DrainSettings {
        DrainSettings::new(self.download_page_size, self.download_max_pages)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The client secret is loaded from the TDX_CLIENT_SECRET env var or
//! client_secret_file, never stored in the TOML directly.

use common::Secret;
use delay_poller::FetcherConfig;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tdx_auth::ClientConfig;

/// Env var holding the TDX client secret
pub const CLIENT_SECRET_ENV: &str = "TDX_CLIENT_SECRET";

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub tdx: TdxConfig,
    #[serde(default)]
    pub poll: PollConfig,
    /// Chart page listener; absent means results only go to the log
    #[serde(default)]
    pub chart: Option<ChartConfig>,
}

/// Application identity and TDX endpoints
#[derive(Debug, Deserialize)]
pub struct TdxConfig {
    pub client_id: String,
    #[serde(skip)]
    pub client_secret: Option<Secret<String>>,
    /// Path to a file containing the client secret (alternative to TDX_CLIENT_SECRET)
    #[serde(default)]
    pub client_secret_file: Option<PathBuf>,
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Records requested per fetch (`$top`)
    #[serde(default = "default_top")]
    pub top: u32,
    /// Key looked up in nested station name structures
    #[serde(default = "default_name_locale")]
    pub name_locale: String,
    #[serde(default = "default_safety_margin")]
    pub token_safety_margin_secs: u64,
}

/// Polling loop settings
#[derive(Debug, Deserialize)]
pub struct PollConfig {
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    /// Upper bound on each token and data request
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            timeout_secs: default_timeout(),
        }
    }
}

/// Chart page listener settings
#[derive(Debug, Deserialize)]
pub struct ChartConfig {
    pub listen_addr: SocketAddr,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

fn default_auth_url() -> String {
    tdx_auth::TOKEN_ENDPOINT.to_string()
}

fn default_api_url() -> String {
    delay_poller::fetcher::DATA_ENDPOINT.to_string()
}

fn default_top() -> u32 {
    delay_poller::fetcher::DEFAULT_TOP
}

fn default_name_locale() -> String {
    delay_poller::records::DEFAULT_NAME_LOCALE.to_string()
}

fn default_safety_margin() -> u64 {
    tdx_auth::DEFAULT_SAFETY_MARGIN_SECS
}

fn default_interval() -> u64 {
    120
}

fn default_timeout() -> u64 {
    30
}

fn default_max_connections() -> usize {
    64
}

fn require_http_url(field: &str, url: &str) -> common::Result<()> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(common::Error::Config(format!(
            "{field} must start with http:// or https://, got: {url}"
        )));
    }
    Ok(())
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Client secret resolution order:
    /// 1. TDX_CLIENT_SECRET env var
    /// 2. client_secret_file path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        require_http_url("auth_url", &config.tdx.auth_url)?;
        require_http_url("api_url", &config.tdx.api_url)?;

        if config.tdx.client_id.trim().is_empty() {
            return Err(common::Error::Config("client_id must not be empty".into()));
        }
        if config.tdx.top == 0 {
            return Err(common::Error::Config("top must be greater than 0".into()));
        }
        if config.poll.interval_secs == 0 {
            return Err(common::Error::Config(
                "interval_secs must be greater than 0".into(),
            ));
        }
        if config.poll.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }
        if let Some(chart) = &config.chart
            && chart.max_connections == 0
        {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }

        // Env var takes precedence over file
        if let Ok(secret) = std::env::var(CLIENT_SECRET_ENV)
            && !secret.trim().is_empty()
        {
            config.tdx.client_secret = Some(Secret::new(secret.trim().to_owned()));
        } else if let Some(ref secret_file) = config.tdx.client_secret_file {
            config.tdx.client_secret = Secret::from_file(secret_file)?;
        }

        if config.tdx.client_secret.is_none() {
            return Err(common::Error::MissingSecret {
                env: CLIENT_SECRET_ENV,
                file_key: "client_secret_file",
            });
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("delay-monitor.toml")
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.poll.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.poll.timeout_secs)
    }

    /// Settings for the credential manager.
    pub fn client_config(&self) -> common::Result<ClientConfig> {
        let secret = self
            .tdx
            .client_secret
            .clone()
            .ok_or(common::Error::MissingSecret {
                env: CLIENT_SECRET_ENV,
                file_key: "client_secret_file",
            })?;
        let mut client = ClientConfig::new(self.tdx.client_id.clone(), secret, self.timeout());
        client.token_url = self.tdx.auth_url.clone();
        client.safety_margin = Duration::from_secs(self.tdx.token_safety_margin_secs);
        Ok(client)
    }

    /// Settings for the delay feed fetcher.
    pub fn fetcher_config(&self) -> FetcherConfig {
        let mut fetcher = FetcherConfig::new(self.timeout());
        fetcher.api_url = self.tdx.api_url.clone();
        fetcher.top = self.tdx.top;
        fetcher.name_locale = self.tdx.name_locale.clone();
        fetcher
    }
}

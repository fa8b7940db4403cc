//! Single fetch of the live-delay feed
//!
//! `PollingFetcher::fetch_once` is one polling cycle without the waiting:
//! token, data request, decode. All failures come back as `FetchError`
//! values; nothing here panics or retries.

use std::time::Duration;

use delay_sink::{FetchError, FetchResult};
use tdx_auth::CredentialManager;
use tracing::{debug, warn};

use crate::cycle::{CycleEvent, CycleState, handle_event};
use crate::records::{DEFAULT_NAME_LOCALE, decode_records};
use crate::status::{StatusClass, classify_status};

/// Taiwan Railway live train delay feed
pub const DATA_ENDPOINT: &str = "https://tdx.transportdata.tw/api/basic/v2/Rail/TRA/LiveTrainDelay";

/// Records requested per fetch when not configured
pub const DEFAULT_TOP: u32 = 30;

/// Longest error body kept in a `FetchError::Api` message
const MAX_ERROR_BODY: usize = 200;

/// Data endpoint settings.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub api_url: String,
    /// Value of the `$top` query parameter
    pub top: u32,
    /// Key looked up in nested `StationName` structures
    pub name_locale: String,
    /// Upper bound on a single data request
    pub timeout: Duration,
}

impl FetcherConfig {
    pub fn new(timeout: Duration) -> Self {
        Self {
            api_url: DATA_ENDPOINT.to_string(),
            top: DEFAULT_TOP,
            name_locale: DEFAULT_NAME_LOCALE.to_string(),
            timeout,
        }
    }
}

/// Fetches delay records with tokens from a `CredentialManager`.
pub struct PollingFetcher {
    client: reqwest::Client,
    credentials: CredentialManager,
    config: FetcherConfig,
}

impl PollingFetcher {
    pub fn new(
        client: reqwest::Client,
        credentials: CredentialManager,
        config: FetcherConfig,
    ) -> Self {
        Self {
            client,
            credentials,
            config,
        }
    }

    /// The credential manager this fetcher draws tokens from.
    pub fn credentials(&self) -> &CredentialManager {
        &self.credentials
    }

    /// Run one fetch: token, data request, decode.
    ///
    /// A token failure returns `FetchError::Auth` without touching the data
    /// endpoint.
    pub async fn fetch_once(&self) -> FetchResult {
        self.fetch_cycle().await.1
    }

    /// `fetch_once`, also reporting the state the cycle finished in.
    pub(crate) async fn fetch_cycle(&self) -> (CycleState, FetchResult) {
        let state = handle_event(CycleState::Idle, CycleEvent::Tick);

        let token = match self.credentials.token().await {
            Ok(token) => token,
            Err(e) => {
                let state = handle_event(state, CycleEvent::TokenFailed);
                return (state, Err(FetchError::Auth(e.to_string())));
            }
        };
        let state = handle_event(state, CycleEvent::TokenReady);

        let result = self.fetch_with_token(&token).await;
        let event = if result.is_ok() {
            CycleEvent::Fetched
        } else {
            CycleEvent::FetchFailed
        };
        (handle_event(state, event), result)
    }

    async fn fetch_with_token(&self, token: &str) -> FetchResult {
        let top = self.config.top.to_string();
        let response = self
            .client
            .get(&self.config.api_url)
            .timeout(self.config.timeout)
            .query(&[("$top", top.as_str()), ("$format", "JSON")])
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| FetchError::Api(format!("request error: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));
            let body = truncate(&body, MAX_ERROR_BODY);

            let class = classify_status(status.as_u16());
            match class {
                StatusClass::Unauthorized => {
                    warn!(%status, "data endpoint rejected the access token, invalidating it");
                    self.credentials.invalidate().await;
                }
                StatusClass::Transient => {
                    debug!(%status, "data endpoint unavailable, next tick will retry");
                }
                StatusClass::Permanent => {
                    warn!(%status, body, "data endpoint refused the request");
                }
            }

            return Err(FetchError::Api(format!(
                "data endpoint returned {status} ({}): {body}",
                class.label()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Api(format!("reading response body: {e}")))?;

        let records = decode_records(&body, &self.config.name_locale)?;
        debug!(records = records.len(), "delay feed decoded");
        Ok(records)
    }
}

/// Cut `s` to at most `max` bytes on a char boundary.
fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

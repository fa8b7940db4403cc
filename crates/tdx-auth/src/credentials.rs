//! Cached access token with single-flight renewal
//!
//! `CredentialManager` is the only owner of the application's access token.
//! A `Credential` is valid while `now < expires_at`; a valid credential is
//! served straight from memory. Once it lapses, the next caller starts one
//! token exchange and every caller arriving while that exchange is running
//! awaits the same shared future, so they all see the same token or the same
//! error. A failed exchange installs nothing: the previous credential stays
//! as it was (expired), and the following call tries again.

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::Secret;
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::constants::{DEFAULT_SAFETY_MARGIN_SECS, TOKEN_ENDPOINT};
use crate::error::Result;
use crate::token::{TokenResponse, exchange_client_credentials};

/// A bearer token and the instant after which it must not be used.
///
/// `expires_at` already has the safety margin subtracted.
#[derive(Debug, Clone)]
pub struct Credential {
    token: Secret<String>,
    expires_at: Instant,
}

impl Credential {
    pub fn new(token: String, expires_at: Instant) -> Self {
        Self {
            token: Secret::new(token),
            expires_at,
        }
    }

    /// Build a credential from a token response received at `issued_at`.
    ///
    /// `expires_at = issued_at + expires_in - safety_margin`, saturating at
    /// `issued_at` when the lifetime is shorter than the margin.
    pub fn from_response(
        response: &TokenResponse,
        issued_at: Instant,
        safety_margin: Duration,
    ) -> Self {
        let lifetime = Duration::from_secs(response.expires_in).saturating_sub(safety_margin);
        Self::new(response.access_token.clone(), issued_at + lifetime)
    }

    pub fn token(&self) -> &str {
        self.token.expose()
    }

    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    pub fn is_valid_at(&self, now: Instant) -> bool {
        now < self.expires_at
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Instant::now())
    }
}

/// Application identity and token endpoint settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub token_url: String,
    pub client_id: String,
    pub client_secret: Secret<String>,
    /// Subtracted from every token lifetime
    pub safety_margin: Duration,
    /// Upper bound on a single token request
    pub timeout: Duration,
}

impl ClientConfig {
    /// Config for the public TDX token endpoint with the default margin.
    pub fn new(client_id: String, client_secret: Secret<String>, timeout: Duration) -> Self {
        Self {
            token_url: TOKEN_ENDPOINT.to_string(),
            client_id,
            client_secret,
            safety_margin: Duration::from_secs(DEFAULT_SAFETY_MARGIN_SECS),
            timeout,
        }
    }
}

type InFlight = Shared<BoxFuture<'static, Result<Credential>>>;

struct State {
    credential: Option<Credential>,
    in_flight: Option<InFlight>,
}

struct Inner {
    client: reqwest::Client,
    config: ClientConfig,
    state: Mutex<State>,
}

/// Owner of the application's access token.
///
/// Cheap to clone; clones share the same cached credential.
#[derive(Clone)]
pub struct CredentialManager {
    inner: Arc<Inner>,
}

impl CredentialManager {
    pub fn new(client: reqwest::Client, config: ClientConfig) -> Self {
        info!(
            client_id = %config.client_id,
            token_url = %config.token_url,
            safety_margin_secs = config.safety_margin.as_secs(),
            "credential manager initialized"
        );
        Self {
            inner: Arc::new(Inner {
                client,
                config,
                state: Mutex::new(State {
                    credential: None,
                    in_flight: None,
                }),
            }),
        }
    }

    /// Return a currently valid access token.
    ///
    /// No network call while the cached credential is valid. Otherwise joins
    /// the in-flight exchange, or starts one if none is running.
    pub async fn token(&self) -> Result<String> {
        let in_flight = {
            let mut state = self.inner.state.lock().await;
            if let Some(credential) = state.credential.as_ref().filter(|c| c.is_valid()) {
                return Ok(credential.token().to_owned());
            }
            if let Some(in_flight) = state.in_flight.clone() {
                debug!("joining in-flight token request");
                in_flight
            } else {
                debug!("cached token missing or expired, requesting a new one");
                let in_flight = Self::acquire(self.inner.clone()).boxed().shared();
                state.in_flight = Some(in_flight.clone());
                in_flight
            }
        };

        in_flight.await.map(|c| c.token().to_owned())
    }

    /// Drop the cached credential so the next `token()` re-acquires.
    ///
    /// Used when the data endpoint rejects a token the local clock still
    /// considers valid.
    pub async fn invalidate(&self) {
        let mut state = self.inner.state.lock().await;
        if state.credential.take().is_some() {
            info!("cached access token invalidated");
        }
    }

    /// Remaining validity of the cached credential, `None` if there is no
    /// valid one.
    pub async fn expires_in(&self) -> Option<Duration> {
        let state = self.inner.state.lock().await;
        let now = Instant::now();
        state
            .credential
            .as_ref()
            .filter(|c| c.is_valid_at(now))
            .map(|c| c.expires_at() - now)
    }

    /// Run one token exchange and install the result.
    ///
    /// Runs at most once per shared future regardless of how many callers
    /// await it. Clears the in-flight slot before returning so the next
    /// expiry starts a fresh exchange.
    async fn acquire(inner: Arc<Inner>) -> Result<Credential> {
        let issued_at = Instant::now();
        let config = &inner.config;
        let outcome = exchange_client_credentials(
            &inner.client,
            &config.token_url,
            &config.client_id,
            &config.client_secret,
            config.timeout,
        )
        .await
        .map(|response| Credential::from_response(&response, issued_at, config.safety_margin));

        let mut state = inner.state.lock().await;
        state.in_flight = None;
        match &outcome {
            Ok(credential) => {
                state.credential = Some(credential.clone());
                metrics::counter!("auth_token_refresh_total", "outcome" => "success").increment(1);
                info!(
                    valid_for_secs = credential.expires_at().saturating_duration_since(issued_at).as_secs(),
                    "access token acquired"
                );
            }
            Err(e) => {
                metrics::counter!("auth_token_refresh_total", "outcome" => "failure").increment(1);
                warn!(error = %e, "access token request failed, keeping previous credential state");
            }
        }
        outcome
    }

    #[cfg(test)]
    async fn cached(&self) -> Option<Credential> {
        self.inner.state.lock().await.credential.clone()
    }
}

//! Local token + delay-feed server for tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::extract::RawQuery;
use axum::http::{HeaderMap, StatusCode, header};
use axum::routing::{get, post};
use common::Secret;
use tdx_auth::{ClientConfig, CredentialManager};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use crate::fetcher::{FetcherConfig, PollingFetcher};

/// What the delay feed saw on its latest request.
#[derive(Debug, Clone, Default)]
pub struct DataRequest {
    pub authorization: String,
    pub accept_encoding: String,
    pub query: String,
}

/// Scripted token endpoint at `/token` and delay feed at `/delays`.
///
/// The n-th feed request gets `script[n]`, then the last entry repeats. The
/// token endpoint always answers with the same response.
pub struct ApiServer {
    pub token_url: String,
    pub data_url: String,
    token_calls: Arc<AtomicUsize>,
    data_calls: Arc<AtomicUsize>,
    last_data: Arc<Mutex<DataRequest>>,
    _handle: tokio::task::JoinHandle<()>,
}

fn ok_token() -> (u16, String) {
    (
        200,
        r#"{"access_token":"at_1","expires_in":86400,"token_type":"Bearer"}"#.into(),
    )
}

impl ApiServer {
    pub async fn start(data_script: Vec<(u16, String)>) -> Self {
        Self::spawn(data_script, ok_token(), Duration::ZERO).await
    }

    pub async fn start_with_token(
        data_script: Vec<(u16, String)>,
        token_response: (u16, String),
    ) -> Self {
        Self::spawn(data_script, token_response, Duration::ZERO).await
    }

    /// Feed responses are held back for `delay`.
    pub async fn start_with_delay(data_script: Vec<(u16, String)>, delay: Duration) -> Self {
        Self::spawn(data_script, ok_token(), delay).await
    }

    async fn spawn(
        data_script: Vec<(u16, String)>,
        token_response: (u16, String),
        delay: Duration,
    ) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let token_calls = Arc::new(AtomicUsize::new(0));
        let data_calls = Arc::new(AtomicUsize::new(0));
        let last_data = Arc::new(Mutex::new(DataRequest::default()));
        let data_script = Arc::new(data_script);

        let token_handler = {
            let token_calls = token_calls.clone();
            move || {
                let token_calls = token_calls.clone();
                let (status, body) = token_response.clone();
                async move {
                    token_calls.fetch_add(1, Ordering::SeqCst);
                    (
                        StatusCode::from_u16(status).unwrap(),
                        [(header::CONTENT_TYPE, "application/json")],
                        body,
                    )
                }
            }
        };

        let data_handler = {
            let data_calls = data_calls.clone();
            let last_data = last_data.clone();
            move |headers: HeaderMap, RawQuery(query): RawQuery| {
                let data_calls = data_calls.clone();
                let last_data = last_data.clone();
                let data_script = data_script.clone();
                async move {
                    let n = data_calls.fetch_add(1, Ordering::SeqCst);
                    *last_data.lock().await = DataRequest {
                        authorization: headers
                            .get(header::AUTHORIZATION)
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or_default()
                            .to_string(),
                        accept_encoding: headers
                            .get(header::ACCEPT_ENCODING)
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or_default()
                            .to_string(),
                        query: query.unwrap_or_default(),
                    };
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    let (status, body) = data_script
                        .get(n)
                        .or_else(|| data_script.last())
                        .cloned()
                        .unwrap_or((500, String::new()));
                    (
                        StatusCode::from_u16(status).unwrap(),
                        [(header::CONTENT_TYPE, "application/json")],
                        body,
                    )
                }
            }
        };

        let app = axum::Router::new()
            .route("/token", post(token_handler))
            .route("/delays", get(data_handler));
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            token_url: format!("http://{addr}/token"),
            data_url: format!("http://{addr}/delays"),
            token_calls,
            data_calls,
            last_data,
            _handle: handle,
        }
    }

    pub fn token_calls(&self) -> usize {
        self.token_calls.load(Ordering::SeqCst)
    }

    pub fn data_calls(&self) -> usize {
        self.data_calls.load(Ordering::SeqCst)
    }

    pub async fn last_data_request(&self) -> DataRequest {
        self.last_data.lock().await.clone()
    }

    /// Credential manager pointed at this server's token endpoint.
    pub fn credentials(&self) -> CredentialManager {
        let mut config = ClientConfig::new(
            "app-id".into(),
            Secret::new("app-secret".to_string()),
            Duration::from_secs(5),
        );
        config.token_url = self.token_url.clone();
        CredentialManager::new(reqwest::Client::new(), config)
    }
}

/// Fetcher wired to both of the server's endpoints.
pub fn fetcher_for(server: &ApiServer) -> PollingFetcher {
    let mut config = FetcherConfig::new(Duration::from_secs(5));
    config.api_url = server.data_url.clone();
    PollingFetcher::new(reqwest::Client::new(), server.credentials(), config)
}

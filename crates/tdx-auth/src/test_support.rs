//! Scripted token endpoint for tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::http::{StatusCode, header};
use axum::routing::post;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

/// Local token endpoint answering with a fixed script of responses.
///
/// The n-th request gets `script[n]`; once the script runs out the last entry
/// repeats. Every request is counted and its form body kept.
pub struct TokenServer {
    pub url: String,
    calls: Arc<AtomicUsize>,
    last_form: Arc<Mutex<String>>,
    _handle: tokio::task::JoinHandle<()>,
}

impl TokenServer {
    pub async fn start(script: Vec<(u16, String)>) -> Self {
        Self::start_with_delay(script, Duration::ZERO).await
    }

    /// Like `start`, but every response is held back for `delay`.
    pub async fn start_with_delay(script: Vec<(u16, String)>, delay: Duration) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let last_form = Arc::new(Mutex::new(String::new()));
        let script = Arc::new(script);

        let handler = {
            let calls = calls.clone();
            let last_form = last_form.clone();
            move |body: String| {
                let calls = calls.clone();
                let last_form = last_form.clone();
                let script = script.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    *last_form.lock().await = body;
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    let (status, body) = script
                        .get(n)
                        .or_else(|| script.last())
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

        let app = axum::Router::new().route("/token", post(handler));
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{addr}/token"),
            calls,
            last_form,
            _handle: handle,
        }
    }

    /// Number of token requests received so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Form body of the most recent token request.
    pub async fn last_form(&self) -> String {
        self.last_form.lock().await.clone()
    }
}

/// JSON body of a successful token response.
pub fn token_body(access_token: &str, expires_in: Option<u64>) -> String {
    match expires_in {
        Some(secs) => serde_json::json!({
            "access_token": access_token,
            "expires_in": secs,
            "token_type": "Bearer",
        }),
        None => serde_json::json!({
            "access_token": access_token,
            "token_type": "Bearer",
        }),
    }
    .to_string()
}

//! Client-credentials token exchange
//!
//! POSTs the application identity to the token endpoint as a form body and
//! decodes the JSON response. Callers convert the relative `expires_in` into
//! an absolute expiry when caching the token.

use std::time::Duration;

use common::Secret;
use serde::Deserialize;

use crate::constants::{DEFAULT_EXPIRES_IN_SECS, GRANT_TYPE};
use crate::error::{Error, Result};

/// Response from the token endpoint.
///
/// `expires_in` is a delta in seconds from the response time. Some responses
/// omit it; the field then falls back to `DEFAULT_EXPIRES_IN_SECS`.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Seconds until the access token expires (delta, not absolute)
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,
    #[serde(default)]
    pub token_type: Option<String>,
}

fn default_expires_in() -> u64 {
    DEFAULT_EXPIRES_IN_SECS
}

/// Exchange the application identity for an access token.
///
/// The request is bounded by `timeout`. 401/403 map to
/// `Error::InvalidCredentials`, other non-2xx statuses and bodies without a
/// usable `access_token` map to `Error::TokenExchange`.
pub async fn exchange_client_credentials(
    client: &reqwest::Client,
    token_url: &str,
    client_id: &str,
    client_secret: &Secret<String>,
    timeout: Duration,
) -> Result<TokenResponse> {
    let response = client
        .post(token_url)
        .timeout(timeout)
        .form(&[
            ("grant_type", GRANT_TYPE),
            ("client_id", client_id),
            ("client_secret", client_secret.expose().as_str()),
        ])
        .send()
        .await
        .map_err(|e| Error::Http(format!("token request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));

        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(Error::InvalidCredentials(format!(
                "client credentials rejected ({status}): {body}"
            )));
        }

        return Err(Error::TokenExchange(format!(
            "token endpoint returned {status}: {body}"
        )));
    }

    let body = response
        .text()
        .await
        .map_err(|e| Error::Http(format!("reading token response: {e}")))?;
    let token: TokenResponse = serde_json::from_str(&body)
        .map_err(|e| Error::TokenExchange(format!("invalid token response: {e}")))?;

    if token.access_token.is_empty() {
        return Err(Error::TokenExchange(
            "token response has an empty access_token".into(),
        ));
    }

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{TokenServer, token_body};

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn secret() -> Secret<String> {
        Secret::new("app-secret".to_string())
    }

    #[tokio::test]
    async fn sends_client_credentials_form() {
        let server = TokenServer::start(vec![(200, token_body("at_1", Some(86400)))]).await;

        let token = exchange_client_credentials(
            &reqwest::Client::new(),
            &server.url,
            "app-id",
            &secret(),
            TIMEOUT,
        )
        .await
        .unwrap();

        assert_eq!(token.access_token, "at_1");
        assert_eq!(token.expires_in, 86400);

        let form = server.last_form().await;
        assert!(form.contains("grant_type=client_credentials"), "got: {form}");
        assert!(form.contains("client_id=app-id"), "got: {form}");
        assert!(form.contains("client_secret=app-secret"), "got: {form}");
    }

    #[tokio::test]
    async fn missing_expires_in_defaults_to_one_hour() {
        let server = TokenServer::start(vec![(200, token_body("at_1", None))]).await;

        let token = exchange_client_credentials(
            &reqwest::Client::new(),
            &server.url,
            "app-id",
            &secret(),
            TIMEOUT,
        )
        .await
        .unwrap();

        assert_eq!(token.expires_in, DEFAULT_EXPIRES_IN_SECS);
    }

    #[tokio::test]
    async fn missing_access_token_is_token_exchange_error() {
        let server =
            TokenServer::start(vec![(200, r#"{"expires_in":86400,"token_type":"Bearer"}"#.into())])
                .await;

        let err = exchange_client_credentials(
            &reqwest::Client::new(),
            &server.url,
            "app-id",
            &secret(),
            TIMEOUT,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::TokenExchange(_)), "got: {err:?}");
        assert!(
            err.to_string().contains("missing field `access_token`"),
            "cause must name the missing field, got: {err}"
        );
    }

    #[tokio::test]
    async fn non_json_body_is_token_exchange_error() {
        let server = TokenServer::start(vec![(200, "<html>gateway</html>".into())]).await;

        let err = exchange_client_credentials(
            &reqwest::Client::new(),
            &server.url,
            "app-id",
            &secret(),
            TIMEOUT,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::TokenExchange(_)), "got: {err:?}");
        assert!(err.to_string().contains("invalid token response"), "got: {err}");
    }

    #[tokio::test]
    async fn rejected_credentials_are_invalid_credentials() {
        let server =
            TokenServer::start(vec![(401, r#"{"error":"unauthorized_client"}"#.into())]).await;

        let err = exchange_client_credentials(
            &reqwest::Client::new(),
            &server.url,
            "app-id",
            &secret(),
            TIMEOUT,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::InvalidCredentials(_)), "got: {err:?}");
    }

    #[tokio::test]
    async fn server_error_is_token_exchange_error() {
        let server = TokenServer::start(vec![(503, "maintenance".into())]).await;

        let err = exchange_client_credentials(
            &reqwest::Client::new(),
            &server.url,
            "app-id",
            &secret(),
            TIMEOUT,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::TokenExchange(_)), "got: {err:?}");
        assert!(err.to_string().contains("503"), "got: {err}");
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_http_error() {
        let err = exchange_client_credentials(
            &reqwest::Client::new(),
            "http://127.0.0.1:1/token",
            "app-id",
            &secret(),
            TIMEOUT,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::Http(_)), "got: {err:?}");
    }
}

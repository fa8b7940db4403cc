//! Delay records, fetch outcomes, and the sink abstraction
//!
//! Defines the types that cross the boundary between the polling loop and the
//! presentation layer. The poller produces one `FetchResult` per cycle and
//! hands it to a `Sink`; the sink decides how to show it (log table, chart
//! page, ...). Sinks must not block the polling timeline.

pub mod log;

pub use log::LogSink;

use serde::Serialize;

/// One station's delay as reported by the live-delay endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DelayRecord {
    pub station_id: String,
    /// Display name, already resolved to the configured locale
    pub station_name: String,
    pub delay_minutes: i64,
}

/// Why a polling cycle produced no records.
///
/// Every variant is recovered at the polling-loop boundary; none of them
/// stop the loop.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// Token endpoint unreachable, credentials rejected, or token response malformed
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Data endpoint unreachable or returned a non-success status
    #[error("data request failed: {0}")]
    Api(String),

    /// Data endpoint body did not match the expected record array
    #[error("unexpected response shape: {0}")]
    Parse(String),
}

impl FetchError {
    /// Short label for logging and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Auth(_) => "auth",
            FetchError::Api(_) => "api",
            FetchError::Parse(_) => "parse",
        }
    }
}

/// Outcome of one polling cycle.
pub type FetchResult = std::result::Result<Vec<DelayRecord>, FetchError>;

/// Errors a sink may raise back to the polling loop.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// The sink can no longer accept results; the polling loop stops.
    #[error("sink closed: {0}")]
    Fatal(String),
}

/// Consumer of polling results.
///
/// `render` is called once per cycle from the polling task. Implementations
/// must return quickly: hand the result off (channel, swap) rather than doing
/// slow I/O inline. Returning `SinkError::Fatal` ends the polling loop.
pub trait Sink: Send + Sync {
    /// Identifier for logging (e.g. "log", "chart")
    fn id(&self) -> &str;

    /// Accept the result of one polling cycle.
    fn render(&self, result: FetchResult) -> Result<(), SinkError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_error_kind_labels() {
        assert_eq!(FetchError::Auth("x".into()).kind(), "auth");
        assert_eq!(FetchError::Api("x".into()).kind(), "api");
        assert_eq!(FetchError::Parse("x".into()).kind(), "parse");
    }

    #[test]
    fn fetch_error_display_carries_cause() {
        let err = FetchError::Api("data endpoint returned 500 Internal Server Error".into());
        assert_eq!(
            err.to_string(),
            "data request failed: data endpoint returned 500 Internal Server Error"
        );
    }

    #[test]
    fn delay_record_serializes_snake_case() {
        let record = DelayRecord {
            station_id: "1000".into(),
            station_name: "臺北".into(),
            delay_minutes: 5,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["station_id"], "1000");
        assert_eq!(json["station_name"], "臺北");
        assert_eq!(json["delay_minutes"], 5);
    }
}

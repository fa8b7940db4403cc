//! Classification of data endpoint error statuses
//!
//! Decides what a non-2xx response from the delay feed means for the next
//! cycle. Every class still surfaces as `FetchError::Api`; the class only
//! drives side effects (token invalidation) and log level.

/// What a non-success status implies for the next cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// Token rejected (401/403): drop the cached credential so the next tick
    /// re-authenticates even if the local expiry has not passed
    Unauthorized,
    /// Rate limit or upstream trouble (408, 429, 5xx): next tick retries as-is
    Transient,
    /// Anything else (bad query, gone endpoint): repeats until config changes
    Permanent,
}

impl StatusClass {
    /// Label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            StatusClass::Unauthorized => "unauthorized",
            StatusClass::Transient => "transient",
            StatusClass::Permanent => "permanent",
        }
    }
}

/// Classify a non-success HTTP status from the data endpoint.
pub fn classify_status(status: u16) -> StatusClass {
    match status {
        401 | 403 => StatusClass::Unauthorized,
        408 | 429 => StatusClass::Transient,
        500..=599 => StatusClass::Transient,
        _ => StatusClass::Permanent,
    }
}

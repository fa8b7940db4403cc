//! Live train-delay polling
//!
//! Fetches the TDX live-delay feed on a fixed interval and hands each cycle's
//! outcome to a `Sink`. Tokens come from `tdx_auth::CredentialManager`; the
//! poller never caches them itself.
//!
//! Cycle lifecycle:
//! 1. Tick → ask the credential manager for a token
//! 2. Token failure → `FetchError::Auth`, no data request
//! 3. GET the delay feed with the bearer token
//! 4. Non-2xx → `FetchError::Api` (401/403 also invalidate the cached token)
//! 5. Body decoded into `DelayRecord`s, or `FetchError::Parse`
//! 6. Result rendered by the sink, then wait for the next tick or a stop

pub mod cycle;
pub mod fetcher;
pub mod poll;
pub mod records;
pub mod status;

pub use cycle::{CycleEvent, CycleState, handle_event};
pub use fetcher::{FetcherConfig, PollingFetcher};
pub use poll::{run, spawn_poll_task};
pub use records::{decode_records, resolve_station_name};
pub use status::{StatusClass, classify_status};

#[cfg(test)]
mod test_support;

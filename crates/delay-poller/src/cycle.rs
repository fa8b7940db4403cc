//! Polling cycle state machine
//!
//! Pure state machine: receives events, returns the next state. The poll
//! loop performs the I/O and feeds the outcome back in. No state survives a
//! cycle; only the credential manager's cached token outlives it.
//!
//! ```text
//! Idle -> AcquiringToken -> TokenFailed ---------------------> Idle
//!                        -> Fetching -> FetchFailed ---------> Idle
//!                                    -> Rendered ------------> Idle
//! ```

use tracing::warn;

/// Where a polling cycle currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    /// Waiting for the next tick
    Idle,
    /// Asking the credential manager for a token
    AcquiringToken,
    /// Data request in flight
    Fetching,
    /// No token this cycle; failure handed to the sink
    TokenFailed,
    /// Data request or decoding failed; failure handed to the sink
    FetchFailed,
    /// Records handed to the sink
    Rendered,
}

impl CycleState {
    /// State label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            CycleState::Idle => "idle",
            CycleState::AcquiringToken => "acquiring_token",
            CycleState::Fetching => "fetching",
            CycleState::TokenFailed => "token_failed",
            CycleState::FetchFailed => "fetch_failed",
            CycleState::Rendered => "rendered",
        }
    }

    /// Whether the cycle has produced its result.
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            CycleState::TokenFailed | CycleState::FetchFailed | CycleState::Rendered
        )
    }
}

/// Events that drive the cycle forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleEvent {
    /// Interval elapsed (or first run)
    Tick,
    /// Credential manager returned a token
    TokenReady,
    /// Credential manager failed
    TokenFailed,
    /// Feed fetched and decoded
    Fetched,
    /// Feed request or decoding failed
    FetchFailed,
    /// Result handed to the sink, wait for the next tick
    Delivered,
}

/// Handle a state transition. Pure function: no I/O.
///
/// Events that make no sense in the current state leave it unchanged.
pub fn handle_event(state: CycleState, event: CycleEvent) -> CycleState {
    match (state, event) {
        (CycleState::Idle, CycleEvent::Tick) => CycleState::AcquiringToken,

        (CycleState::AcquiringToken, CycleEvent::TokenReady) => CycleState::Fetching,
        (CycleState::AcquiringToken, CycleEvent::TokenFailed) => CycleState::TokenFailed,

        (CycleState::Fetching, CycleEvent::Fetched) => CycleState::Rendered,
        (CycleState::Fetching, CycleEvent::FetchFailed) => CycleState::FetchFailed,

        (s, CycleEvent::Delivered) if s.is_finished() => CycleState::Idle,

        (state, event) => {
            warn!(state = state.label(), ?event, "ignoring unexpected cycle event");
            state
        }
    }
}

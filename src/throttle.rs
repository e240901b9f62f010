use crate::error::GenerationError;
use crate::session::SessionState;

pub const DEFAULT_REQUEST_LIMIT: u32 = 5;

/// Soft per-session throttle.
///
/// When a session has used `limit` generation calls, the next call is dropped
/// with an error and the counter restarts at 1, not 0. The caller bumps the
/// counter with [`ThrottleGate::record_success`] only after the downstream
/// call succeeded.
#[derive(Debug, Clone, Copy)]
pub struct ThrottleGate {
    limit: u32,
}

impl Default for ThrottleGate {
    fn default() -> Self {
        Self::new(DEFAULT_REQUEST_LIMIT)
    }
}

impl ThrottleGate {
    pub fn new(limit: u32) -> Self {
        Self { limit }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Check the session's counter. Returns `false` when the request must be
    /// dropped; in that case the counter has been reset to 1.
    pub fn check_and_consume(&self, state: &mut SessionState) -> bool {
        if state.n_requests >= self.limit {
            tracing::info!(n_requests = state.n_requests, "Session request limit reached");
            state.n_requests = 1;
            return false;
        }
        true
    }

    /// Same as [`check_and_consume`](Self::check_and_consume) but as a result.
    pub fn check(&self, state: &mut SessionState) -> Result<(), GenerationError> {
        if self.check_and_consume(state) {
            Ok(())
        } else {
            Err(GenerationError::RateLimited)
        }
    }

    pub fn record_success(&self, state: &mut SessionState) {
        state.n_requests = state.n_requests.saturating_add(1);
    }

    pub fn remaining(&self, state: &SessionState) -> u32 {
        self.limit.saturating_sub(state.n_requests)
    }
}

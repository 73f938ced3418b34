//! Retry classification for page requests.
//!
//! The policy is pure: it maps a failed request plus the attempt counter to a
//! decision and never sleeps or performs I/O itself. The fetch loop owns the
//! counter and resets it after every successful page.

use std::time::Duration;

/// What went wrong with one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// The remote answered with a non-success status code.
    Status(u16),
    /// No response within the request timeout.
    Timeout,
    /// Connection refused, reset, TLS failure, undecodable body.
    Transport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    TransientNetwork,
    RateLimited,
    ServerFault(u16),
    RemoteRejected(u16),
}

impl Fault {
    pub fn classify(failure: Failure) -> Self {
        match failure {
            Failure::Status(429) => Fault::RateLimited,
            Failure::Status(status) if (500..600).contains(&status) => Fault::ServerFault(status),
            Failure::Status(status) => Fault::RemoteRejected(status),
            Failure::Timeout | Failure::Transport => Fault::TransientNetwork,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GiveUpReason {
    /// Non-retryable status; the request would fail the same way again.
    Rejected(u16),
    /// The retry budget ran out.
    Exhausted,
    /// A connection-level error while already at the retry limit.
    TransportFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Retry { delay: Duration, fault: Fault },
    GiveUp(GiveUpReason),
}

/// Consecutive failed attempts at the current offset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryState {
    pub attempt: u32,
}

impl RetryState {
    /// State after a successful request.
    pub fn succeeded(self) -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub backoff_base: u32,
    pub max_backoff: Duration,
    /// Fixed wait after a 429; rate limits do not back off exponentially.
    pub rate_limit_delay: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            backoff_base: 2,
            max_backoff: Duration::from_secs(300),
            rate_limit_delay: Duration::from_secs(30),
            max_attempts: 5,
        }
    }
}

impl RetryPolicy {
    /// `backoff_base ^ attempt` seconds, capped at `max_backoff`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let secs = u64::from(self.backoff_base)
            .checked_pow(attempt)
            .unwrap_or(u64::MAX);
        Duration::from_secs(secs).min(self.max_backoff)
    }

    /// Classify a failed request made while in `state`.
    ///
    /// Retryable faults increment the counter; once it would exceed
    /// `max_attempts` the answer is `GiveUp(Exhausted)` instead of another
    /// sleep, so a collection costs at most `max_attempts + 1` requests per
    /// offset. A transport error arriving at the limit surfaces as-is.
    pub fn on_failure(&self, state: RetryState, failure: Failure) -> (RetryState, Decision) {
        match Fault::classify(failure) {
            Fault::RemoteRejected(status) => {
                (state, Decision::GiveUp(GiveUpReason::Rejected(status)))
            }
            Fault::RateLimited => {
                self.retry_after(state, self.rate_limit_delay, Fault::RateLimited)
            }
            Fault::TransientNetwork
                if failure == Failure::Transport && state.attempt >= self.max_attempts =>
            {
                (state, Decision::GiveUp(GiveUpReason::TransportFailed))
            }
            fault => self.retry_after(state, self.backoff(state.attempt), fault),
        }
    }

    fn retry_after(
        &self,
        state: RetryState,
        delay: Duration,
        fault: Fault,
    ) -> (RetryState, Decision) {
        let next = RetryState {
            attempt: state.attempt.saturating_add(1),
        };
        if next.attempt > self.max_attempts {
            (next, Decision::GiveUp(GiveUpReason::Exhausted))
        } else {
            (next, Decision::Retry { delay, fault })
        }
    }
}

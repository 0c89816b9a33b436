//! Reconnect policy: error classification and backoff schedule
//!
//! Both halves are plain functions so they can be tested without a
//! backend. [`ReconnectPolicy`] bundles them for the transport.

use std::time::Duration;

use crate::error::ConfigError;

/// Reply prefix that marks a replica or failover transition
pub const READONLY_PREFIX: &str = "READONLY";

/// Default linear step between reconnect attempts
pub const DEFAULT_BACKOFF_STEP: Duration = Duration::from_millis(50);

/// Default ceiling for a single reconnect delay
pub const DEFAULT_BACKOFF_CAP: Duration = Duration::from_millis(2000);

/// Attempt count at which a reconnect episode gives up
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Classifier deciding whether a failure message should trigger a reconnect
pub type ErrorClassifier = fn(&str) -> bool;

/// What the transport should do after a failed reconnect attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait this long, then try to connect again
    RetryAfter(Duration),
    /// End the episode and surface the connection as failed
    Stop,
}

impl RetryDecision {
    pub fn delay(&self) -> Option<Duration> {
        match self {
            RetryDecision::RetryAfter(delay) => Some(*delay),
            RetryDecision::Stop => None,
        }
    }
}

/// Returns `true` only when the message starts with `READONLY`
///
/// Other failures (timeouts, auth, protocol errors) are not fixed by
/// reconnecting and are left to the caller.
pub fn should_reconnect(message: &str) -> bool {
    message.starts_with(READONLY_PREFIX)
}

/// Linear backoff with the default step and cap: `min(attempts * 50ms, 2000ms)`
pub fn backoff_delay(attempts: u32) -> Duration {
    linear_backoff(attempts, DEFAULT_BACKOFF_STEP, DEFAULT_BACKOFF_CAP)
}

/// Default retry strategy: stop at the third attempt, otherwise back off
pub fn retry_strategy(attempts: u32) -> RetryDecision {
    ReconnectPolicy::default().retry_decision(attempts)
}

fn linear_backoff(attempts: u32, step: Duration, cap: Duration) -> Duration {
    step.saturating_mul(attempts).min(cap)
}

/// Reconnect policy handed to the transport when it is constructed
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    classifier: ErrorClassifier,
    step: Duration,
    cap: Duration,
    max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            classifier: should_reconnect,
            step: DEFAULT_BACKOFF_STEP,
            cap: DEFAULT_BACKOFF_CAP,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl ReconnectPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the error classifier
    pub fn with_classifier(mut self, classifier: ErrorClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Set the linear step added per attempt
    pub fn with_step(mut self, step: Duration) -> Self {
        self.step = step;
        self
    }

    /// Set the maximum delay between attempts
    pub fn with_cap(mut self, cap: Duration) -> Self {
        self.cap = cap;
        self
    }

    /// Set the attempt count at which an episode stops
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Ask the classifier whether this failure should trigger a reconnect
    pub fn should_reconnect(&self, message: &str) -> bool {
        (self.classifier)(message)
    }

    /// Delay for the given attempt, ignoring the attempt ceiling
    pub fn backoff_delay(&self, attempts: u32) -> Duration {
        linear_backoff(attempts, self.step, self.cap)
    }

    /// Retry decision for the given attempt (attempts start at 1)
    pub fn retry_decision(&self, attempts: u32) -> RetryDecision {
        if attempts >= self.max_attempts {
            RetryDecision::Stop
        } else {
            RetryDecision::RetryAfter(self.backoff_delay(attempts))
        }
    }

    /// Validate policy values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidPolicy(
                "max attempts cannot be zero".to_string(),
            ));
        }
        if self.step > self.cap {
            return Err(ConfigError::InvalidPolicy(format!(
                "backoff step {:?} exceeds cap {:?}",
                self.step, self.cap
            )));
        }
        Ok(())
    }
}

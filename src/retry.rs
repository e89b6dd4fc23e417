//! Exponential backoff with jitter and kind-aware retry decisions.

// crates.io
use rand::Rng;
// self
use crate::{_prelude::*, error::ConfigError};

const JITTER: f64 = 0.25;

/// Retry budget and backoff curve for token acquisition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
	/// Total attempts including the first one.
	pub max_attempts: u32,
	/// Delay before the first retry.
	pub base_delay: Duration,
	/// Upper bound for any computed delay.
	pub max_delay: Duration,
}
impl RetryPolicy {
	/// Default attempt budget.
	pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
	/// Default delay before the first retry.
	pub const DEFAULT_BASE_DELAY: Duration = Duration::milliseconds(200);
	/// Default delay ceiling.
	pub const DEFAULT_MAX_DELAY: Duration = Duration::seconds(10);

	/// Policy that never retries.
	pub const fn no_retry() -> Self {
		Self {
			max_attempts: 1,
			base_delay: Self::DEFAULT_BASE_DELAY,
			max_delay: Self::DEFAULT_MAX_DELAY,
		}
	}

	/// Sets the attempt budget.
	pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
		self.max_attempts = max_attempts;

		self
	}

	/// Sets the base and maximum delays.
	pub fn with_delays(mut self, base_delay: Duration, max_delay: Duration) -> Self {
		self.base_delay = base_delay;
		self.max_delay = max_delay;

		self
	}

	/// Checks the invariants `max_attempts >= 1` and `0 < base_delay <= max_delay`.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.max_attempts == 0 {
			return Err(ConfigError::InvalidRetryPolicy { reason: "max_attempts must be at least 1" });
		}
		if !self.base_delay.is_positive() {
			return Err(ConfigError::InvalidRetryPolicy { reason: "base_delay must be positive" });
		}
		if self.max_delay < self.base_delay {
			return Err(ConfigError::InvalidRetryPolicy {
				reason: "max_delay must not be shorter than base_delay",
			});
		}

		Ok(())
	}

	/// Returns `true` when `err` is retryable and `attempt` (1-based) left budget.
	pub fn should_retry(&self, err: &Error, attempt: u32) -> bool {
		attempt < self.max_attempts && err.is_retryable()
	}

	/// Un-jittered delay after `attempt`: `min(max, base * 2^(attempt - 1))`.
	pub fn backoff(&self, attempt: u32) -> Duration {
		let exponent = attempt.saturating_sub(1).min(30);
		let factor = 1_i32 << exponent;

		self.base_delay.checked_mul(factor).map_or(self.max_delay, |delay| delay.min(self.max_delay))
	}

	/// Delay to wait before retrying after `err` on `attempt`.
	///
	/// A rate-limit hint wins over the computed backoff but never exceeds `max_delay`; otherwise
	/// the backoff is jittered by up to 25% in either direction.
	pub fn delay_for(&self, err: &Error, attempt: u32) -> Duration {
		if let Some(hint) = err.retry_after() {
			return hint.clamp(Duration::ZERO, self.max_delay);
		}

		let factor = rand::rng().random_range(-JITTER..=JITTER);

		self.apply_jitter(self.backoff(attempt), factor)
	}

	/// Scales `delay` by `1 + factor` and clamps the result to `[base_delay, max_delay]`.
	pub fn apply_jitter(&self, delay: Duration, factor: f64) -> Duration {
		let factor = factor.clamp(-JITTER, JITTER);

		(delay * (1.0 + factor)).clamp(self.base_delay, self.max_delay)
	}
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
			base_delay: Self::DEFAULT_BASE_DELAY,
			max_delay: Self::DEFAULT_MAX_DELAY,
		}
	}
}

/// Converts to a `std` duration for tokio timers, treating negative values as zero.
pub(crate) fn std_duration(duration: Duration) -> std::time::Duration {
	std::time::Duration::try_from(duration).unwrap_or_default()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::error::TransportError;

	fn server_error() -> Error {
		Error::Server { message: "HTTP 503".into(), status: Some(503) }
	}

	#[test]
	fn backoff_doubles_until_capped() {
		let policy = RetryPolicy::default();

		assert_eq!(policy.backoff(1), Duration::milliseconds(200));
		assert_eq!(policy.backoff(2), Duration::milliseconds(400));
		assert_eq!(policy.backoff(3), Duration::milliseconds(800));
		assert_eq!(policy.backoff(10), Duration::seconds(10));
		assert_eq!(policy.backoff(u32::MAX), Duration::seconds(10));
	}

	#[test]
	fn jitter_stays_within_bounds() {
		let policy = RetryPolicy::default();

		assert_eq!(policy.apply_jitter(Duration::milliseconds(400), 0.25), Duration::milliseconds(500));

		let low = policy.apply_jitter(Duration::milliseconds(400), -0.25);

		assert!((low - Duration::milliseconds(300)).abs() < Duration::microseconds(1));
		assert_eq!(policy.apply_jitter(Duration::milliseconds(200), -0.25), Duration::milliseconds(200));
		assert_eq!(policy.apply_jitter(Duration::seconds(10), 0.25), Duration::seconds(10));
		assert_eq!(policy.apply_jitter(Duration::milliseconds(400), 3.0), Duration::milliseconds(500));

		for attempt in 1..6 {
			let delay = policy.delay_for(&server_error(), attempt);
			let nominal = policy.backoff(attempt);

			assert!(delay >= policy.base_delay && delay <= policy.max_delay);
			assert!(delay >= nominal * 0.75 && delay <= nominal * 1.25);
		}
	}

	#[test]
	fn retries_only_retryable_kinds_within_budget() {
		let policy = RetryPolicy::default();
		let creds = Error::InvalidClient { reason: "invalid_client".into(), status: Some(401) };
		let network = Error::from(TransportError::Timeout { after: Duration::seconds(30) });

		assert!(policy.should_retry(&server_error(), 1));
		assert!(policy.should_retry(&network, 2));
		assert!(!policy.should_retry(&network, 3));
		assert!(!policy.should_retry(&creds, 1));
		assert!(!RetryPolicy::no_retry().should_retry(&server_error(), 1));
	}

	#[test]
	fn rate_limit_hint_takes_precedence() {
		let policy = RetryPolicy::default();
		let limited = Error::RateLimited {
			message: "slow_down".into(),
			retry_after: Some(Duration::seconds(3)),
		};

		assert_eq!(policy.delay_for(&limited, 1), Duration::seconds(3));
	}

	#[test]
	fn rate_limit_hints_are_capped_at_max_delay() {
		let policy = RetryPolicy::default();
		let parked = Error::RateLimited {
			message: "slow_down".into(),
			retry_after: Some(Duration::days(1)),
		};
		let negative = Error::RateLimited {
			message: "slow_down".into(),
			retry_after: Some(Duration::seconds(-5)),
		};

		assert_eq!(policy.delay_for(&parked, 1), RetryPolicy::DEFAULT_MAX_DELAY);
		assert_eq!(policy.delay_for(&negative, 1), Duration::ZERO);
	}

	#[test]
	fn invalid_policies_are_rejected() {
		assert!(RetryPolicy::default().validate().is_ok());
		assert!(RetryPolicy::default().with_max_attempts(0).validate().is_err());
		assert!(
			RetryPolicy::default()
				.with_delays(Duration::seconds(2), Duration::seconds(1))
				.validate()
				.is_err()
		);
		assert!(RetryPolicy::default().with_delays(Duration::ZERO, Duration::ZERO).validate().is_err());
	}
}

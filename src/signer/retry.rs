//! Bounded retry policy for signer calls.

// std
use std::time::Duration as StdDuration;
// self
use crate::{
	_prelude::*,
	config::{HttpTimeouts, MAX_SIGNER_ATTEMPTS},
	obs,
	signer::SignerError,
};

/// Exponential backoff with jitter, capped at [`MAX_SIGNER_ATTEMPTS`] attempts and, optionally,
/// by one deadline covering every attempt and backoff sleep.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
	/// Total attempts including the first call.
	pub max_attempts: u32,
	/// Delay before the second attempt; doubles for each later attempt.
	pub base_delay: StdDuration,
	/// Wall-clock limit for the whole call, retries included.
	pub budget: Option<StdDuration>,
}
impl RetryPolicy {
	/// Creates an unbounded policy; `max_attempts` is clamped into `1..=MAX_SIGNER_ATTEMPTS`.
	pub fn new(max_attempts: u32, base_delay: StdDuration) -> Self {
		Self { max_attempts: max_attempts.clamp(1, MAX_SIGNER_ATTEMPTS), base_delay, budget: None }
	}

	/// Policy that performs exactly one attempt.
	pub fn no_retry() -> Self {
		Self::new(1, StdDuration::ZERO)
	}

	/// Bounds the whole call, retries included, by `budget`.
	pub fn with_budget(mut self, budget: StdDuration) -> Self {
		self.budget = Some(budget);

		self
	}

	/// Runs `op` until it succeeds, fails terminally, or the attempt or time budget is spent.
	///
	/// Running out of time yields [`SignerError::DeadlineExceeded`], whatever attempt was in flight.
	pub async fn run<F, Fut, T>(&self, operation: &'static str, op: F) -> Result<T, SignerError>
	where
		F: FnMut() -> Fut,
		Fut: Future<Output = Result<T, SignerError>>,
	{
		let attempts = self.attempts(operation, op);

		match self.budget {
			Some(budget) => tokio::time::timeout(budget, attempts)
				.await
				.unwrap_or_else(|_| Err(SignerError::DeadlineExceeded { operation, budget })),
			None => attempts.await,
		}
	}

	async fn attempts<F, Fut, T>(&self, operation: &'static str, mut op: F) -> Result<T, SignerError>
	where
		F: FnMut() -> Fut,
		Fut: Future<Output = Result<T, SignerError>>,
	{
		let mut attempt = 1;

		loop {
			match op().await {
				Ok(value) => return Ok(value),
				Err(e) if e.is_retryable() && attempt < self.max_attempts => {
					let delay = self.delay_for(attempt);

					obs::log_signer_retry(operation, attempt, &e);
					obs::record_signer_retry(operation);
					tokio::time::sleep(delay).await;

					attempt += 1;
				},
				Err(e) => return Err(e),
			}
		}
	}

	fn delay_for(&self, attempt: u32) -> StdDuration {
		let backoff = self.base_delay.saturating_mul(1 << (attempt - 1).min(8));
		let jitter_cap = u64::try_from(self.base_delay.as_millis()).unwrap_or(u64::MAX) / 2;

		if jitter_cap == 0 {
			return backoff;
		}

		backoff + StdDuration::from_millis(rand::random_range(0..=jitter_cap))
	}
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self::new(MAX_SIGNER_ATTEMPTS, StdDuration::from_millis(100))
			.with_budget(HttpTimeouts::default().request)
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicU32, Ordering};
	// self
	use super::*;

	fn fast_policy() -> RetryPolicy {
		RetryPolicy::new(3, StdDuration::from_millis(1))
	}

	#[tokio::test]
	async fn retries_transient_failures_up_to_budget() {
		let calls = AtomicU32::new(0);
		let result: Result<(), _> = fast_policy()
			.run("sign", || {
				calls.fetch_add(1, Ordering::SeqCst);

				async { Err(SignerError::Throttled { message: "slow down".into() }) }
			})
			.await;

		assert!(matches!(result, Err(SignerError::Throttled { .. })));
		assert_eq!(calls.load(Ordering::SeqCst), 3);
	}

	#[tokio::test]
	async fn terminal_failures_are_not_retried() {
		let calls = AtomicU32::new(0);
		let result: Result<(), _> = fast_policy()
			.run("sign", || {
				calls.fetch_add(1, Ordering::SeqCst);

				async { Err(SignerError::AccessDenied { message: "denied".into() }) }
			})
			.await;

		assert!(matches!(result, Err(SignerError::AccessDenied { .. })));
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn recovers_after_transient_failure() {
		let calls = AtomicU32::new(0);
		let result = fast_policy()
			.run("sign", || {
				let attempt = calls.fetch_add(1, Ordering::SeqCst);

				async move {
					if attempt == 0 {
						Err(SignerError::Upstream { status: 500, message: "oops".into() })
					} else {
						Ok(attempt)
					}
				}
			})
			.await
			.expect("Second attempt should succeed.");

		assert_eq!(result, 1);
	}

	#[tokio::test]
	async fn budget_bounds_a_stalled_attempt() {
		let started = std::time::Instant::now();
		let result: Result<(), _> = fast_policy()
			.with_budget(StdDuration::from_millis(20))
			.run("get_public_key", || async {
				tokio::time::sleep(StdDuration::from_secs(30)).await;

				Ok(())
			})
			.await;

		assert!(matches!(
			result,
			Err(SignerError::DeadlineExceeded { operation: "get_public_key", .. })
		));
		assert!(started.elapsed() < StdDuration::from_secs(5));
	}

	#[tokio::test]
	async fn budget_covers_backoff_between_attempts() {
		let calls = AtomicU32::new(0);
		let result: Result<(), _> = RetryPolicy::new(3, StdDuration::from_secs(10))
			.with_budget(StdDuration::from_millis(20))
			.run("sign", || {
				calls.fetch_add(1, Ordering::SeqCst);

				async { Err(SignerError::Throttled { message: "slow down".into() }) }
			})
			.await;

		assert!(matches!(result, Err(SignerError::DeadlineExceeded { operation: "sign", .. })));
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn default_budget_matches_request_timeout() {
		assert_eq!(RetryPolicy::default().budget, Some(StdDuration::from_secs(29)));
		assert_eq!(RetryPolicy::no_retry().budget, None);
	}

	#[test]
	fn attempts_are_clamped() {
		assert_eq!(RetryPolicy::new(10, StdDuration::ZERO).max_attempts, MAX_SIGNER_ATTEMPTS);
		assert_eq!(RetryPolicy::new(0, StdDuration::ZERO).max_attempts, 1);
	}
}

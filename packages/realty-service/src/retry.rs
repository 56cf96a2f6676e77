use std::{future::Future, time::Duration};

use crate::{Error, Result};

/// Bounded retry applied at every backend boundary: a per-attempt timeout, a fixed backoff,
/// and at most `max_retries` extra attempts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
	pub max_retries: u32,
	pub backoff: Duration,
	pub timeout: Duration,
}
impl RetryPolicy {
	pub fn new(cfg: &realty_config::Retry, timeout_ms: u64) -> Self {
		Self {
			max_retries: cfg.max_retries,
			backoff: Duration::from_millis(cfg.backoff_ms),
			timeout: Duration::from_millis(timeout_ms),
		}
	}

	pub async fn run<T, F, Fut>(&self, backend: &'static str, mut op: F) -> Attempted<T>
	where
		F: FnMut() -> Fut,
		Fut: Future<Output = Result<T>>,
	{
		let mut attempts = 0;

		loop {
			attempts += 1;

			let message = match tokio::time::timeout(self.timeout, op()).await {
				Ok(Ok(value)) => return Attempted { result: Ok(value), attempts },
				Ok(Err(err)) => err.to_string(),
				Err(_) => format!("timed out after {} ms", self.timeout.as_millis()),
			};

			if attempts > self.max_retries {
				tracing::warn!(backend, attempts, error = %message, "Backend call failed.");

				return Attempted {
					result: Err(Error::BackendUnavailable {
						backend: backend.to_string(),
						attempts,
						message,
					}),
					attempts,
				};
			}

			tracing::debug!(
				backend,
				attempt = attempts,
				error = %message,
				"Retrying backend call."
			);
			tokio::time::sleep(self.backoff).await;
		}
	}
}

#[derive(Debug)]
pub struct Attempted<T> {
	pub result: Result<T>,
	pub attempts: u32,
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::{AtomicU32, Ordering};

	use super::*;

	fn policy(max_retries: u32, timeout_ms: u64) -> RetryPolicy {
		RetryPolicy {
			max_retries,
			backoff: Duration::from_millis(5),
			timeout: Duration::from_millis(timeout_ms),
		}
	}

	#[tokio::test]
	async fn retries_once_then_succeeds() {
		let calls = AtomicU32::new(0);
		let outcome = policy(1, 100)
			.run("retrieval", || {
				let call = calls.fetch_add(1, Ordering::SeqCst);

				async move {
					if call == 0 {
						Err(Error::Provider { message: "boom".to_string() })
					} else {
						Ok(call)
					}
				}
			})
			.await;

		assert_eq!(outcome.attempts, 2);
		assert_eq!(outcome.result.ok(), Some(1));
	}

	#[tokio::test]
	async fn second_failure_is_backend_unavailable() {
		let calls = AtomicU32::new(0);
		let outcome: Attempted<()> = policy(1, 100)
			.run("statistics", || {
				calls.fetch_add(1, Ordering::SeqCst);

				async { Err(Error::Provider { message: "down".to_string() }) }
			})
			.await;

		assert_eq!(calls.load(Ordering::SeqCst), 2);
		let unavailable = matches!(
			outcome.result,
			Err(Error::BackendUnavailable { attempts: 2, ref backend, .. })
				if backend == "statistics"
		);

		assert!(unavailable);
	}

	#[tokio::test]
	async fn slow_attempts_count_as_failures() {
		let outcome: Attempted<()> = policy(0, 10)
			.run("retrieval", || async {
				tokio::time::sleep(Duration::from_millis(200)).await;

				Ok(())
			})
			.await;
		let timed_out = matches!(
			outcome.result,
			Err(Error::BackendUnavailable { ref message, .. }) if message.contains("timed out")
		);

		assert_eq!(outcome.attempts, 1);
		assert!(timed_out);
	}
}

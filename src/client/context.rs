// crates.io
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
// self
use crate::{_prelude::*, error::TransportError, retry};

/// Per-call deadline and cancellation handle.
///
/// Every public operation that may touch the network takes a context. It bounds only the call it
/// is passed to; shared work started on behalf of several callers keeps running for the others.
#[derive(Clone, Debug, Default)]
pub struct CallContext {
	deadline: Option<Instant>,
	cancel: CancellationToken,
}
impl CallContext {
	/// Context without a deadline.
	pub fn new() -> Self {
		Self::default()
	}

	/// Context whose deadline is `timeout` from now.
	pub fn with_timeout(timeout: Duration) -> Self {
		Self::default().deadline_in(timeout)
	}

	/// Sets the deadline to `timeout` from now.
	pub fn deadline_in(mut self, timeout: Duration) -> Self {
		self.deadline = Some(Instant::now() + retry::std_duration(timeout));

		self
	}

	/// Links this context to an existing cancellation token.
	pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
		self.cancel = token;

		self
	}

	/// Cancellation token observed by this context.
	pub fn cancellation(&self) -> &CancellationToken {
		&self.cancel
	}

	/// Cancels every call running under this context.
	pub fn cancel(&self) {
		self.cancel.cancel();
	}

	/// Returns `true` once [`cancel`](Self::cancel) was called.
	pub fn is_cancelled(&self) -> bool {
		self.cancel.is_cancelled()
	}

	/// Time left before the deadline; `None` without one.
	pub fn remaining(&self) -> Option<std::time::Duration> {
		self.deadline.map(|deadline| deadline.saturating_duration_since(Instant::now()))
	}

	/// Drives `fut` until it completes, the context is cancelled, or the deadline passes.
	pub async fn run<T, F>(&self, fut: F) -> Result<T>
	where
		F: Future<Output = Result<T>>,
	{
		if self.is_cancelled() {
			return Err(TransportError::Cancelled.into());
		}

		let deadline = async {
			match self.deadline {
				Some(deadline) => tokio::time::sleep_until(deadline).await,
				None => std::future::pending().await,
			}
		};

		tokio::select! {
			biased;
			_ = self.cancel.cancelled() => Err(TransportError::Cancelled.into()),
			_ = deadline => Err(TransportError::DeadlineExceeded.into()),
			result = fut => result,
		}
	}
}

//! Observability helpers shared by acquisition, discovery, and authenticated requests.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `oauth2_cc.op` with the `op` (operation)
//!   and `stage` (call site) fields. The default [`LogSink`] also forwards to `tracing`.
//! - Enable `metrics` to increment the `oauth2_cc_operation_total` counter for every
//!   attempt/retry/success/failure, labeled by `op` + `outcome`.

mod log;
mod metrics;
mod tracing;

pub use log::*;
pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Operations observed by the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
	/// Client-credentials token acquisition (including retries).
	TokenAcquisition,
	/// Discovery document fetch.
	Discovery,
	/// Request sent through an [`AuthenticatedTransport`](crate::client::AuthenticatedTransport).
	AuthenticatedRequest,
}
impl Operation {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Operation::TokenAcquisition => "token_acquisition",
			Operation::Discovery => "discovery",
			Operation::AuthenticatedRequest => "authenticated_request",
		}
	}
}
impl Display for Operation {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Outcome {
	/// Entry to an operation.
	Attempt,
	/// A failed attempt that will be retried.
	Retry,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl Outcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Outcome::Attempt => "attempt",
			Outcome::Retry => "retry",
			Outcome::Success => "success",
			Outcome::Failure => "failure",
		}
	}
}
impl Display for Outcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

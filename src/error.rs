//! Error taxonomy shared by discovery, token acquisition, and authenticated transports.
//!
//! Every error answers [`Error::kind`] so callers can branch on the coarse category
//! (configuration, credentials, network, ...) without matching concrete variants.
//! Messages built from server-supplied text pass through [`redact`](crate::redact::redact)
//! before they are stored, so formatting an error never leaks credential material.

// self
use crate::{
	_prelude::*,
	auth::{IdentifierError, ScopeValidationError, TokenBuilderError},
	discovery::DiscoveryError,
	redact,
};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type SharedError = Arc<dyn StdError + Send + Sync>;

/// Coarse error categories used for retry decisions and caller branching.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
	/// Local configuration problem or a closed client.
	Configuration,
	/// Discovery document could not be fetched or validated.
	Discovery,
	/// Authorization server rejected the client credentials.
	Credentials,
	/// Network, timeout, or cancellation failure.
	Network,
	/// Authorization server failed or answered with an unusable response.
	ServerError,
	/// Authorization server asked the client to slow down.
	RateLimit,
	/// A freshly refreshed token was rejected again by the downstream API.
	TokenExpiredDuringOperation,
}
impl ErrorKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			ErrorKind::Configuration => "configuration",
			ErrorKind::Discovery => "discovery",
			ErrorKind::Credentials => "credentials",
			ErrorKind::Network => "network",
			ErrorKind::ServerError => "server_error",
			ErrorKind::RateLimit => "rate_limit",
			ErrorKind::TokenExpiredDuringOperation => "token_expired_during_operation",
		}
	}

	/// Returns `true` for categories that may succeed when retried.
	pub const fn is_retryable(self) -> bool {
		matches!(self, ErrorKind::Network | ErrorKind::ServerError | ErrorKind::RateLimit)
	}
}
impl Display for ErrorKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Canonical error exposed by public APIs.
#[derive(Clone, Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Discovery failure; only surfaced by direct [`DiscoveryClient`](crate::discovery::DiscoveryClient) calls.
	#[error(transparent)]
	Discovery(#[from] DiscoveryError),
	/// Transport failure (DNS, TCP, TLS, timeout, cancellation).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// Client authentication failed.
	#[error("Credentials rejected by the authorization server: {reason}.")]
	InvalidClient {
		/// Redacted provider-supplied reason string.
		reason: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Authorization server failed or returned an unusable response.
	#[error("Authorization server error: {message}.")]
	Server {
		/// Redacted description of the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Authorization server throttled the request.
	#[error("Authorization server rate limited the request: {message}.")]
	RateLimited {
		/// Redacted description of the failure.
		message: String,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Downstream API rejected the request again after a forced token refresh.
	#[error("Request was rejected with HTTP {status} even after refreshing the access token.")]
	TokenExpiredDuringOperation {
		/// Status code of the second rejection.
		status: u16,
	},
	/// Retryable failure that persisted through every permitted attempt.
	#[error("Gave up after {attempts} attempts: {source}")]
	Exhausted {
		/// Number of attempts made, including the first.
		attempts: u32,
		/// Error returned by the final attempt.
		#[source]
		source: Box<Error>,
	},
}
impl Error {
	/// Returns the coarse category for this error.
	pub fn kind(&self) -> ErrorKind {
		match self {
			Self::Config(_) => ErrorKind::Configuration,
			Self::Discovery(_) => ErrorKind::Discovery,
			Self::Transport(_) => ErrorKind::Network,
			Self::InvalidClient { .. } => ErrorKind::Credentials,
			Self::Server { .. } => ErrorKind::ServerError,
			Self::RateLimited { .. } => ErrorKind::RateLimit,
			Self::TokenExpiredDuringOperation { .. } => ErrorKind::TokenExpiredDuringOperation,
			Self::Exhausted { source, .. } => source.kind(),
		}
	}

	/// Returns `true` when the error category is eligible for retries.
	pub fn is_retryable(&self) -> bool {
		self.kind().is_retryable()
	}

	/// Server-supplied retry hint, if any.
	pub fn retry_after(&self) -> Option<Duration> {
		match self {
			Self::RateLimited { retry_after, .. } => *retry_after,
			Self::Exhausted { source, .. } => source.retry_after(),
			_ => None,
		}
	}

	/// Number of attempts that produced this error.
	pub fn attempts(&self) -> u32 {
		match self {
			Self::Exhausted { attempts, .. } => *attempts,
			_ => 1,
		}
	}

	/// HTTP status associated with the failure, when known.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::InvalidClient { status, .. } | Self::Server { status, .. } => *status,
			Self::RateLimited { .. } => Some(429),
			Self::TokenExpiredDuringOperation { status } => Some(*status),
			Self::Config(ConfigError::RequestRejected { status, .. }) => *status,
			Self::Discovery(DiscoveryError::Status { status, .. }) => Some(*status),
			Self::Exhausted { source, .. } => source.status(),
			_ => None,
		}
	}

	pub(crate) fn exhausted(self, attempts: u32) -> Self {
		Self::Exhausted { attempts, source: Box::new(self) }
	}
}

/// Configuration and validation failures.
#[derive(Clone, Debug, ThisError)]
pub enum ConfigError {
	/// A required configuration value is absent or empty.
	#[error("Configuration is missing the `{field}` value.")]
	MissingField {
		/// Name of the missing field.
		field: &'static str,
	},
	/// Identifier validation failed.
	#[error(transparent)]
	InvalidIdentifier(#[from] IdentifierError),
	/// A configured URL cannot be parsed.
	#[error("The {field} URL is invalid.")]
	InvalidUrl {
		/// Name of the offending field.
		field: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A configured URL cannot carry path segments.
	#[error("The {field} URL cannot be used as a base URL: {url}.")]
	CannotBeBase {
		/// Name of the offending field.
		field: &'static str,
		/// Redacted URL.
		url: String,
	},
	/// Endpoints must use HTTPS (loopback hosts excepted).
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Redacted endpoint URL.
		url: String,
	},
	/// Environment hint is not one of the known environments.
	#[error("Unknown environment `{value}`; expected production, staging, development, or test.")]
	UnknownEnvironment {
		/// Rejected input.
		value: String,
	},
	/// Requested scopes cannot be normalized.
	#[error("Requested scopes are invalid.")]
	InvalidScope(#[from] ScopeValidationError),
	/// Timeout must be positive.
	#[error("The request timeout must be positive.")]
	InvalidTimeout,
	/// Safety margin must not be negative.
	#[error("The token safety margin must not be negative.")]
	InvalidSafetyMargin,
	/// Extra token parameters may not replace the grant's own fields.
	#[error("Extra token parameter `{name}` is reserved.")]
	ReservedParameter {
		/// Rejected parameter name.
		name: String,
	},
	/// Retry policy values are inconsistent.
	#[error("Retry policy is invalid: {reason}.")]
	InvalidRetryPolicy {
		/// Description of the violated constraint.
		reason: &'static str,
	},
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: SharedError,
	},
	/// HTTP request construction failed.
	#[error("HTTP request could not be built.")]
	HttpRequest {
		/// Underlying builder failure.
		#[source]
		source: SharedError,
	},
	/// Token response could not be turned into a token.
	#[error("Unable to build token.")]
	TokenBuild(#[from] TokenBuilderError),
	/// Authorization server rejected the request shape (scope, grant, endpoint).
	#[error("Authorization server rejected the token request: {reason}.")]
	RequestRejected {
		/// Redacted provider-supplied reason string.
		reason: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// The client was closed and can no longer issue tokens.
	#[error("The authentication client has been closed.")]
	ClientClosed,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::HttpClientBuild { source: Arc::new(src) }
	}

	/// Wraps an HTTP request builder failure inside [`ConfigError`].
	pub fn http_request(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::HttpRequest { source: Arc::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO, timeout, cancellation).
#[derive(Clone, Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error: {detail}.")]
	Network {
		/// Redacted rendering of the underlying failure.
		detail: String,
		/// Transport-specific network error.
		#[source]
		source: SharedError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error: {detail}.")]
	Io {
		/// Redacted rendering of the underlying failure.
		detail: String,
		/// Underlying IO error.
		#[source]
		source: Arc<std::io::Error>,
	},
	/// Request did not finish within the configured timeout.
	#[error("Request timed out after {after}.")]
	Timeout {
		/// Timeout that elapsed.
		after: Duration,
	},
	/// The caller's deadline elapsed first.
	#[error("The caller's deadline elapsed before the request completed.")]
	DeadlineExceeded,
	/// The caller cancelled the operation.
	#[error("The operation was cancelled by the caller.")]
	Cancelled,
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Network { detail: redact::redact(&src.to_string()), source: Arc::new(src) }
	}

	/// Wraps an IO error.
	pub fn io(src: std::io::Error) -> Self {
		Self::Io { detail: redact::redact(&src.to_string()), source: Arc::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

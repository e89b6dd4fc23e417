//! Token-endpoint error classification and request decoration hooks.
//!
//! The hooks only see crate-owned primitives (status codes, OAuth fields, body preview), so
//! implementations never depend on the HTTP client in use.

// self
use crate::_prelude::*;

/// Strategy that classifies token-endpoint failures and may decorate outgoing requests.
pub trait TokenErrorClassifier: Send + Sync {
	/// Maps a failed token response onto the client's error categories.
	fn classify_token_error(&self, ctx: &TokenErrorContext) -> TokenErrorKind;

	/// Adds form parameters (audience, resource, ...) before a token request is sent.
	///
	/// The default implementation leaves the form untouched.
	fn augment_token_request(&self, _form: &mut BTreeMap<String, String>) {}
}

/// Categories a token-endpoint failure can fall into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenErrorKind {
	/// Client authentication failed; surfaced as a Credentials error.
	InvalidClient,
	/// Request shape was refused (scope, grant type, endpoint); surfaced as a Configuration error.
	Rejected,
	/// Server asked the client to back off.
	RateLimited,
	/// Failure is temporary and may be retried.
	Transient,
}

/// Failure details handed to [`TokenErrorClassifier::classify_token_error`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TokenErrorContext {
	/// HTTP status code returned by the server, when available.
	pub http_status: Option<u16>,
	/// OAuth `error` field.
	pub oauth_error: Option<String>,
	/// OAuth `error_description` field.
	pub error_description: Option<String>,
	/// Redacted preview of a non-JSON response body.
	pub body_preview: Option<String>,
	/// Failure originated in the transport rather than the server.
	pub network_error: bool,
}
impl TokenErrorContext {
	const BODY_PREVIEW_LIMIT: usize = 256;

	/// Context for a transport-level failure.
	pub fn network_failure() -> Self {
		Self { network_error: true, ..Default::default() }
	}

	/// Adds an HTTP status code.
	pub fn with_http_status(mut self, status: u16) -> Self {
		self.http_status = Some(status);

		self
	}

	/// Adds the OAuth `error` code.
	pub fn with_oauth_error(mut self, error: impl Into<String>) -> Self {
		self.oauth_error = Some(error.into());

		self
	}

	/// Adds the OAuth `error_description`.
	pub fn with_error_description(mut self, description: impl Into<String>) -> Self {
		self.error_description = Some(description.into());

		self
	}

	/// Adds a truncated body preview.
	pub fn with_body_preview(mut self, body: impl Into<String>) -> Self {
		let body = body.into();

		self.body_preview = Some(if body.chars().count() > Self::BODY_PREVIEW_LIMIT {
			body.chars().take(Self::BODY_PREVIEW_LIMIT).chain(['…']).collect()
		} else {
			body
		});

		self
	}

	/// Best human-readable reason: description, then error code, then body preview.
	pub fn reason(&self) -> String {
		self.error_description
			.as_deref()
			.or(self.oauth_error.as_deref())
			.or(self.body_preview.as_deref())
			.map_or_else(
				|| self.http_status.map_or_else(|| "no details".into(), |s| format!("HTTP {s}")),
				str::to_owned,
			)
	}
}

/// Default classifier.
///
/// HTTP 429 is always rate limiting. Otherwise the OAuth `error` code decides, then keywords in
/// `error_description` or the body, then the HTTP status. Network failures are transient.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultTokenErrorClassifier;
impl TokenErrorClassifier for DefaultTokenErrorClassifier {
	fn classify_token_error(&self, ctx: &TokenErrorContext) -> TokenErrorKind {
		if ctx.network_error {
			return TokenErrorKind::Transient;
		}
		if ctx.http_status == Some(429) {
			return TokenErrorKind::RateLimited;
		}

		ctx.oauth_error
			.as_deref()
			.and_then(match_error_code)
			.or_else(|| match_text(ctx.error_description.as_deref()))
			.or_else(|| match_text(ctx.body_preview.as_deref()))
			.unwrap_or_else(|| classify_status(ctx.http_status))
	}
}

fn match_error_code(code: &str) -> Option<TokenErrorKind> {
	let code = code.to_ascii_lowercase();

	match code.as_str() {
		"invalid_client" | "unauthorized_client" | "access_denied" | "invalid_grant" =>
			Some(TokenErrorKind::InvalidClient),
		"invalid_scope" | "invalid_request" | "unsupported_grant_type" => Some(TokenErrorKind::Rejected),
		"slow_down" => Some(TokenErrorKind::RateLimited),
		"server_error" | "temporarily_unavailable" => Some(TokenErrorKind::Transient),
		_ => None,
	}
}

fn match_text(text: Option<&str>) -> Option<TokenErrorKind> {
	let lowered = text?.to_ascii_lowercase();

	match lowered.as_str() {
		text if text.contains("invalid_client") || text.contains("unauthorized_client") =>
			Some(TokenErrorKind::InvalidClient),
		text if text.contains("invalid_scope") || text.contains("unsupported_grant_type") =>
			Some(TokenErrorKind::Rejected),
		text if text.contains("rate limit") || text.contains("too many requests") =>
			Some(TokenErrorKind::RateLimited),
		text if text.contains("temporarily_unavailable") => Some(TokenErrorKind::Transient),
		_ => None,
	}
}

fn classify_status(status: Option<u16>) -> TokenErrorKind {
	match status {
		Some(400 | 404 | 405 | 410) => TokenErrorKind::Rejected,
		Some(401 | 403) => TokenErrorKind::InvalidClient,
		_ => TokenErrorKind::Transient,
	}
}

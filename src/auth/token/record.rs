//! Immutable access token and its builder.

// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, token::secret::TokenSecret},
};

/// Errors produced by [`TokenBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum TokenBuilderError {
	/// Issued when no access token value was provided.
	#[error("Access token is required.")]
	MissingAccessToken,
	/// Issued when no expiry (absolute or relative) was configured.
	#[error("Expiry must be supplied via expires_at or expires_in.")]
	MissingExpiry,
	/// Issued when the expiry does not lie after the issued-at instant.
	#[error("Token expiry must be later than its issued-at instant.")]
	NonPositiveLifetime,
}

/// Bearer token issued by the client-credentials grant.
///
/// Tokens are never mutated. A refresh produces a new value that replaces the cached one.
#[derive(Clone)]
pub struct Token {
	/// Opaque access token value.
	pub access_token: TokenSecret,
	/// Token type reported by the server, normalized to `Bearer`.
	pub token_type: String,
	/// Instant the token was received.
	pub issued_at: OffsetDateTime,
	/// Instant the token stops being accepted.
	pub expires_at: OffsetDateTime,
	/// Scopes granted by the server.
	pub scope: ScopeSet,
}
impl Token {
	/// Returns a builder.
	pub fn builder() -> TokenBuilder {
		TokenBuilder::default()
	}

	/// Total validity window.
	pub fn lifetime(&self) -> Duration {
		self.expires_at - self.issued_at
	}

	/// Returns `true` while `now < expires_at - safety_margin`.
	///
	/// A token whose lifetime is shorter than the margin is never usable from the cache.
	pub fn is_usable_at(&self, now: OffsetDateTime, safety_margin: Duration) -> bool {
		now < self.expires_at - safety_margin.max(Duration::ZERO)
	}

	/// Convenience wrapper for [`is_usable_at`](Self::is_usable_at) with the current clock.
	pub fn is_usable(&self, safety_margin: Duration) -> bool {
		self.is_usable_at(OffsetDateTime::now_utc(), safety_margin)
	}

	/// Remaining time until hard expiry, saturating at zero.
	pub fn remaining_at(&self, now: OffsetDateTime) -> Duration {
		(self.expires_at - now).max(Duration::ZERO)
	}

	/// `Authorization` header value.
	pub fn authorization_value(&self) -> String {
		format!("Bearer {}", self.access_token.expose())
	}

	/// Returns `true` if both tokens carry the same access token value.
	pub fn same_secret(&self, other: &Token) -> bool {
		self.access_token == other.access_token
	}
}
impl Debug for Token {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Token")
			.field("access_token", &self.access_token.fingerprint())
			.field("token_type", &self.token_type)
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.field("scope", &self.scope)
			.finish()
	}
}

/// Builder for [`Token`].
#[derive(Clone, Debug, Default)]
pub struct TokenBuilder {
	access_token: Option<TokenSecret>,
	scope: ScopeSet,
	issued_at: Option<OffsetDateTime>,
	expires_at: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
}
impl TokenBuilder {
	/// Provides the access token value.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(TokenSecret::new(token));

		self
	}

	/// Sets the granted scopes.
	pub fn scope(mut self, scope: ScopeSet) -> Self {
		self.scope = scope;

		self
	}

	/// Sets the issued-at instant.
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Sets an absolute expiry instant.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Sets a relative expiry duration from the issued instant.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expires_in = Some(duration);

		self
	}

	/// Consumes the builder and produces a [`Token`].
	pub fn build(self) -> Result<Token, TokenBuilderError> {
		let access_token = self.access_token.ok_or(TokenBuilderError::MissingAccessToken)?;

		if access_token.expose().is_empty() {
			return Err(TokenBuilderError::MissingAccessToken);
		}

		let issued_at = self.issued_at.unwrap_or_else(OffsetDateTime::now_utc);
		let expires_at = match (self.expires_at, self.expires_in) {
			(Some(instant), _) => instant,
			(None, Some(delta)) => issued_at + delta,
			(None, None) => return Err(TokenBuilderError::MissingExpiry),
		};

		if expires_at <= issued_at {
			return Err(TokenBuilderError::NonPositiveLifetime);
		}

		Ok(Token {
			access_token,
			token_type: "Bearer".into(),
			issued_at,
			expires_at,
			scope: self.scope,
		})
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn token(expires_in: Duration) -> Token {
		Token::builder()
			.access_token("opaque")
			.issued_at(macros::datetime!(2025-01-01 00:00 UTC))
			.expires_in(expires_in)
			.build()
			.expect("Token fixture should build.")
	}

	#[test]
	fn usable_until_margin_before_expiry() {
		let token = token(Duration::hours(1));
		let margin = Duration::seconds(60);

		assert!(token.is_usable_at(macros::datetime!(2025-01-01 00:58:59 UTC), margin));
		assert!(!token.is_usable_at(macros::datetime!(2025-01-01 00:59 UTC), margin));
		assert!(!token.is_usable_at(macros::datetime!(2025-01-01 01:30 UTC), margin));
	}

	#[test]
	fn tokens_shorter_than_the_margin_are_never_usable() {
		let token = token(Duration::seconds(2));

		assert!(!token.is_usable_at(macros::datetime!(2025-01-01 00:00 UTC), Duration::seconds(60)));
		assert!(token.is_usable_at(macros::datetime!(2025-01-01 00:00:01 UTC), Duration::ZERO));
	}

	#[test]
	fn builder_rejects_missing_and_inverted_expiry() {
		assert_eq!(
			Token::builder().expires_in(Duration::minutes(5)).build().unwrap_err(),
			TokenBuilderError::MissingAccessToken
		);
		assert_eq!(
			Token::builder().access_token("a").build().unwrap_err(),
			TokenBuilderError::MissingExpiry
		);
		assert_eq!(
			Token::builder().access_token("a").expires_in(Duration::ZERO).build().unwrap_err(),
			TokenBuilderError::NonPositiveLifetime
		);
	}

	#[test]
	fn debug_shows_fingerprint_not_secret() {
		let token = token(Duration::minutes(5));
		let rendered = format!("{token:?}");

		assert!(!rendered.contains("opaque"));
		assert!(rendered.contains(&token.access_token.fingerprint()));
		assert_eq!(token.authorization_value(), "Bearer opaque");
		assert_eq!(token.remaining_at(macros::datetime!(2025-01-01 00:10 UTC)), Duration::ZERO);
	}
}

//! Acquisition sequence run once per single-flight.

// self
use super::{ClientInner, ResolvedEndpoints};
use crate::{
	_prelude::*,
	auth::Token,
	obs::{self, OpSpan, Operation, Outcome},
	oauth::{self, TokenRequest},
	retry,
};

impl ClientInner {
	/// Resolves endpoints, requests a token with retries, and caches the result.
	pub(super) async fn acquire(self: Arc<Self>, generation: u64) -> Result<Token> {
		const OP: Operation = Operation::TokenAcquisition;

		let span = OpSpan::new(OP, "acquire");

		obs::record_outcome(OP, Outcome::Attempt);
		self.metrics.record_attempt();

		let result = span.instrument(self.acquire_with_retry()).await;
		let result = result.and_then(|token| {
			// Do not repopulate a cache that `close` just cleared.
			self.ensure_open()?;
			self.cache.put(token.clone());

			Ok(token)
		});

		match &result {
			Ok(token) => {
				obs::record_outcome(OP, Outcome::Success);
				self.metrics.record_success();
				self.logger.info(&format!(
					"Acquired access token {} valid for {}s.",
					token.access_token.fingerprint(),
					token.lifetime().whole_seconds()
				));
			},
			Err(err) => {
				obs::record_outcome(OP, Outcome::Failure);
				self.metrics.record_failure();
				self.logger.error(&format!(
					"Token acquisition failed after {} attempt(s): {err}",
					err.attempts()
				));
			},
		}

		self.finish_flight(generation);

		result
	}

	async fn acquire_with_retry(&self) -> Result<Token> {
		let resolved = self.resolve_endpoints().await;
		let mut attempt = 1;

		loop {
			let err = match self.request_token(&resolved).await {
				Ok(token) => return Ok(token),
				Err(err) => err,
			};

			if !self.retry.should_retry(&err, attempt) {
				return Err(if err.is_retryable() { err.exhausted(attempt) } else { err });
			}

			let delay = self.retry.delay_for(&err, attempt);

			obs::record_outcome(Operation::TokenAcquisition, Outcome::Retry);
			self.metrics.record_retry();
			self.logger.warn(&format!(
				"Token request attempt {attempt} failed ({}); retrying in {}ms.",
				err.kind(),
				delay.whole_milliseconds()
			));

			tokio::time::sleep(retry::std_duration(delay)).await;

			attempt += 1;
		}
	}

	async fn request_token(&self, resolved: &ResolvedEndpoints) -> Result<Token> {
		let credentials = self.credentials()?;

		oauth::exchange_client_credentials(TokenRequest {
			token_url: &resolved.endpoints.token,
			credentials: &credentials,
			auth_method: resolved.auth_method,
			scopes: &self.scopes,
			extra_params: &self.extra_params,
			classifier: self.classifier.as_ref(),
			executor: self.executor.clone(),
			timeout: self.timeout,
		})
		.await
	}

	/// Returns the memoized endpoints, running discovery on first use.
	///
	/// Discovery failures fall back to the resolver's endpoints with a single warning.
	async fn resolve_endpoints(&self) -> ResolvedEndpoints {
		if let Some(resolved) = self.resolved.read().clone() {
			return resolved;
		}

		let configured = self.client_auth.unwrap_or_default();
		let resolved = match &self.discovery {
			None => ResolvedEndpoints { endpoints: self.fallback.clone(), auth_method: configured },
			Some(discovery) => match discovery.discover(&self.fallback.authorization).await {
				Ok(document) => {
					self.logger.debug(&format!(
						"Discovered token endpoint {} for issuer {}.",
						document.token_endpoint, document.issuer
					));

					let mut endpoints = self.fallback.clone();

					endpoints.token = document.token_endpoint.clone();

					ResolvedEndpoints {
						endpoints,
						auth_method: self
							.client_auth
							.unwrap_or_else(|| document.preferred_auth_method()),
					}
				},
				Err(err) => {
					self.logger.warn(&format!(
						"Discovery failed, using the derived token endpoint {}: {err}",
						self.fallback.token
					));

					ResolvedEndpoints { endpoints: self.fallback.clone(), auth_method: configured }
				},
			},
		};

		*self.resolved.write() = Some(resolved.clone());

		resolved
	}
}

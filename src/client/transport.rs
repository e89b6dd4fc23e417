//! Authenticated transport that attaches bearer tokens to outgoing requests.

// crates.io
use oauth2::http::{
	HeaderValue, StatusCode,
	header::{AUTHORIZATION, WWW_AUTHENTICATE},
};
// self
use crate::{
	_prelude::*,
	auth::Token,
	client::{AuthClient, CallContext},
	error::ConfigError,
	http::{self, HttpExecutor, HttpRequest, HttpResponse},
	obs::{self, OpSpan, Operation, Outcome},
};

/// Decorates an [`HttpExecutor`] with the client's bearer token.
///
/// A response rejecting the token (HTTP 401, or a `WWW-Authenticate` challenge carrying
/// `invalid_token`) invalidates the cached token and replays the request once with a fresh one.
/// A second rejection surfaces as [`Error::TokenExpiredDuringOperation`].
#[derive(Clone)]
pub struct AuthenticatedTransport {
	client: AuthClient,
	inner: Arc<dyn HttpExecutor>,
	timeout: Option<Duration>,
}
impl AuthenticatedTransport {
	/// Wraps `inner`, authenticating through `client`.
	pub fn new(client: AuthClient, inner: Arc<dyn HttpExecutor>) -> Self {
		Self { client, inner, timeout: None }
	}

	/// Bounds every downstream request; defaults to the client's network timeout.
	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = Some(timeout);

		self
	}

	/// Sends `request` with a bearer token under `ctx`.
	pub async fn send(&self, request: HttpRequest, ctx: &CallContext) -> Result<HttpResponse> {
		const OP: Operation = Operation::AuthenticatedRequest;

		let span = OpSpan::new(OP, "send");

		obs::record_outcome(OP, Outcome::Attempt);

		let result = span.instrument(self.send_with_replay(request, ctx)).await;

		match &result {
			Ok(_) => obs::record_outcome(OP, Outcome::Success),
			Err(_) => obs::record_outcome(OP, Outcome::Failure),
		}

		result
	}

	async fn send_with_replay(&self, request: HttpRequest, ctx: &CallContext) -> Result<HttpResponse> {
		let replay = duplicate(&request);
		let token = self.client.get_token(ctx).await?;
		let response = self.forward(request, &token, ctx).await?;

		if !rejects_token(&response) {
			return Ok(response);
		}

		obs::record_outcome(Operation::AuthenticatedRequest, Outcome::Retry);
		self.client.inner.cache.invalidate_if(&token);
		self.client.inner.logger.info(&format!(
			"Request to {} rejected access token {} with HTTP {}; refreshing once.",
			replay.uri(),
			token.access_token.fingerprint(),
			response.status().as_u16()
		));

		let token = self.client.get_token(ctx).await?;
		let response = self.forward(replay, &token, ctx).await?;

		if rejects_token(&response) {
			return Err(Error::TokenExpiredDuringOperation { status: response.status().as_u16() });
		}

		Ok(response)
	}

	async fn forward(
		&self,
		mut request: HttpRequest,
		token: &Token,
		ctx: &CallContext,
	) -> Result<HttpResponse> {
		let mut value =
			HeaderValue::from_str(&token.authorization_value()).map_err(ConfigError::http_request)?;

		value.set_sensitive(true);
		request.headers_mut().insert(AUTHORIZATION, value);

		let timeout = self.timeout.unwrap_or(self.client.inner.timeout);

		ctx.run(async { Ok(http::send(self.inner.as_ref(), request, timeout).await?) }).await
	}
}
impl Debug for AuthenticatedTransport {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthenticatedTransport")
			.field("client", &self.client)
			.field("timeout", &self.timeout)
			.finish_non_exhaustive()
	}
}

fn rejects_token(response: &HttpResponse) -> bool {
	if response.status() == StatusCode::UNAUTHORIZED {
		return true;
	}

	response
		.headers()
		.get_all(WWW_AUTHENTICATE)
		.iter()
		.filter_map(|value| value.to_str().ok())
		.any(|challenge| challenge.contains("invalid_token"))
}

fn duplicate(request: &HttpRequest) -> HttpRequest {
	let mut copy = HttpRequest::new(request.body().clone());

	*copy.method_mut() = request.method().clone();
	*copy.uri_mut() = request.uri().clone();
	*copy.version_mut() = request.version();
	*copy.headers_mut() = request.headers().clone();

	copy
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// crates.io
	use oauth2::http::{Method, Request};
	// self
	use super::*;
	use crate::_preludet::*;

	fn api_request() -> HttpRequest {
		Request::builder()
			.method(Method::GET)
			.uri("https://api.tenantapi.com/v1/widgets")
			.body(Vec::new())
			.expect("Request fixture should build.")
	}

	fn is_token_call(request: &HttpRequest) -> bool {
		request.uri().path().ends_with("/oauth2/token")
	}

	fn client(http: Arc<FnHttpClient>) -> AuthClient {
		AuthClient::with_http_client(
			test_config("acme").disable_discovery().build().expect("Configuration should build."),
			http,
		)
		.expect("Client should construct.")
	}

	#[tokio::test]
	async fn attaches_bearer_token() {
		let http = Arc::new(FnHttpClient::new(|request| {
			if is_token_call(request) {
				Ok(json_response(200, token_body("at-1", 3600)))
			} else {
				Ok(json_response(200, "{}"))
			}
		}));
		let response = client(http.clone())
			.transport()
			.send(api_request(), &CallContext::new())
			.await
			.expect("Authenticated request should succeed.");
		let calls = http.calls();

		assert_eq!(response.status(), StatusCode::OK);
		assert_eq!(calls.len(), 2);
		assert_eq!(calls[1].authorization.as_deref(), Some("Bearer at-1"));
	}

	#[tokio::test]
	async fn one_rejection_refreshes_and_replays() {
		let tokens = Arc::new(AtomicUsize::new(0));
		let api = Arc::new(AtomicUsize::new(0));
		let (issued, served) = (tokens.clone(), api.clone());
		let http = Arc::new(FnHttpClient::new(move |request| {
			if is_token_call(request) {
				let n = issued.fetch_add(1, Ordering::SeqCst);

				Ok(json_response(200, token_body(&format!("at-{n}"), 3600)))
			} else if served.fetch_add(1, Ordering::SeqCst) == 0 {
				Ok(json_response(401, "{\"error\":\"invalid_token\"}"))
			} else {
				Ok(json_response(200, "{}"))
			}
		}));
		let client = client(http.clone());
		let response = client
			.transport()
			.send(api_request(), &CallContext::new())
			.await
			.expect("Replayed request should succeed.");
		let calls = http.calls();

		assert_eq!(response.status(), StatusCode::OK);
		assert_eq!(tokens.load(Ordering::SeqCst), 2);
		assert_eq!(api.load(Ordering::SeqCst), 2);
		assert_eq!(calls[3].authorization.as_deref(), Some("Bearer at-1"));
	}

	#[tokio::test]
	async fn second_rejection_surfaces_expiry() {
		let http = Arc::new(FnHttpClient::new(|request| {
			if is_token_call(request) {
				Ok(json_response(200, token_body("at", 3600)))
			} else {
				let mut response = json_response(403, "");

				response.headers_mut().insert(
					WWW_AUTHENTICATE,
					HeaderValue::from_static("Bearer error=\"invalid_token\""),
				);

				Ok(response)
			}
		}));
		let err = client(http.clone())
			.transport()
			.send(api_request(), &CallContext::new())
			.await
			.expect_err("Persistent rejection must fail.");

		assert!(matches!(err, Error::TokenExpiredDuringOperation { status: 403 }));
		assert_eq!(err.kind(), ErrorKind::TokenExpiredDuringOperation);
		assert_eq!(http.calls_to("/v1/widgets"), 2);
		assert_eq!(http.calls_to("/oauth2/token"), 2);
	}

	#[tokio::test]
	async fn other_failures_pass_through() {
		let http = Arc::new(FnHttpClient::new(|request| {
			if is_token_call(request) {
				Ok(json_response(200, token_body("at", 3600)))
			} else {
				Ok(json_response(500, "{}"))
			}
		}));
		let response = client(http.clone())
			.transport()
			.send(api_request(), &CallContext::new())
			.await
			.expect("Non-auth failures are returned to the caller.");

		assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
		assert_eq!(http.total_calls(), 2);
	}
}

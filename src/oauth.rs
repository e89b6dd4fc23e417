//! Client-credentials exchange on top of the `oauth2` crate.

// crates.io
use oauth2::{
	AuthType, ClientId as OAuthClientId, ClientSecret, HttpClientError, RequestTokenError, Scope,
	TokenResponse, TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicRequestTokenError, BasicTokenType},
};
// self
use crate::{
	_prelude::*,
	auth::{Credentials, ScopeSet, Token},
	config::ClientAuthMethod,
	error::{ConfigError, TransportError},
	http::{HttpExecutor, OAuthHandle, ResponseMetadata},
	redact,
	strategy::{TokenErrorClassifier, TokenErrorContext, TokenErrorKind},
};

/// Everything one token request needs; borrowed from the client for the attempt's duration.
pub(crate) struct TokenRequest<'a> {
	pub(crate) token_url: &'a Url,
	pub(crate) credentials: &'a Credentials,
	pub(crate) auth_method: ClientAuthMethod,
	pub(crate) scopes: &'a ScopeSet,
	pub(crate) extra_params: &'a BTreeMap<String, String>,
	pub(crate) classifier: &'a dyn TokenErrorClassifier,
	pub(crate) executor: Arc<dyn HttpExecutor>,
	pub(crate) timeout: Duration,
}

/// Performs one `grant_type=client_credentials` request.
pub(crate) async fn exchange_client_credentials(request: TokenRequest<'_>) -> Result<Token> {
	let token_url = TokenUrl::new(request.token_url.to_string())
		.map_err(|source| ConfigError::InvalidUrl { field: "token", source })?;
	let mut client = BasicClient::new(OAuthClientId::new(
		request.credentials.client_id().as_ref().to_owned(),
	))
	.set_client_secret(ClientSecret::new(request.credentials.expose_secret().to_owned()))
	.set_token_uri(token_url);

	if matches!(request.auth_method, ClientAuthMethod::ClientSecretPost) {
		client = client.set_auth_type(AuthType::RequestBody);
	}

	let mut form = request.extra_params.clone();

	request.classifier.augment_token_request(&mut form);

	let handle = OAuthHandle::new(request.executor.clone(), request.timeout);
	let mut exchange = client.exchange_client_credentials();

	for scope in request.scopes.iter() {
		exchange = exchange.add_scope(Scope::new(scope.to_owned()));
	}
	for (key, value) in form {
		exchange = exchange.add_extra_param(key, value);
	}

	let response = exchange
		.request_async(&handle)
		.await
		.map_err(|err| map_request_error(request.classifier, handle.slot().take(), err))?;
	let status = Some(200);

	if !matches!(response.token_type(), BasicTokenType::Bearer) {
		return Err(Error::Server {
			message: format!(
				"Token endpoint issued an unsupported token type `{}`",
				response.token_type().as_ref()
			),
			status,
		});
	}

	let expires_in = response
		.expires_in()
		.and_then(|lifetime| i64::try_from(lifetime.as_secs()).ok())
		.filter(|secs| *secs > 0)
		.ok_or_else(|| Error::Server {
			message: "Token response lacks a positive `expires_in`".into(),
			status,
		})?;
	let scope = match response.scopes() {
		Some(granted) => ScopeSet::from_response(
			&granted.iter().map(|scope| scope.as_str()).collect::<Vec<_>>().join(" "),
		),
		None => request.scopes.clone(),
	};

	Token::builder()
		.access_token(response.access_token().secret().to_owned())
		.scope(scope)
		.issued_at(OffsetDateTime::now_utc())
		.expires_in(Duration::seconds(expires_in))
		.build()
		.map_err(|err| ConfigError::from(err).into())
}

fn map_request_error(
	classifier: &dyn TokenErrorClassifier,
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<TransportError>>,
) -> Error {
	let meta = meta.unwrap_or_default();

	match err {
		RequestTokenError::ServerResponse(response) =>
			classify(classifier, &meta, server_context(&response)),
		RequestTokenError::Request(error) => map_transport_error(error),
		RequestTokenError::Parse(error, body) => match meta.status {
			Some(status) if status != 200 => classify(
				classifier,
				&meta,
				TokenErrorContext::default()
					.with_body_preview(redact::redact(&String::from_utf8_lossy(&body))),
			),
			status => Error::Server {
				message: format!(
					"Token response could not be parsed at `{}`: {}",
					error.path(),
					redact::redact(&error.inner().to_string())
				),
				status,
			},
		},
		RequestTokenError::Other(message) => classify(
			classifier,
			&meta,
			TokenErrorContext::default().with_body_preview(redact::redact(&message)),
		),
	}
}

fn server_context(response: &BasicErrorResponse) -> TokenErrorContext {
	let ctx = TokenErrorContext::default().with_oauth_error(response.error().as_ref());

	match response.error_description() {
		Some(description) => ctx.with_error_description(redact::redact(description)),
		None => ctx,
	}
}

fn classify(
	classifier: &dyn TokenErrorClassifier,
	meta: &ResponseMetadata,
	ctx: TokenErrorContext,
) -> Error {
	let ctx = match meta.status {
		Some(status) => ctx.with_http_status(status),
		None => ctx,
	};
	let reason = ctx.reason();
	let status = meta.status;

	match classifier.classify_token_error(&ctx) {
		TokenErrorKind::InvalidClient => Error::InvalidClient { reason, status },
		TokenErrorKind::Rejected => ConfigError::RequestRejected { reason, status }.into(),
		TokenErrorKind::RateLimited =>
			Error::RateLimited { message: reason, retry_after: meta.retry_after },
		TokenErrorKind::Transient => Error::Server { message: reason, status },
	}
}

fn map_transport_error(err: HttpClientError<TransportError>) -> Error {
	match err {
		HttpClientError::Reqwest(inner) => (*inner).into(),
		HttpClientError::Http(inner) => ConfigError::http_request(inner).into(),
		HttpClientError::Io(inner) => TransportError::io(inner).into(),
		HttpClientError::Other(message) => Error::Server { message: redact::redact(&message), status: None },
		_ => Error::Server { message: "HTTP client failed while calling the token endpoint".into(), status: None },
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::_preludet::*;

	fn fixture() -> (Credentials, ScopeSet, BTreeMap<String, String>, Url) {
		(
			Credentials::new(TEST_CLIENT_ID, TEST_CLIENT_SECRET, "acme")
				.expect("Credential fixture should be valid."),
			ScopeSet::new(["api.read", "api.write"]).expect("Scope fixture should be valid."),
			BTreeMap::from_iter([("audience".to_owned(), "tenant-api".to_owned())]),
			Url::parse("https://login.tenantapi.com/acme/oauth2/token")
				.expect("Token URL fixture should parse."),
		)
	}

	async fn exchange(
		executor: Arc<FnHttpClient>,
		method: ClientAuthMethod,
	) -> Result<Token> {
		let (credentials, scopes, extra, url) = fixture();

		exchange_client_credentials(TokenRequest {
			token_url: &url,
			credentials: &credentials,
			auth_method: method,
			scopes: &scopes,
			extra_params: &extra,
			classifier: &crate::strategy::DefaultTokenErrorClassifier,
			executor,
			timeout: Duration::seconds(5),
		})
		.await
	}

	#[tokio::test]
	async fn basic_auth_request_shape_and_token_mapping() {
		let http = Arc::new(FnHttpClient::new(|_| {
			Ok(json_response(
				200,
				"{\"access_token\":\"at-1\",\"token_type\":\"bearer\",\"expires_in\":3600,\"scope\":\"api.read\"}",
			))
		}));
		let token = exchange(http.clone(), ClientAuthMethod::ClientSecretBasic)
			.await
			.expect("Token exchange should succeed.");
		let calls = http.calls();

		assert_eq!(token.access_token.expose(), "at-1");
		assert_eq!(token.lifetime(), Duration::hours(1));
		assert_eq!(token.scope.normalized(), "api.read");
		assert_eq!(calls.len(), 1);
		assert_eq!(calls[0].method, "POST");
		assert!(calls[0].authorization.as_deref().is_some_and(|value| value.starts_with("Basic ")));
		assert!(calls[0].body.contains("grant_type=client_credentials"));
		assert!(calls[0].body.contains("scope=api.read+api.write"));
		assert!(calls[0].body.contains("audience=tenant-api"));
		assert!(!calls[0].body.contains("client_secret"));
	}

	#[tokio::test]
	async fn post_auth_puts_credentials_in_body() {
		let http = Arc::new(FnHttpClient::new(|_| Ok(json_response(200, token_body("at-2", 60)))));
		let token = exchange(http.clone(), ClientAuthMethod::ClientSecretPost)
			.await
			.expect("Token exchange should succeed.");
		let call = &http.calls()[0];

		assert_eq!(token.scope.normalized(), "api.read api.write");
		assert!(call.authorization.is_none());
		assert!(call.body.contains("client_id=svc-client"));
		assert!(call.body.contains("client_secret="));
	}

	#[tokio::test]
	async fn oauth_errors_map_to_kinds() {
		let cases = [
			(401, "{\"error\":\"invalid_client\"}", ErrorKind::Credentials),
			(400, "{\"error\":\"invalid_scope\"}", ErrorKind::Configuration),
			(503, "{\"error\":\"temporarily_unavailable\"}", ErrorKind::ServerError),
			(429, "{\"error\":\"slow_down\"}", ErrorKind::RateLimit),
			(502, "<html>Bad Gateway</html>", ErrorKind::ServerError),
			(401, "", ErrorKind::Credentials),
		];

		for (status, body, kind) in cases {
			let http = Arc::new(FnHttpClient::new(move |_| Ok(json_response(status, body))));
			let err = exchange(http, ClientAuthMethod::ClientSecretBasic)
				.await
				.expect_err("Error responses must fail the exchange.");

			assert_eq!(err.kind(), kind, "HTTP {status} with {body:?} was misclassified.");
			assert_eq!(err.status(), Some(status));
		}
	}

	#[tokio::test]
	async fn unusable_success_bodies_are_server_errors() {
		for body in [
			"{\"access_token\":\"at\",\"token_type\":\"Bearer\"}",
			"{\"access_token\":\"at\",\"token_type\":\"Bearer\",\"expires_in\":0}",
			"{\"access_token\":\"at\",\"token_type\":\"mac\",\"expires_in\":60}",
			"{\"token_type\":\"Bearer\",\"expires_in\":60}",
		] {
			let http = Arc::new(FnHttpClient::new(move |_| Ok(json_response(200, body))));
			let err = exchange(http, ClientAuthMethod::ClientSecretBasic)
				.await
				.expect_err("Unusable token responses must be rejected.");

			assert_eq!(err.kind(), ErrorKind::ServerError, "Body {body:?} was misclassified.");
		}
	}

	#[tokio::test]
	async fn transport_failures_are_network_errors() {
		let http = Arc::new(FnHttpClient::new(|_| {
			Err(TransportError::io(std::io::Error::other("connection reset")))
		}));
		let err = exchange(http, ClientAuthMethod::ClientSecretBasic)
			.await
			.expect_err("Transport failures must fail the exchange.");

		assert_eq!(err.kind(), ErrorKind::Network);
	}
}

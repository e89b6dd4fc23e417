//! Token client orchestrating endpoint resolution, discovery, acquisition, and caching.
//!
//! [`AuthClient`] owns one set of credentials and one cache entry. A cache miss starts at most one
//! acquisition at a time: concurrent callers join the same shared future, each awaiting it under
//! its own [`CallContext`]. The acquisition is dropped only once every waiter has gone.

mod acquire;
mod context;
mod metrics;
mod transport;

pub use context::*;
pub use metrics::*;
pub use transport::*;

// std
use std::sync::atomic::{AtomicBool, Ordering};
// crates.io
use futures::{
	FutureExt,
	future::{self, BoxFuture, Shared, WeakShared},
};
// self
use crate::{
	_prelude::*,
	auth::{Credentials, ScopeSet, Token},
	cache::TokenCache,
	config::{AuthConfig, ClientAuthMethod},
	discovery::DiscoveryClient,
	endpoint::{EndpointResolver, EndpointSet, Environment},
	error::ConfigError,
	http::HttpExecutor,
	obs::Logger,
	retry::RetryPolicy,
	strategy::TokenErrorClassifier,
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

type Acquisition = BoxFuture<'static, Result<Token>>;

/// Lifecycle state reported by [`AuthClient::state`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ClientState {
	/// Configuration is still being validated; a constructed client never reports this.
	Uninitialized,
	/// Constructed and idle, whether or not a token is cached or the last acquisition failed.
	Ready,
	/// An acquisition is in flight.
	Refreshing,
	/// [`AuthClient::close`] was called; terminal.
	Closed,
}
impl ClientState {
	/// Stable label for logs.
	pub const fn as_str(self) -> &'static str {
		match self {
			ClientState::Uninitialized => "uninitialized",
			ClientState::Ready => "ready",
			ClientState::Refreshing => "refreshing",
			ClientState::Closed => "closed",
		}
	}
}
impl Display for ClientState {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// OAuth 2.0 client-credentials token client.
///
/// Cheap to clone; clones share the cache, the in-flight acquisition, and the lifecycle state.
#[derive(Clone)]
pub struct AuthClient {
	inner: Arc<ClientInner>,
}
impl AuthClient {
	/// Creates a client using its own reqwest transport.
	///
	/// Validates the configuration and resolves the fallback endpoints; performs no network I/O.
	#[cfg(feature = "reqwest")]
	pub fn new(config: AuthConfig) -> Result<Self, ConfigError> {
		Self::with_http_client(config, Arc::new(ReqwestHttpClient::new()?))
	}

	/// Creates a client that sends every request through `http`.
	pub fn with_http_client(
		config: AuthConfig,
		http: Arc<dyn HttpExecutor>,
	) -> Result<Self, ConfigError> {
		let tenant = config.credentials.tenant().as_ref().to_owned();
		let environment = EndpointResolver::environment(&tenant, config.environment);
		let fallback = config
			.resolver
			.resolve(&tenant, Some(environment))?
			.with_overrides(&config.overrides);

		fallback.validate()?;

		let discovery = match (config.discovery_enabled, config.overrides.token.is_some()) {
			(true, false) => Some(
				config
					.discovery
					.unwrap_or_else(|| DiscoveryClient::new(http.clone()).with_timeout(config.timeout)),
			),
			_ => None,
		};

		config.logger.debug(&format!(
			"Configured token client for tenant {tenant} in the {environment} environment."
		));

		Ok(Self {
			inner: Arc::new(ClientInner {
				credentials: RwLock::new(Some(Arc::new(config.credentials))),
				scopes: config.scopes,
				timeout: config.timeout,
				retry: config.retry,
				client_auth: config.client_auth,
				extra_params: config.extra_params,
				logger: config.logger,
				classifier: config.classifier,
				environment,
				fallback,
				resolved: RwLock::new(None),
				discovery,
				executor: http,
				cache: TokenCache::new(config.safety_margin),
				flight: Mutex::new(Flight::default()),
				closed: AtomicBool::new(false),
				metrics: Default::default(),
			}),
		})
	}

	/// Returns a usable access token, acquiring one when the cache misses.
	///
	/// Concurrent misses share a single token request. Cancelling `ctx` or passing its deadline
	/// fails only this call with a network-kind error; the shared acquisition continues for the
	/// remaining waiters.
	pub async fn get_token(&self, ctx: &CallContext) -> Result<Token> {
		self.inner.ensure_open()?;

		if let Some(token) = self.inner.cache.get() {
			self.inner.metrics.record_cache_hit();

			return Ok(token);
		}

		let acquisition = ClientInner::join_flight(&self.inner)?;

		ctx.run(acquisition).await
	}

	/// Authenticated transport over this client's HTTP executor.
	pub fn transport(&self) -> AuthenticatedTransport {
		AuthenticatedTransport::new(self.clone(), self.inner.executor.clone())
	}

	/// Drops the cached token so the next call acquires a fresh one.
	pub fn invalidate(&self) {
		if self.inner.cache.invalidate() {
			self.inner.logger.debug("Cached access token invalidated.");
		}
	}

	/// Closes the client, clearing cached tokens and credential material.
	///
	/// Idempotent. Later calls fail with [`ConfigError::ClientClosed`].
	pub fn close(&self) {
		if self.inner.closed.swap(true, Ordering::SeqCst) {
			return;
		}

		self.inner.cache.clear();
		self.inner.credentials.write().take();
		self.inner.flight.lock().pending = None;
		self.inner.logger.info("Token client closed.");
	}

	/// Current lifecycle state.
	pub fn state(&self) -> ClientState {
		if self.inner.closed.load(Ordering::SeqCst) {
			return ClientState::Closed;
		}
		if self.inner.flight.lock().pending.as_ref().and_then(WeakShared::upgrade).is_some() {
			return ClientState::Refreshing;
		}

		ClientState::Ready
	}

	/// Endpoint set in use, once the first acquisition resolved it.
	pub fn endpoints(&self) -> Option<EndpointSet> {
		self.inner.resolved.read().as_ref().map(|resolved| resolved.endpoints.clone())
	}

	/// Endpoint set derived from the tenant and overrides, used when discovery is unavailable.
	pub fn fallback_endpoints(&self) -> &EndpointSet {
		&self.inner.fallback
	}

	/// Environment this client targets.
	pub fn environment(&self) -> Environment {
		self.inner.environment
	}

	/// Returns `true` for every non-production environment.
	pub fn is_test_environment(&self) -> bool {
		self.inner.environment.is_test()
	}

	/// Cache used by this client.
	pub fn cache(&self) -> &TokenCache {
		&self.inner.cache
	}

	/// Acquisition counters.
	pub fn metrics(&self) -> &AcquisitionMetrics {
		&self.inner.metrics
	}
}
impl Debug for AuthClient {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthClient")
			.field("environment", &self.inner.environment)
			.field("state", &self.state())
			.field("fallback", &self.inner.fallback)
			.field("cache", &self.inner.cache)
			.finish_non_exhaustive()
	}
}

#[derive(Clone, Debug)]
struct ResolvedEndpoints {
	endpoints: EndpointSet,
	auth_method: ClientAuthMethod,
}

#[derive(Default)]
struct Flight {
	generation: u64,
	pending: Option<WeakShared<Acquisition>>,
}

struct ClientInner {
	credentials: RwLock<Option<Arc<Credentials>>>,
	scopes: ScopeSet,
	timeout: Duration,
	retry: RetryPolicy,
	client_auth: Option<ClientAuthMethod>,
	extra_params: BTreeMap<String, String>,
	logger: Logger,
	classifier: Arc<dyn TokenErrorClassifier>,
	environment: Environment,
	fallback: EndpointSet,
	resolved: RwLock<Option<ResolvedEndpoints>>,
	discovery: Option<DiscoveryClient>,
	executor: Arc<dyn HttpExecutor>,
	cache: TokenCache,
	flight: Mutex<Flight>,
	closed: AtomicBool,
	metrics: AcquisitionMetrics,
}
impl ClientInner {
	fn ensure_open(&self) -> Result<(), ConfigError> {
		if self.closed.load(Ordering::SeqCst) { Err(ConfigError::ClientClosed) } else { Ok(()) }
	}

	fn credentials(&self) -> Result<Arc<Credentials>, ConfigError> {
		self.credentials.read().clone().ok_or(ConfigError::ClientClosed)
	}

	/// Joins the running acquisition or starts a new one.
	fn join_flight(this: &Arc<Self>) -> Result<Shared<Acquisition>, ConfigError> {
		let mut flight = this.flight.lock();

		this.ensure_open()?;

		if let Some(running) = flight.pending.as_ref().and_then(WeakShared::upgrade) {
			this.metrics.record_coalesced();

			return Ok(running);
		}
		// A flight may have finished between the caller's cache check and this lock.
		if let Some(token) = this.cache.get() {
			this.metrics.record_cache_hit();

			return Ok(future::ready(Ok(token)).boxed().shared());
		}

		flight.generation = flight.generation.wrapping_add(1);

		let generation = flight.generation;
		let inner = this.clone();
		let acquisition = async move { inner.acquire(generation).await }.boxed().shared();

		flight.pending = acquisition.downgrade();

		Ok(acquisition)
	}

	fn finish_flight(&self, generation: u64) {
		let mut flight = self.flight.lock();

		if flight.generation == generation {
			flight.pending = None;
		}
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::AtomicUsize;
	// self
	use super::*;
	use crate::{_preludet::*, config::AuthConfigBuilder};

	fn client_with(
		http: Arc<FnHttpClient>,
		configure: impl FnOnce(AuthConfigBuilder) -> AuthConfigBuilder,
	) -> AuthClient {
		let config = configure(test_config("acme").disable_discovery())
			.build()
			.expect("Client configuration should build.");

		AuthClient::with_http_client(config, http).expect("Client should construct.")
	}

	fn same(builder: AuthConfigBuilder) -> AuthConfigBuilder {
		builder
	}

	#[tokio::test]
	async fn concurrent_misses_share_one_request() {
		let http = Arc::new(
			FnHttpClient::new(|_| Ok(json_response(200, token_body("shared", 3600))))
				.with_delay(std::time::Duration::from_millis(50)),
		);
		let client = client_with(http.clone(), same);
		let tasks = (0..16)
			.map(|_| {
				let client = client.clone();

				tokio::spawn(async move { client.get_token(&CallContext::new()).await })
			})
			.collect::<Vec<_>>();

		for task in tasks {
			let token = task
				.await
				.expect("Token task should not panic.")
				.expect("Every waiter should receive the token.");

			assert_eq!(token.access_token.expose(), "shared");
		}

		assert_eq!(http.total_calls(), 1);
		assert_eq!(client.metrics().attempts(), 1);
		assert_eq!(client.state(), ClientState::Ready);
	}

	#[tokio::test]
	async fn cancelled_waiter_does_not_abort_the_shared_acquisition() {
		let http = Arc::new(
			FnHttpClient::new(|_| Ok(json_response(200, token_body("survivor", 3600))))
				.with_delay(std::time::Duration::from_millis(100)),
		);
		let client = client_with(http.clone(), same);
		let cancelled = CallContext::new();
		let patient = CallContext::new();
		let (first, second) = tokio::join!(client.get_token(&cancelled), async {
			tokio::time::sleep(std::time::Duration::from_millis(20)).await;
			cancelled.cancel();

			client.get_token(&patient).await
		});
		let err = first.expect_err("Cancelled waiter should fail.");

		assert_eq!(err.kind(), ErrorKind::Network);
		assert_eq!(
			second.expect("Remaining waiter should receive the token.").access_token.expose(),
			"survivor"
		);
		assert_eq!(http.total_calls(), 1);
	}

	#[tokio::test]
	async fn deadline_expiry_is_a_network_error() {
		let http = Arc::new(
			FnHttpClient::new(|_| Ok(json_response(200, token_body("late", 3600))))
				.with_delay(std::time::Duration::from_millis(200)),
		);
		let client = client_with(http, same);
		let err = client
			.get_token(&CallContext::with_timeout(Duration::milliseconds(20)))
			.await
			.expect_err("Deadline should elapse before the token arrives.");

		assert!(matches!(err, Error::Transport(crate::error::TransportError::DeadlineExceeded)));
		assert_eq!(err.kind(), ErrorKind::Network);
	}

	#[tokio::test]
	async fn hits_skip_the_network_until_invalidated() {
		let counter = Arc::new(AtomicUsize::new(0));
		let issued = counter.clone();
		let http = Arc::new(FnHttpClient::new(move |_| {
			let n = issued.fetch_add(1, Ordering::SeqCst);

			Ok(json_response(200, token_body(&format!("at-{n}"), 3600)))
		}));
		let client = client_with(http.clone(), same);
		let ctx = CallContext::new();

		assert_eq!(client.state(), ClientState::Ready);

		let first = client.get_token(&ctx).await.expect("First acquisition should succeed.");
		let second = client.get_token(&ctx).await.expect("Cache hit should succeed.");

		assert!(first.same_secret(&second));
		assert_eq!(http.total_calls(), 1);
		assert_eq!(client.metrics().cache_hits(), 1);

		client.invalidate();

		let third = client.get_token(&ctx).await.expect("Reacquisition should succeed.");

		assert_eq!(third.access_token.expose(), "at-1");
		assert_eq!(http.total_calls(), 2);
	}

	#[tokio::test]
	async fn state_returns_to_ready_after_a_failed_acquisition() {
		let http = Arc::new(
			FnHttpClient::new(|_| Ok(json_response(500, "{\"error\":\"server_error\"}")))
				.with_delay(std::time::Duration::from_millis(50)),
		);
		let client = client_with(http.clone(), |builder| builder.max_attempts(1));

		assert_eq!(client.state(), ClientState::Ready);

		let ctx = CallContext::new();
		let (result, during) = tokio::join!(client.get_token(&ctx), async {
			tokio::time::sleep(std::time::Duration::from_millis(10)).await;

			client.state()
		});
		let err = result.expect_err("A server error with one attempt should fail.");

		assert_eq!(during, ClientState::Refreshing);
		assert_eq!(err.kind(), ErrorKind::ServerError);
		assert_eq!(client.state(), ClientState::Ready);
		assert!(client.cache().snapshot().is_none());
		assert_eq!(http.total_calls(), 1);
	}

	#[tokio::test]
	async fn close_is_idempotent_and_terminal() {
		let http = Arc::new(FnHttpClient::new(|_| Ok(json_response(200, token_body("at", 3600)))));
		let client = client_with(http, same);

		client.get_token(&CallContext::new()).await.expect("Acquisition should succeed.");
		client.close();
		client.close();

		assert_eq!(client.state(), ClientState::Closed);
		assert!(client.cache().snapshot().is_none());

		let err = client
			.get_token(&CallContext::new())
			.await
			.expect_err("Closed clients must refuse new calls.");

		assert!(matches!(err, Error::Config(ConfigError::ClientClosed)));
		assert_eq!(err.kind(), ErrorKind::Configuration);
	}

	#[tokio::test]
	async fn environment_follows_tenant_or_hint() {
		let http = Arc::new(FnHttpClient::new(|_| Ok(json_response(500, ""))));
		let tested = AuthClient::with_http_client(
			test_config("acme-test").build().expect("Configuration should build."),
			http.clone(),
		)
		.expect("Client should construct.");
		let hinted = client_with(http.clone(), |builder| builder.environment(Environment::Staging));

		let production = client_with(http.clone(), same);

		assert!(tested.is_test_environment());
		assert_eq!(hinted.environment(), Environment::Staging);
		assert!(hinted.is_test_environment());
		assert_eq!(production.environment(), Environment::Production);
		assert!(!production.is_test_environment());
		assert_eq!(
			hinted.fallback_endpoints().token.as_str(),
			"https://login.staging.tenantapi.com/acme/oauth2/token"
		);
		assert!(hinted.endpoints().is_none());
		assert_eq!(http.total_calls(), 0);
	}
}

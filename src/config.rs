//! Client configuration and its validating builder.

// self
use crate::{
	_prelude::*,
	auth::{Credentials, ScopeSet},
	cache::TokenCache,
	discovery::DiscoveryClient,
	endpoint::{self, EndpointOverrides, EndpointResolver, Environment},
	error::ConfigError,
	obs::{LogSink, Logger},
	retry::RetryPolicy,
	strategy::{DefaultTokenErrorClassifier, TokenErrorClassifier},
};

const RESERVED_PARAMS: [&str; 4] = ["grant_type", "scope", "client_id", "client_secret"];

/// How the client authenticates at the token endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
	/// HTTP Basic authentication header.
	#[default]
	ClientSecretBasic,
	/// `client_id` and `client_secret` form fields.
	ClientSecretPost,
}
impl ClientAuthMethod {
	/// Returns the registered OAuth method name.
	pub const fn as_str(self) -> &'static str {
		match self {
			ClientAuthMethod::ClientSecretBasic => "client_secret_basic",
			ClientAuthMethod::ClientSecretPost => "client_secret_post",
		}
	}
}
impl Display for ClientAuthMethod {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Validated configuration consumed by [`AuthClient`](crate::client::AuthClient).
#[derive(Clone)]
pub struct AuthConfig {
	pub(crate) credentials: Credentials,
	pub(crate) environment: Option<Environment>,
	pub(crate) overrides: EndpointOverrides,
	pub(crate) scopes: ScopeSet,
	pub(crate) timeout: Duration,
	pub(crate) retry: RetryPolicy,
	pub(crate) discovery_enabled: bool,
	pub(crate) client_auth: Option<ClientAuthMethod>,
	pub(crate) safety_margin: Duration,
	pub(crate) extra_params: BTreeMap<String, String>,
	pub(crate) logger: Logger,
	pub(crate) resolver: EndpointResolver,
	pub(crate) discovery: Option<DiscoveryClient>,
	pub(crate) classifier: Arc<dyn TokenErrorClassifier>,
}
impl AuthConfig {
	/// Default timeout applied to every network call.
	pub const DEFAULT_TIMEOUT: Duration = Duration::seconds(30);

	/// Starts a builder from the three required credential values.
	pub fn builder(
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
		tenant_id: impl Into<String>,
	) -> AuthConfigBuilder {
		AuthConfigBuilder::new(client_id.into(), client_secret.into(), tenant_id.into())
	}

	/// Validated credentials.
	pub fn credentials(&self) -> &Credentials {
		&self.credentials
	}

	/// Explicit environment hint, if any.
	pub fn environment(&self) -> Option<Environment> {
		self.environment
	}

	/// Explicit endpoint overrides.
	pub fn overrides(&self) -> &EndpointOverrides {
		&self.overrides
	}

	/// Requested scopes.
	pub fn scopes(&self) -> &ScopeSet {
		&self.scopes
	}

	/// Per-request network timeout.
	pub fn timeout(&self) -> Duration {
		self.timeout
	}

	/// Retry policy for token acquisition.
	pub fn retry_policy(&self) -> RetryPolicy {
		self.retry
	}

	/// Whether discovery runs before the first acquisition.
	pub fn discovery_enabled(&self) -> bool {
		self.discovery_enabled
	}

	/// Explicit client authentication method, if configured.
	pub fn client_auth(&self) -> Option<ClientAuthMethod> {
		self.client_auth
	}

	/// Margin subtracted from token expiry.
	pub fn safety_margin(&self) -> Duration {
		self.safety_margin
	}

	/// Extra form parameters sent with every token request.
	pub fn extra_params(&self) -> &BTreeMap<String, String> {
		&self.extra_params
	}
}
impl Debug for AuthConfig {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthConfig")
			.field("credentials", &self.credentials)
			.field("environment", &self.environment)
			.field("overrides", &self.overrides)
			.field("scopes", &self.scopes)
			.field("timeout", &self.timeout)
			.field("retry", &self.retry)
			.field("discovery_enabled", &self.discovery_enabled)
			.field("client_auth", &self.client_auth)
			.field("safety_margin", &self.safety_margin)
			.field("extra_params", &self.extra_params.keys().collect::<Vec<_>>())
			.finish_non_exhaustive()
	}
}

/// Builder for [`AuthConfig`]; every value is validated in [`build`](Self::build).
#[derive(Clone)]
pub struct AuthConfigBuilder {
	client_id: String,
	client_secret: String,
	tenant_id: String,
	environment: Option<String>,
	authorization_url: Option<String>,
	token_url: Option<String>,
	api_url: Option<String>,
	scopes: Vec<String>,
	timeout: Duration,
	retry: RetryPolicy,
	discovery_enabled: bool,
	client_auth: Option<ClientAuthMethod>,
	safety_margin: Duration,
	extra_params: BTreeMap<String, String>,
	logger: Option<Arc<dyn LogSink>>,
	resolver: Option<EndpointResolver>,
	discovery: Option<DiscoveryClient>,
	classifier: Option<Arc<dyn TokenErrorClassifier>>,
}
impl AuthConfigBuilder {
	fn new(client_id: String, client_secret: String, tenant_id: String) -> Self {
		Self {
			client_id,
			client_secret,
			tenant_id,
			environment: None,
			authorization_url: None,
			token_url: None,
			api_url: None,
			scopes: Vec::new(),
			timeout: AuthConfig::DEFAULT_TIMEOUT,
			retry: RetryPolicy::default(),
			discovery_enabled: true,
			client_auth: None,
			safety_margin: TokenCache::DEFAULT_SAFETY_MARGIN,
			extra_params: BTreeMap::new(),
			logger: None,
			resolver: None,
			discovery: None,
			classifier: None,
		}
	}

	/// Pins the environment instead of inferring it from the tenant id.
	pub fn environment(mut self, environment: Environment) -> Self {
		self.environment = Some(environment.as_str().into());

		self
	}

	/// Environment hint as free text (`prod`, `staging`, `dev`, `test`, ...), parsed on build.
	pub fn environment_hint(mut self, hint: impl Into<String>) -> Self {
		self.environment = Some(hint.into());

		self
	}

	/// Overrides the authorization base URL.
	pub fn authorization_url(mut self, url: impl Into<String>) -> Self {
		self.authorization_url = Some(url.into());

		self
	}

	/// Overrides the token endpoint; discovery is skipped when set.
	pub fn token_url(mut self, url: impl Into<String>) -> Self {
		self.token_url = Some(url.into());

		self
	}

	/// Overrides the API base URL.
	pub fn api_url(mut self, url: impl Into<String>) -> Self {
		self.api_url = Some(url.into());

		self
	}

	/// Adds one requested scope.
	pub fn scope(mut self, scope: impl Into<String>) -> Self {
		self.scopes.push(scope.into());

		self
	}

	/// Adds several requested scopes.
	pub fn scopes<I, S>(mut self, scopes: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.scopes.extend(scopes.into_iter().map(Into::into));

		self
	}

	/// Per-request network timeout.
	pub fn timeout(mut self, timeout: Duration) -> Self {
		self.timeout = timeout;

		self
	}

	/// Attempt budget for token acquisition.
	pub fn max_attempts(mut self, max_attempts: u32) -> Self {
		self.retry.max_attempts = max_attempts;

		self
	}

	/// Replaces the whole retry policy.
	pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
		self.retry = retry;

		self
	}

	/// Skips discovery and uses resolved or overridden endpoints directly.
	pub fn disable_discovery(mut self) -> Self {
		self.discovery_enabled = false;

		self
	}

	/// Pins the token-endpoint authentication method.
	pub fn client_auth(mut self, method: ClientAuthMethod) -> Self {
		self.client_auth = Some(method);

		self
	}

	/// Margin subtracted from token expiry before a refresh is forced.
	pub fn safety_margin(mut self, margin: Duration) -> Self {
		self.safety_margin = margin;

		self
	}

	/// Adds a form parameter (e.g. `audience`) to every token request.
	pub fn extra_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.extra_params.insert(name.into(), value.into());

		self
	}

	/// Routes this client's log records to `sink` instead of the process-wide default.
	pub fn logger(mut self, sink: Arc<dyn LogSink>) -> Self {
		self.logger = Some(sink);

		self
	}

	/// Uses a custom endpoint resolver.
	pub fn resolver(mut self, resolver: EndpointResolver) -> Self {
		self.resolver = Some(resolver);

		self
	}

	/// Shares a discovery client (and its cache) with other clients.
	pub fn discovery_client(mut self, discovery: DiscoveryClient) -> Self {
		self.discovery = Some(discovery);

		self
	}

	/// Uses a custom token-error classifier.
	pub fn classifier(mut self, classifier: Arc<dyn TokenErrorClassifier>) -> Self {
		self.classifier = Some(classifier);

		self
	}

	/// Validates every value and produces an [`AuthConfig`].
	pub fn build(self) -> Result<AuthConfig, ConfigError> {
		let credentials = Credentials::new(&self.client_id, self.client_secret, &self.tenant_id)?;
		let environment = self.environment.as_deref().map(str::parse::<Environment>).transpose()?;
		let overrides = EndpointOverrides {
			authorization: parse_override("authorization", self.authorization_url.as_deref())?,
			token: parse_override("token", self.token_url.as_deref())?,
			api: parse_override("api", self.api_url.as_deref())?,
		};
		let scopes = ScopeSet::new(self.scopes)?;

		if !self.timeout.is_positive() {
			return Err(ConfigError::InvalidTimeout);
		}

		self.retry.validate()?;

		if self.safety_margin.is_negative() {
			return Err(ConfigError::InvalidSafetyMargin);
		}
		if let Some(name) = self
			.extra_params
			.keys()
			.find(|name| RESERVED_PARAMS.iter().any(|reserved| name.eq_ignore_ascii_case(reserved)))
		{
			return Err(ConfigError::ReservedParameter { name: name.clone() });
		}

		Ok(AuthConfig {
			credentials,
			environment,
			overrides,
			scopes,
			timeout: self.timeout,
			retry: self.retry,
			discovery_enabled: self.discovery_enabled,
			client_auth: self.client_auth,
			safety_margin: self.safety_margin,
			extra_params: self.extra_params,
			logger: self.logger.map(Logger::new).unwrap_or_default(),
			resolver: self.resolver.unwrap_or_default(),
			discovery: self.discovery,
			classifier: self.classifier.unwrap_or_else(|| Arc::new(DefaultTokenErrorClassifier)),
		})
	}
}

fn parse_override(field: &'static str, raw: Option<&str>) -> Result<Option<Url>, ConfigError> {
	let Some(raw) = raw else {
		return Ok(None);
	};
	let url = Url::parse(raw.trim()).map_err(|source| ConfigError::InvalidUrl { field, source })?;

	endpoint::ensure_secure(field, &url)?;

	Ok(Some(url))
}

//! Environments, endpoint sets, and endpoint URL validation.

pub mod resolver;

pub use resolver::*;

// crates.io
use url::Host;
// self
use crate::{_prelude::*, error::ConfigError, redact};

/// Deployment environment an endpoint set belongs to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
	/// Live production service.
	#[default]
	#[serde(alias = "prod")]
	Production,
	/// Pre-production staging service.
	#[serde(alias = "stage")]
	Staging,
	/// Shared development service.
	#[serde(alias = "dev")]
	Development,
	/// Disposable test service.
	Test,
}
impl Environment {
	/// Every environment, production first.
	pub const ALL: [Environment; 4] =
		[Environment::Production, Environment::Staging, Environment::Development, Environment::Test];

	/// Returns a stable label.
	pub const fn as_str(self) -> &'static str {
		match self {
			Environment::Production => "production",
			Environment::Staging => "staging",
			Environment::Development => "development",
			Environment::Test => "test",
		}
	}

	/// Host label inserted into the default endpoint templates; `None` for production.
	pub const fn host_label(self) -> Option<&'static str> {
		match self {
			Environment::Production => None,
			Environment::Staging => Some("staging"),
			Environment::Development => Some("dev"),
			Environment::Test => Some("test"),
		}
	}

	/// Returns `true` for every non-production environment.
	pub const fn is_test(self) -> bool {
		!matches!(self, Environment::Production)
	}
}
impl Display for Environment {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for Environment {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"production" | "prod" => Ok(Environment::Production),
			"staging" | "stage" => Ok(Environment::Staging),
			"development" | "dev" => Ok(Environment::Development),
			"test" => Ok(Environment::Test),
			_ => Err(ConfigError::UnknownEnvironment { value: s.to_owned() }),
		}
	}
}

/// Authorization base, token endpoint, and API base for one tenant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointSet {
	/// Tenant-scoped authorization base; discovery documents live beneath it.
	pub authorization: Url,
	/// Token endpoint receiving client-credentials requests.
	pub token: Url,
	/// Base URL of the tenant API.
	pub api: Url,
}
impl EndpointSet {
	/// Replaces the fields that carry an explicit override.
	pub fn with_overrides(mut self, overrides: &EndpointOverrides) -> Self {
		if let Some(url) = &overrides.authorization {
			self.authorization = url.clone();
		}
		if let Some(url) = &overrides.token {
			self.token = url.clone();
		}
		if let Some(url) = &overrides.api {
			self.api = url.clone();
		}

		self
	}

	/// Checks every field with [`ensure_secure`].
	pub fn validate(&self) -> Result<(), ConfigError> {
		ensure_secure("authorization", &self.authorization)?;
		ensure_secure("token", &self.token)?;
		ensure_secure("api", &self.api)
	}
}

/// Explicitly configured endpoint URLs.
///
/// An overridden token endpoint disables discovery because discovery only contributes the
/// token endpoint and its authentication methods.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EndpointOverrides {
	/// Authorization base override.
	pub authorization: Option<Url>,
	/// Token endpoint override.
	pub token: Option<Url>,
	/// API base override.
	pub api: Option<Url>,
}

/// Rejects URLs that are neither HTTPS nor plain HTTP on a loopback host.
pub fn ensure_secure(endpoint: &'static str, url: &Url) -> Result<(), ConfigError> {
	let secure = match url.scheme() {
		"https" => true,
		"http" => is_loopback(url),
		_ => false,
	};

	if secure {
		Ok(())
	} else {
		Err(ConfigError::InsecureEndpoint { endpoint, url: redact::redact(url.as_str()) })
	}
}

fn is_loopback(url: &Url) -> bool {
	match url.host() {
		Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
		Some(Host::Ipv4(ip)) => ip.is_loopback(),
		Some(Host::Ipv6(ip)) => ip.is_loopback(),
		None => false,
	}
}

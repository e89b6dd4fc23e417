//! Tenant and environment based endpoint derivation.

// self
use crate::{
	_prelude::*,
	endpoint::{EndpointSet, Environment},
	error::ConfigError,
	redact,
};

const TOKEN_PATH: [&str; 2] = ["oauth2", "token"];
// Matching order matters: "test" wins over "dev" wins over "staging".
const TENANT_PATTERNS: [(&str, Environment); 3] = [
	("test", Environment::Test),
	("dev", Environment::Development),
	("staging", Environment::Staging),
];

/// Base URL templates for one environment.
///
/// The tenant id is appended to `authorization_base` as a path segment; the API base is used as
/// is.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentEndpoints {
	/// Authorization server base, without the tenant segment.
	pub authorization_base: String,
	/// Tenant API base.
	pub api_base: String,
}
impl EnvironmentEndpoints {
	/// Templates for `env` on the public `tenantapi.com` deployment.
	pub fn tenantapi(env: Environment) -> Self {
		match env.host_label() {
			None => Self {
				authorization_base: "https://login.tenantapi.com".into(),
				api_base: "https://api.tenantapi.com".into(),
			},
			Some(label) => Self {
				authorization_base: format!("https://login.{label}.tenantapi.com"),
				api_base: format!("https://api.{label}.tenantapi.com"),
			},
		}
	}
}

/// Pure mapping from tenant id and environment hint to an [`EndpointSet`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EndpointResolver {
	templates: HashMap<Environment, EnvironmentEndpoints>,
}
impl EndpointResolver {
	/// Replaces the templates used for `env`.
	pub fn with_templates(mut self, env: Environment, templates: EnvironmentEndpoints) -> Self {
		self.templates.insert(env, templates);

		self
	}

	/// Templates currently configured for `env`.
	pub fn templates(&self, env: Environment) -> EnvironmentEndpoints {
		self.templates.get(&env).cloned().unwrap_or_else(|| EnvironmentEndpoints::tenantapi(env))
	}

	/// Infers the environment from substrings of the tenant id; unknown tenants are production.
	pub fn detect_environment(tenant: &str) -> Environment {
		let folded = tenant.to_ascii_lowercase();

		TENANT_PATTERNS
			.iter()
			.find(|(needle, _)| folded.contains(needle))
			.map_or(Environment::Production, |(_, env)| *env)
	}

	/// Environment used for `tenant`, honoring an explicit hint first.
	pub fn environment(tenant: &str, hint: Option<Environment>) -> Environment {
		hint.unwrap_or_else(|| Self::detect_environment(tenant))
	}

	/// Derives the endpoint set for `tenant`.
	///
	/// Performs no I/O. Fails with a configuration error when the tenant is blank or a template
	/// produces an unusable URL.
	pub fn resolve(
		&self,
		tenant: &str,
		hint: Option<Environment>,
	) -> Result<EndpointSet, ConfigError> {
		let tenant = tenant.trim();

		if tenant.is_empty() {
			return Err(ConfigError::MissingField { field: "tenant_id" });
		}

		let env = Self::environment(tenant, hint);
		let templates = self.templates(env);
		let authorization =
			append_segments(parse("authorization_base", &templates.authorization_base)?, [tenant])?;
		let token = append_segments(authorization.clone(), TOKEN_PATH)?;
		let api = parse("api_base", &templates.api_base)?;
		let endpoints = EndpointSet { authorization, token, api };

		endpoints.validate()?;

		Ok(endpoints)
	}
}
impl Default for EndpointResolver {
	fn default() -> Self {
		Self {
			templates: Environment::ALL
				.into_iter()
				.map(|env| (env, EnvironmentEndpoints::tenantapi(env)))
				.collect(),
		}
	}
}

/// Appends path segments to `url`, dropping a trailing empty segment first.
pub(crate) fn append_segments<'a>(
	mut url: Url,
	segments: impl IntoIterator<Item = &'a str>,
) -> Result<Url, ConfigError> {
	let display = redact::redact(url.as_str());

	url.path_segments_mut()
		.map_err(|_| ConfigError::CannotBeBase { field: "endpoint", url: display })?
		.pop_if_empty()
		.extend(segments);

	Ok(url)
}

fn parse(field: &'static str, raw: &str) -> Result<Url, ConfigError> {
	Url::parse(raw).map_err(|source| ConfigError::InvalidUrl { field, source })
}

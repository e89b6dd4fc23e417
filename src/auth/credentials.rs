//! Client credentials owned by an [`AuthClient`](crate::client::AuthClient).

// crates.io
use secrecy::{ExposeSecret, SecretString};
// self
use crate::{
	_prelude::*,
	auth::{ClientId, TenantId},
	error::ConfigError,
};

/// Client id, client secret, and tenant id for one client instance.
///
/// The secret lives in a [`SecretString`], so it is zeroized when the value is dropped and is
/// never rendered by `Debug`.
#[derive(Clone)]
pub struct Credentials {
	client_id: ClientId,
	client_secret: SecretString,
	tenant: TenantId,
}
impl Credentials {
	/// Validates and bundles the three credential values.
	///
	/// Blank inputs produce [`ConfigError::MissingField`] naming the field.
	pub fn new(
		client_id: impl AsRef<str>,
		client_secret: impl Into<String>,
		tenant_id: impl AsRef<str>,
	) -> Result<Self, ConfigError> {
		let client_id = client_id.as_ref().trim();
		let client_secret = client_secret.into();
		let tenant_id = tenant_id.as_ref().trim();

		if client_id.is_empty() {
			return Err(ConfigError::MissingField { field: "client_id" });
		}
		if client_secret.trim().is_empty() {
			return Err(ConfigError::MissingField { field: "client_secret" });
		}
		if tenant_id.is_empty() {
			return Err(ConfigError::MissingField { field: "tenant_id" });
		}

		Ok(Self {
			client_id: ClientId::new(client_id)?,
			client_secret: SecretString::new(client_secret),
			tenant: TenantId::new(tenant_id)?,
		})
	}

	/// OAuth client identifier.
	pub fn client_id(&self) -> &ClientId {
		&self.client_id
	}

	/// Tenant identifier.
	pub fn tenant(&self) -> &TenantId {
		&self.tenant
	}

	/// Exposes the client secret for the token request. Never log the returned value.
	pub fn expose_secret(&self) -> &str {
		self.client_secret.expose_secret()
	}
}
impl Debug for Credentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credentials")
			.field("client_id", &self.client_id)
			.field("client_secret", &"<redacted>")
			.field("tenant", &self.tenant)
			.finish()
	}
}

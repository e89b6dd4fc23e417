//! Validated identifiers for tenants and OAuth clients.
//!
//! Tenant ids end up as URL path segments, so they are restricted to an unreserved ASCII subset.
//! Client ids are opaque to this crate and only need to be printable.

// std
use std::{hash::Hash, marker::PhantomData, ops::Deref};
// crates.io
use serde::{Deserializer, Serializer, de::Error as _};
// self
use crate::_prelude::*;

/// Validation rules for one identifier family.
pub trait IdKind
where
	Self: 'static + Send + Sync,
{
	/// Human readable family name used in errors.
	const NAME: &'static str;
	/// Maximum length in characters.
	const MAX_LEN: usize;

	/// Whether `c` may appear in the identifier.
	fn allows(c: char) -> bool;

	/// Whether the whole value is reserved even though every character is allowed.
	fn reserves(_value: &str) -> bool {
		false
	}
}

/// Marker for tenant identifiers.
#[derive(Debug)]
pub enum Tenant {}
impl IdKind for Tenant {
	const MAX_LEN: usize = 64;
	const NAME: &'static str = "Tenant";

	fn allows(c: char) -> bool {
		c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')
	}

	// URL path handling collapses dot segments, which would drop the tenant from endpoints.
	fn reserves(value: &str) -> bool {
		matches!(value, "." | "..")
	}
}

/// Marker for OAuth client identifiers.
#[derive(Debug)]
pub enum Client {}
impl IdKind for Client {
	const MAX_LEN: usize = 256;
	const NAME: &'static str = "Client";

	fn allows(c: char) -> bool {
		!c.is_whitespace() && !c.is_control()
	}
}

/// Tenant identifier that selects the authorization base and environment.
pub type TenantId = Id<Tenant>;
/// OAuth client identifier issued by the authorization server.
pub type ClientId = Id<Client>;

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Identifier family.
		kind: &'static str,
	},
	/// The identifier contains a character its family does not allow.
	#[error("{kind} identifier contains the disallowed character {character:?}.")]
	InvalidCharacter {
		/// Identifier family.
		kind: &'static str,
		/// First offending character.
		character: char,
	},
	/// The identifier is a reserved value such as a dot path segment.
	#[error("{kind} identifier {value:?} is reserved.")]
	Reserved {
		/// Identifier family.
		kind: &'static str,
		/// Rejected value.
		value: String,
	},
	/// The identifier exceeded the allowed character count.
	#[error("{kind} identifier exceeds {max} characters.")]
	TooLong {
		/// Identifier family.
		kind: &'static str,
		/// Maximum permitted character count.
		max: usize,
	},
}

/// Identifier validated against the rules of `K`.
pub struct Id<K> {
	value: String,
	kind: PhantomData<K>,
}
impl<K> Id<K>
where
	K: IdKind,
{
	/// Validates `value` and wraps it.
	pub fn new(value: impl Into<String>) -> Result<Self, IdentifierError> {
		let value = value.into();

		if value.is_empty() {
			return Err(IdentifierError::Empty { kind: K::NAME });
		}
		if let Some(character) = value.chars().find(|c| !K::allows(*c)) {
			return Err(IdentifierError::InvalidCharacter { kind: K::NAME, character });
		}
		if K::reserves(&value) {
			return Err(IdentifierError::Reserved { kind: K::NAME, value });
		}
		if value.chars().count() > K::MAX_LEN {
			return Err(IdentifierError::TooLong { kind: K::NAME, max: K::MAX_LEN });
		}

		Ok(Self { value, kind: PhantomData })
	}

	/// Consumes the identifier, returning the raw string.
	pub fn into_inner(self) -> String {
		self.value
	}
}
impl<K> Clone for Id<K> {
	fn clone(&self) -> Self {
		Self { value: self.value.clone(), kind: PhantomData }
	}
}
impl<K> PartialEq for Id<K> {
	fn eq(&self, other: &Self) -> bool {
		self.value == other.value
	}
}
impl<K> Eq for Id<K> {}
impl<K> Hash for Id<K> {
	fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
		self.value.hash(state);
	}
}
impl<K> Deref for Id<K> {
	type Target = str;

	fn deref(&self) -> &Self::Target {
		&self.value
	}
}
impl<K> AsRef<str> for Id<K> {
	fn as_ref(&self) -> &str {
		&self.value
	}
}
impl<K> Debug for Id<K>
where
	K: IdKind,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{}({})", K::NAME, self.value)
	}
}
impl<K> Display for Id<K> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.value)
	}
}
impl<K> FromStr for Id<K>
where
	K: IdKind,
{
	type Err = IdentifierError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}
impl<K> Serialize for Id<K> {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(&self.value)
	}
}
impl<'de, K> Deserialize<'de> for Id<K>
where
	K: IdKind,
{
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		Self::new(String::deserialize(deserializer)?).map_err(D::Error::custom)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn tenants_are_path_safe() {
		let tenant = TenantId::new("acme-staging_01.eu").expect("Path-safe tenant should be valid.");

		assert_eq!(tenant.as_ref(), "acme-staging_01.eu");
		assert_eq!(format!("{tenant:?}"), "Tenant(acme-staging_01.eu)");
		assert_eq!(
			TenantId::new("acme/other"),
			Err(IdentifierError::InvalidCharacter { kind: "Tenant", character: '/' })
		);
		assert!(TenantId::new(" acme").is_err());
		assert!(TenantId::new("").is_err());
	}

	#[test]
	fn dot_segment_tenants_are_reserved() {
		assert_eq!(
			TenantId::new(".."),
			Err(IdentifierError::Reserved { kind: "Tenant", value: "..".into() })
		);
		assert!(TenantId::new(".").is_err());
		assert!(serde_json::from_str::<TenantId>("\"..\"").is_err());
		TenantId::new("...").expect("Three dots are not a dot segment.");
		TenantId::new(".acme").expect("Leading dots are allowed.");
		ClientId::new("..").expect("Client ids are not path segments.");
	}

	#[test]
	fn client_ids_only_reject_blank_and_control_characters() {
		ClientId::new("svc:reporting@acme").expect("Opaque client id should be valid.");

		assert!(ClientId::new("with space").is_err());
		assert!(ClientId::new("tab\tid").is_err());
	}

	#[test]
	fn length_limits_are_per_family() {
		TenantId::new("t".repeat(Tenant::MAX_LEN)).expect("Exact tenant length should succeed.");
		ClientId::new("c".repeat(Tenant::MAX_LEN + 1)).expect("Client ids allow longer values.");

		assert_eq!(
			TenantId::new("t".repeat(Tenant::MAX_LEN + 1)),
			Err(IdentifierError::TooLong { kind: "Tenant", max: 64 })
		);
	}

	#[test]
	fn serde_enforces_validation() {
		let tenant: TenantId =
			serde_json::from_str("\"tenant-42\"").expect("Tenant should deserialize.");

		assert_eq!(serde_json::to_string(&tenant).expect("Tenant should serialize."), "\"tenant-42\"");
		assert!(serde_json::from_str::<TenantId>("\"with space\"").is_err());
	}
}

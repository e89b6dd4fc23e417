//! Credential scrubbing for log lines and error messages.
//!
//! One combined pattern covers `key=value` / JSON secrets, `Authorization` headers, bare bearer
//! tokens, and URL userinfo passwords. Quoted values are masked up to their closing quote, so
//! separators inside a quoted secret never end the match early. A single pass means a value masked by one rule is never
//! re-matched by another.

// std
use std::{borrow::Cow, sync::LazyLock};
// crates.io
use regex::{Captures, Regex};

/// Replacement written in place of secret material.
pub const PLACEHOLDER: &str = "[REDACTED]";

const EDGE_LEN: usize = 4;
const GROUPS: [(&str, &str, &str); 5] = [
	("auth_key", "auth_value", ""),
	("bearer_key", "bearer_value", ""),
	("kvq_key", "kvq_value", "kvq_tail"),
	("kv_key", "kv_value", ""),
	("url_key", "url_value", "url_tail"),
];

static PATTERN: LazyLock<Regex> = LazyLock::new(|| {
	let authorization = r#"(?P<auth_key>\bauthorization"?\s*[:=]\s*"?(?:(?:bearer|basic|digest)\s+)?)(?P<auth_value>[^\s",;]+)"#;
	let bearer = r"(?P<bearer_key>\bbearer\s+)(?P<bearer_value>[A-Za-z0-9\-._~+/]+=*)";
	let keys = r"(?:client_secret|access_token|refresh_token|id_token|password|passwd|api[_-]?key|secret|token)";
	let quoted = format!(
		r#"(?P<kvq_key>"?\b{keys}"?\s*[:=]\s*")(?P<kvq_value>(?:[^"\\]|\\.)+)(?P<kvq_tail>"?)"#
	);
	let key_value =
		format!(r#"(?P<kv_key>"?\b{keys}"?\s*[:=]\s*)(?P<kv_value>[^\s"&,;}}\[\]]+)"#);
	let userinfo = r"(?P<url_key>\b[a-z][a-z0-9+.\-]*://[^/\s:@]*:)(?P<url_value>[^/\s@]+)(?P<url_tail>@)";

	Regex::new(&format!("(?i){authorization}|{bearer}|{quoted}|{key_value}|{userinfo}"))
		.expect("Redaction pattern should compile.")
});

/// Masks secrets inside arbitrary text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Redactor {
	keep_edges: bool,
}
impl Redactor {
	/// Redactor that replaces every secret with [`PLACEHOLDER`].
	pub const fn new() -> Self {
		Self { keep_edges: false }
	}

	/// Keeps the first and last four characters of values longer than eight characters.
	pub const fn with_edges(mut self) -> Self {
		self.keep_edges = true;

		self
	}

	/// Returns `text` with every recognized secret masked.
	pub fn redact<'a>(&self, text: &'a str) -> Cow<'a, str> {
		PATTERN.replace_all(text, |caps: &Captures| self.replace(caps))
	}

	/// Masks a single secret value.
	pub fn mask(&self, value: &str) -> String {
		let count = value.chars().count();

		if !self.keep_edges || count <= EDGE_LEN * 2 {
			return PLACEHOLDER.to_owned();
		}

		let head = value.chars().take(EDGE_LEN).collect::<String>();
		let tail = value.chars().skip(count - EDGE_LEN).collect::<String>();

		format!("{head}{PLACEHOLDER}{tail}")
	}

	fn replace(&self, caps: &Captures) -> String {
		for (key, value, tail) in GROUPS {
			if let (Some(key), Some(value)) = (caps.name(key), caps.name(value)) {
				let tail = caps.name(tail).map_or("", |m| m.as_str());

				return format!("{}{}{tail}", key.as_str(), self.mask(value.as_str()));
			}
		}

		caps[0].to_owned()
	}
}

/// Redacts `text` with the default (no edge retention) [`Redactor`].
pub fn redact(text: &str) -> String {
	Redactor::new().redact(text).into_owned()
}

//! In-memory holder for the client's current access token.

// self
use crate::{_prelude::*, auth::Token};

/// Observability view of the cached entry; never exposes the token value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheSnapshot {
	/// Fingerprint of the cached access token.
	pub fingerprint: String,
	/// When the token was stored.
	pub acquired_at: OffsetDateTime,
	/// When the token was last handed out.
	pub last_used: OffsetDateTime,
	/// Hard expiry of the token.
	pub expires_at: OffsetDateTime,
	/// Whether [`TokenCache::get`] would currently return the token.
	pub usable: bool,
}

struct CacheEntry {
	token: Token,
	acquired_at: OffsetDateTime,
	last_used: Mutex<OffsetDateTime>,
}

/// Thread-safe single-entry token cache.
///
/// [`get`](Self::get) never returns a token that is within the safety margin of its expiry,
/// so callers either receive a usable token or must acquire a new one.
pub struct TokenCache {
	entry: RwLock<Option<CacheEntry>>,
	safety_margin: Duration,
}
impl TokenCache {
	/// Default margin subtracted from the expiry.
	pub const DEFAULT_SAFETY_MARGIN: Duration = Duration::seconds(60);

	/// Creates an empty cache using `safety_margin`.
	pub fn new(safety_margin: Duration) -> Self {
		Self { entry: RwLock::new(None), safety_margin }
	}

	/// Configured safety margin.
	pub fn safety_margin(&self) -> Duration {
		self.safety_margin
	}

	/// Returns the cached token when it is still usable.
	pub fn get(&self) -> Option<Token> {
		self.get_at(OffsetDateTime::now_utc())
	}

	/// [`get`](Self::get) evaluated at `now`.
	pub fn get_at(&self, now: OffsetDateTime) -> Option<Token> {
		let guard = self.entry.read();
		let entry = guard.as_ref()?;

		if !entry.token.is_usable_at(now, self.safety_margin) {
			return None;
		}

		*entry.last_used.lock() = now;

		Some(entry.token.clone())
	}

	/// Stores `token`, replacing any previous entry.
	pub fn put(&self, token: Token) {
		let now = OffsetDateTime::now_utc();

		*self.entry.write() =
			Some(CacheEntry { token, acquired_at: now, last_used: Mutex::new(now) });
	}

	/// Drops the cached token; returns `true` if one was present.
	pub fn invalidate(&self) -> bool {
		self.entry.write().take().is_some()
	}

	/// Drops the cached token only if it still is `stale`.
	///
	/// Concurrent requests that were rejected with the same token then trigger one
	/// invalidation instead of discarding a replacement another request already obtained.
	pub fn invalidate_if(&self, stale: &Token) -> bool {
		let mut guard = self.entry.write();

		match guard.as_ref() {
			Some(entry) if entry.token.same_secret(stale) => {
				*guard = None;

				true
			},
			_ => false,
		}
	}

	/// Empties the cache when the owning client closes.
	pub fn clear(&self) {
		self.invalidate();
	}

	/// Returns metadata about the current entry.
	pub fn snapshot(&self) -> Option<CacheSnapshot> {
		let now = OffsetDateTime::now_utc();
		let guard = self.entry.read();
		let entry = guard.as_ref()?;

		Some(CacheSnapshot {
			fingerprint: entry.token.access_token.fingerprint(),
			acquired_at: entry.acquired_at,
			last_used: *entry.last_used.lock(),
			expires_at: entry.token.expires_at,
			usable: entry.token.is_usable_at(now, self.safety_margin),
		})
	}
}
impl Default for TokenCache {
	fn default() -> Self {
		Self::new(Self::DEFAULT_SAFETY_MARGIN)
	}
}
impl Debug for TokenCache {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenCache")
			.field("entry", &self.snapshot())
			.field("safety_margin", &self.safety_margin)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::thread;
	// self
	use super::*;

	fn token(value: &str, expires_in: Duration) -> Token {
		Token::builder()
			.access_token(value)
			.expires_in(expires_in)
			.build()
			.expect("Token fixture should build.")
	}

	#[test]
	fn put_then_get_round_trips() {
		let cache = TokenCache::default();

		assert!(cache.get().is_none());

		cache.put(token("at-1", Duration::hours(1)));

		let hit = cache.get().expect("Fresh token should be served from cache.");

		assert_eq!(hit.access_token.expose(), "at-1");
		assert!(cache.snapshot().is_some_and(|snapshot| snapshot.usable));
	}

	#[test]
	fn tokens_inside_the_margin_are_misses() {
		let cache = TokenCache::default();
		let issued = token("at-1", Duration::hours(1));
		let expires_at = issued.expires_at;

		cache.put(issued);

		assert!(cache.get_at(expires_at - Duration::seconds(61)).is_some());
		assert!(cache.get_at(expires_at - Duration::seconds(60)).is_none());
		assert!(cache.get_at(expires_at + Duration::seconds(1)).is_none());
	}

	#[test]
	fn short_lifetimes_still_honor_the_full_margin() {
		let cache = TokenCache::default();
		let issued = token("at-100", Duration::seconds(100));
		let expires_at = issued.expires_at;

		cache.put(issued);

		assert!(cache.get_at(expires_at - Duration::seconds(61)).is_some());
		assert!(cache.get_at(expires_at - Duration::seconds(55)).is_none());
	}

	#[test]
	fn invalidate_if_ignores_replaced_tokens() {
		let cache = TokenCache::default();
		let stale = token("old", Duration::hours(1));

		cache.put(stale.clone());
		cache.put(token("new", Duration::hours(1)));

		assert!(!cache.invalidate_if(&stale));
		assert!(cache.get().is_some());

		let current = cache.get().expect("Replacement token should be cached.");

		assert!(cache.invalidate_if(&current));
		assert!(cache.get().is_none());
		assert!(!cache.invalidate());
	}

	#[test]
	fn snapshot_tracks_last_use_without_leaking() {
		let cache = TokenCache::default();

		cache.put(token("secret-value", Duration::hours(1)));

		let before = cache.snapshot().expect("Snapshot should exist after put.");
		let later = OffsetDateTime::now_utc() + Duration::seconds(5);

		cache.get_at(later);

		let after = cache.snapshot().expect("Snapshot should exist after get.");

		assert_eq!(after.last_used, later);
		assert_eq!(before.acquired_at, after.acquired_at);
		assert!(!format!("{cache:?}").contains("secret-value"));

		cache.clear();

		assert!(cache.snapshot().is_none());
	}

	#[test]
	fn concurrent_readers_and_writers_are_safe() {
		let cache = Arc::new(TokenCache::default());
		let handles = (0..8)
			.map(|i| {
				let cache = cache.clone();

				thread::spawn(move || {
					for _ in 0..100 {
						if i % 2 == 0 {
							cache.put(token(&format!("at-{i}"), Duration::hours(1)));
						} else {
							let _ = cache.get();
						}
					}
				})
			})
			.collect::<Vec<_>>();

		for handle in handles {
			handle.join().expect("Cache worker thread should not panic.");
		}

		assert!(cache.get().is_some());
	}
}

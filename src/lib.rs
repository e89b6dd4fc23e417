//! OAuth 2.0 client-credentials core for tenant API clients.
//!
//! The crate resolves tenant endpoints (optionally through discovery), acquires tokens with a
//! single in-flight request per client, caches them until shortly before expiry, retries
//! transient failures with jittered backoff, and keeps credentials out of logs and errors.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]
#![cfg_attr(test, allow(unused_crate_dependencies))]

pub mod auth;
pub mod cache;
pub mod client;
pub mod config;
pub mod discovery;
pub mod endpoint;
pub mod error;
pub mod http;
pub mod obs;
pub mod redact;
pub mod retry;
pub mod strategy;

mod oauth;

#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and fakes shared by unit and integration tests; enabled via
	//! `cfg(test)` or the `test` crate feature.

	pub use crate::_prelude::*;

	// std
	use std::{sync::atomic::AtomicUsize, time::Instant};
	// crates.io
	use oauth2::http::{HeaderValue, StatusCode, header::CONTENT_TYPE};
	// self
	use crate::{
		config::{AuthConfig, AuthConfigBuilder},
		error::TransportError,
		http::{HttpExecutor, HttpFuture, HttpRequest, HttpResponse},
		obs::{LogLevel, LogSink},
	};

	#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

	/// Client identifier used by test fixtures.
	pub const TEST_CLIENT_ID: &str = "svc-client";
	/// Client secret used by test fixtures.
	pub const TEST_CLIENT_SECRET: &str = "s3cr3t-value-that-must-never-leak";

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	#[cfg(feature = "reqwest")]
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Config builder seeded with the fixture credentials for `tenant`.
	pub fn test_config(tenant: &str) -> AuthConfigBuilder {
		AuthConfig::builder(TEST_CLIENT_ID, TEST_CLIENT_SECRET, tenant)
	}

	/// Token endpoint JSON body.
	pub fn token_body(access_token: &str, expires_in: i64) -> String {
		format!(
			"{{\"access_token\":\"{access_token}\",\"token_type\":\"Bearer\",\"expires_in\":{expires_in}}}"
		)
	}

	/// Builds a JSON [`HttpResponse`] with the provided status.
	pub fn json_response(status: u16, body: impl Into<String>) -> HttpResponse {
		let mut response = HttpResponse::new(body.into().into_bytes());

		*response.status_mut() =
			StatusCode::from_u16(status).expect("Test fixture status code should be valid.");
		response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

		response
	}

	/// Request observed by [`FnHttpClient`].
	#[derive(Clone, Debug)]
	pub struct RecordedRequest {
		/// HTTP method.
		pub method: String,
		/// Full request URI.
		pub uri: String,
		/// `Authorization` header, if any.
		pub authorization: Option<String>,
		/// Request body decoded as UTF-8.
		pub body: String,
		/// Instant at which the request reached the fake.
		pub at: Instant,
	}

	type Handler = dyn Fn(&HttpRequest) -> Result<HttpResponse, TransportError> + Send + Sync;

	/// Closure-driven [`HttpExecutor`] that records every request it receives.
	pub struct FnHttpClient {
		handler: Box<Handler>,
		delay: Option<std::time::Duration>,
		calls: Mutex<Vec<RecordedRequest>>,
		counter: AtomicUsize,
	}
	impl FnHttpClient {
		/// Wraps a handler that produces one response per request.
		pub fn new<F>(handler: F) -> Self
		where
			F: 'static + Fn(&HttpRequest) -> Result<HttpResponse, TransportError> + Send + Sync,
		{
			Self {
				handler: Box::new(handler),
				delay: None,
				calls: Mutex::new(Vec::new()),
				counter: AtomicUsize::new(0),
			}
		}

		/// Delays every response, keeping requests in flight long enough to overlap.
		pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
			self.delay = Some(delay);

			self
		}

		/// Returns every recorded request.
		pub fn calls(&self) -> Vec<RecordedRequest> {
			self.calls.lock().clone()
		}

		/// Counts requests whose URI path ends with `suffix`.
		pub fn calls_to(&self, suffix: &str) -> usize {
			self.calls
				.lock()
				.iter()
				.filter(|call| {
					call.uri.split('?').next().is_some_and(|path| path.ends_with(suffix))
				})
				.count()
		}

		/// Total number of requests observed.
		pub fn total_calls(&self) -> usize {
			self.counter.load(std::sync::atomic::Ordering::SeqCst)
		}
	}
	impl HttpExecutor for FnHttpClient {
		fn execute(&self, request: HttpRequest) -> HttpFuture<'_> {
			self.counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
			self.calls.lock().push(RecordedRequest {
				method: request.method().to_string(),
				uri: request.uri().to_string(),
				authorization: request
					.headers()
					.get(oauth2::http::header::AUTHORIZATION)
					.and_then(|value| value.to_str().ok())
					.map(str::to_owned),
				body: String::from_utf8_lossy(request.body()).into_owned(),
				at: Instant::now(),
			});

			let reply = (self.handler)(&request);
			let delay = self.delay;

			Box::pin(async move {
				if let Some(delay) = delay {
					tokio::time::sleep(delay).await;
				}

				reply
			})
		}
	}

	/// [`LogSink`] that keeps every record in memory.
	#[derive(Debug, Default)]
	pub struct RecordingSink(Mutex<Vec<(LogLevel, String)>>);
	impl RecordingSink {
		/// Returns the recorded log lines.
		pub fn records(&self) -> Vec<(LogLevel, String)> {
			self.0.lock().clone()
		}

		/// Returns the recorded lines at `level`.
		pub fn at(&self, level: LogLevel) -> Vec<String> {
			self.0
				.lock()
				.iter()
				.filter(|(recorded, _)| *recorded == level)
				.map(|(_, line)| line.clone())
				.collect()
		}
	}
	impl LogSink for RecordingSink {
		fn log(&self, level: LogLevel, message: &str) {
			self.0.lock().push((level, message.to_owned()));
		}
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, ErrorKind, Result};
}

pub use oauth2;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;

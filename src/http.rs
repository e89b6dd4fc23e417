//! HTTP capability consumed by discovery, token exchange, and authenticated transports.
//!
//! [`HttpExecutor`] is the crate's only dependency on an HTTP stack. The default
//! [`ReqwestHttpClient`] covers production use; tests and embedders implement the trait
//! directly. Token exchanges wrap an executor in a short-lived handle that records the
//! response status and `Retry-After` hint in a [`ResponseMetadataSlot`], so error mapping can
//! classify failures even after `oauth2` has consumed the response.

// crates.io
use oauth2::{
	AsyncHttpClient, HttpClientError,
	http::{HeaderMap, header::RETRY_AFTER},
};
use time::format_description::well_known::Rfc2822;
// self
use crate::{_prelude::*, error::TransportError, retry};

pub use oauth2::{HttpRequest, HttpResponse};

/// Boxed response future returned by [`HttpExecutor::execute`].
pub type HttpFuture<'a> = Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + 'a + Send>>;

/// Executes one HTTP request.
///
/// Implementations must not follow redirects for token requests and should report transport
/// failures through [`TransportError::network`] so messages are redacted.
pub trait HttpExecutor
where
	Self: 'static + Send + Sync,
{
	/// Sends `request` and resolves to the full response.
	fn execute(&self, request: HttpRequest) -> HttpFuture<'_>;
}

/// Status and retry hint captured from the most recent response.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResponseMetadata {
	/// HTTP status code, if a response arrived.
	pub status: Option<u16>,
	/// `Retry-After` hint as a relative duration.
	pub retry_after: Option<Duration>,
}
impl ResponseMetadata {
	/// Extracts metadata from a response.
	pub fn from_response(response: &HttpResponse) -> Self {
		Self {
			status: Some(response.status().as_u16()),
			retry_after: parse_retry_after(response.headers()),
		}
	}
}

/// Thread-safe slot for sharing [`ResponseMetadata`] between transport and error layers.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadataSlot(Arc<Mutex<Option<ResponseMetadata>>>);
impl ResponseMetadataSlot {
	/// Stores new metadata for the current request.
	pub fn store(&self, meta: ResponseMetadata) {
		*self.0.lock() = Some(meta);
	}

	/// Returns the captured metadata, if any, consuming it from the slot.
	pub fn take(&self) -> Option<ResponseMetadata> {
		self.0.lock().take()
	}
}

/// `oauth2` adapter over an [`HttpExecutor`] that enforces a timeout and records metadata.
pub(crate) struct OAuthHandle {
	executor: Arc<dyn HttpExecutor>,
	slot: ResponseMetadataSlot,
	timeout: Duration,
}
impl OAuthHandle {
	pub(crate) fn new(executor: Arc<dyn HttpExecutor>, timeout: Duration) -> Self {
		Self { executor, slot: ResponseMetadataSlot::default(), timeout }
	}

	pub(crate) fn slot(&self) -> &ResponseMetadataSlot {
		&self.slot
	}
}
impl<'c> AsyncHttpClient<'c> for OAuthHandle {
	type Error = HttpClientError<TransportError>;
	type Future = Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		Box::pin(async move {
			self.slot.take();

			let response =
				send(self.executor.as_ref(), request, self.timeout).await.map_err(Box::new)?;

			self.slot.store(ResponseMetadata::from_response(&response));

			Ok(response)
		})
	}
}

/// Sends `request` through `executor`, failing with [`TransportError::Timeout`] after `timeout`.
pub(crate) async fn send(
	executor: &dyn HttpExecutor,
	request: HttpRequest,
	timeout: Duration,
) -> Result<HttpResponse, TransportError> {
	tokio::time::timeout(retry::std_duration(timeout), executor.execute(request))
		.await
		.map_err(|_| TransportError::Timeout { after: timeout })?
}

/// Parses `Retry-After` as delta seconds or an HTTP date.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let raw = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u32>() {
		return Some(Duration::seconds(secs.into()));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}

/// Default [`HttpExecutor`] backed by a shared [`ReqwestClient`].
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Builds a client that never follows redirects.
	pub fn new() -> Result<Self, crate::error::ConfigError> {
		let client = ReqwestClient::builder().redirect(reqwest::redirect::Policy::none()).build()?;

		Ok(Self(client))
	}

	/// Wraps an existing reqwest [`ReqwestClient`]; configure it not to follow redirects.
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl HttpExecutor for ReqwestHttpClient {
	fn execute(&self, request: HttpRequest) -> HttpFuture<'_> {
		Box::pin(async move {
			let request = reqwest::Request::try_from(request)?;
			let response = self.0.execute(request).await?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let mut converted = HttpResponse::new(response.bytes().await?.to_vec());

			*converted.status_mut() = status;
			*converted.headers_mut() = headers;

			Ok(converted)
		})
	}
}

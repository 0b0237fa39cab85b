//! Transport primitives: the request/response values the client moves around and the
//! [`HttpTransport`] seam that actually performs a call.
//!
//! Everything above this module (dispatcher, guard, coordinator) only speaks [`ApiRequest`] and
//! [`ApiResponse`], so tests and embedders can swap in any HTTP stack by implementing
//! [`HttpTransport`]. The crate ships [`ReqwestTransport`] behind the default `reqwest` feature.

// std
#[cfg(feature = "reqwest")] use std::ops::Deref;
// crates.io
use http::header::{AUTHORIZATION, CONTENT_TYPE, HeaderName};
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	auth::{RetryMarker, TokenSecret},
	error::{ConfigError, TransportError},
};

const BODY_PREVIEW_LIMIT: usize = 256;

/// Boxed future returned by [`HttpTransport::execute`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<ApiResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP stacks capable of executing one request.
///
/// Implementations must not interpret the status code; authorization failures are handled by
/// the [`ResponseGuard`](crate::guard::ResponseGuard). Implementations must be
/// `Send + Sync + 'static` so one transport can be shared by the dispatcher and the refresh
/// exchange.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Performs the call and returns the raw response.
	fn execute(&self, request: ApiRequest) -> TransportFuture<'_>;
}

/// Outbound call description.
///
/// The [`RetryMarker`] is private: the only way to obtain a replayed request is
/// [`ApiRequest::replayed`], which also rewrites the authorization header.
#[derive(Clone, Debug)]
pub struct ApiRequest {
	/// HTTP method.
	pub method: Method,
	/// Absolute target URL.
	pub url: Url,
	/// Request headers, including `Authorization` once the dispatcher attached it.
	pub headers: HeaderMap,
	/// Optional request body.
	pub body: Option<Vec<u8>>,
	marker: RetryMarker,
}
impl ApiRequest {
	/// Creates a request with no headers or body.
	pub fn new(method: Method, url: Url) -> Self {
		Self { method, url, headers: HeaderMap::new(), body: None, marker: RetryMarker::Fresh }
	}

	/// Shorthand for a `GET` request.
	pub fn get(url: Url) -> Self {
		Self::new(Method::GET, url)
	}

	/// Shorthand for a `POST` request.
	pub fn post(url: Url) -> Self {
		Self::new(Method::POST, url)
	}

	/// Adds or replaces a header.
	pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);

		self
	}

	/// Sets a raw body.
	pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
		self.body = Some(body.into());

		self
	}

	/// Serializes `body` as JSON and sets the matching content type.
	pub fn with_json<T>(self, body: &T) -> Result<Self, ConfigError>
	where
		T: ?Sized + Serialize,
	{
		let bytes = serde_json::to_vec(body)?;

		Ok(self
			.with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
			.with_body(bytes))
	}

	/// Returns the replay marker carried by this request.
	pub fn marker(&self) -> RetryMarker {
		self.marker
	}

	/// Attaches `Authorization: Bearer <access>`, replacing any existing authorization header.
	/// An empty `access` leaves the headers untouched.
	pub fn authorize(mut self, access: &TokenSecret) -> Result<Self, ConfigError> {
		if let Some(bearer) = access.bearer() {
			let mut value =
				HeaderValue::try_from(bearer).map_err(|_| ConfigError::InvalidCredential)?;

			value.set_sensitive(true);
			self.headers.insert(AUTHORIZATION, value);
		}

		Ok(self)
	}

	/// Returns a copy marked as replayed, carrying `access` as its credential.
	pub fn replayed(&self, access: &TokenSecret) -> Result<Self, ConfigError> {
		let mut next = self.clone().authorize(access)?;

		next.marker = self.marker.advance();

		Ok(next)
	}

	/// Returns the bearer credential currently attached, or an empty string.
	pub fn bearer_credential(&self) -> &str {
		self.headers
			.get(AUTHORIZATION)
			.and_then(|value| value.to_str().ok())
			.and_then(|value| value.strip_prefix("Bearer "))
			.unwrap_or_default()
	}
}

/// Fully buffered response.
#[derive(Clone, Debug)]
pub struct ApiResponse {
	/// HTTP status.
	pub status: StatusCode,
	/// Response headers.
	pub headers: HeaderMap,
	/// Raw body bytes.
	pub body: Vec<u8>,
}
impl ApiResponse {
	/// Creates a response with an empty header map.
	pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
		Self { status, headers: HeaderMap::new(), body: body.into() }
	}

	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		self.status.is_success()
	}

	/// Returns `true` when the call failed authorization (HTTP 401).
	pub fn is_unauthorized(&self) -> bool {
		self.status == StatusCode::UNAUTHORIZED
	}

	/// Decodes the body as JSON, reporting the failing path on error.
	pub fn json<T>(&self) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let mut de = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut de)
			.map_err(|source| Error::Decode { source, status: self.status.as_u16() })
	}

	/// Returns a lossy, truncated body preview suitable for error messages.
	pub fn body_preview(&self) -> String {
		let text = String::from_utf8_lossy(&self.body);

		match text.char_indices().nth(BODY_PREVIEW_LIMIT) {
			Some((idx, _)) => format!("{}...", &text[..idx]),
			None => text.into_owned(),
		}
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestTransport {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestTransport {
	fn execute(&self, request: ApiRequest) -> TransportFuture<'_> {
		Box::pin(async move {
			let ApiRequest { method, url, headers, body, .. } = request;
			let mut builder = self.0.request(method, url.clone()).headers(headers);

			if let Some(body) = body {
				builder = builder.body(body);
			}

			let response =
				builder.send().await.map_err(|e| TransportError::network(&url, e))?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let body =
				response.bytes().await.map_err(|e| TransportError::network(&url, e))?.to_vec();

			Ok(ApiResponse { status, headers, body })
		})
	}
}

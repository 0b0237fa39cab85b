//! Client-level error types shared across the dispatcher, guard, coordinator, and stores.

// self
use crate::{_prelude::*, transport::ApiResponse};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical client error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// The refresh episode this call depended on failed; the stored credentials were cleared
	/// unless the episode was abandoned.
	#[error(transparent)]
	RefreshFailed(#[from] RefreshError),
	/// A `401` surfaced without a refresh attempt because replay is disabled.
	#[error("Request was rejected with status {}.", response.status)]
	Unauthorized {
		/// Authorization failure, returned untouched.
		response: ApiResponse,
	},
	/// A call that was already replayed with a fresh credential was rejected again.
	#[error("Replayed request was rejected with status {}.", response.status)]
	ReplayRejected {
		/// Second authorization failure, returned untouched.
		response: ApiResponse,
	},
	/// The sign-in exchange rejected the supplied identifier/secret pair.
	#[error("Sign-in was rejected with status {status}.")]
	SignInRejected {
		/// HTTP status returned by the sign-in endpoint.
		status: u16,
		/// Response body preview.
		body: String,
	},
	/// A non-success status surfaced by a typed helper such as `get_json`.
	#[error("Request failed with status {}.", response.status)]
	Status {
		/// Response that carried the failing status.
		response: ApiResponse,
	},
	/// A response body could not be decoded into the requested type.
	#[error("Response body could not be decoded.")]
	Decode {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code of the response that failed to decode.
		status: u16,
	},
}

/// Why a refresh episode failed.
///
/// One outcome is shared by the leader and every queued follower, so the type is `Clone` and
/// carries only owned strings.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum RefreshError {
	/// No refresh credential was stored; no remote call was attempted.
	#[error("No refresh credential is available.")]
	MissingRefreshCredential,
	/// The refresh endpoint answered with a non-success status.
	#[error("Refresh endpoint rejected the credential with status {status}.")]
	Rejected {
		/// HTTP status returned by the refresh endpoint.
		status: u16,
		/// Response body preview.
		body: String,
	},
	/// The refresh endpoint answered 2xx without a usable access credential.
	#[error("Refresh endpoint returned an unusable response: {message}.")]
	MalformedResponse {
		/// Parser or validation message.
		message: String,
	},
	/// The refresh request body could not be serialized.
	#[error("Refresh request could not be encoded: {message}.")]
	Encode {
		/// Serializer message.
		message: String,
	},
	/// The refresh exchange never reached the endpoint or lost its connection.
	#[error("Refresh exchange failed in transport: {message}.")]
	Transport {
		/// Transport-supplied message.
		message: String,
	},
	/// The refresh exchange exceeded the configured timeout.
	#[error("Refresh exchange timed out after {after}.")]
	TimedOut {
		/// Timeout that elapsed.
		after: Duration,
	},
	/// The fresh credential could not be persisted.
	#[error("Refreshed credential could not be stored: {message}.")]
	Storage {
		/// Store-supplied message.
		message: String,
	},
	/// The episode task panicked or was cancelled before it produced an outcome.
	#[error("Refresh episode was abandoned before it completed.")]
	Abandoned,
}

/// Configuration and validation failures raised by the client.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Endpoint path cannot be joined onto the base URL.
	#[error("Endpoint `{path}` cannot be resolved against the base URL.")]
	InvalidEndpoint {
		/// Path that failed to join.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Stored access credential contains bytes that are not valid in an HTTP header.
	#[error("Access credential cannot be encoded as an Authorization header.")]
	InvalidCredential,
	/// Request body could not be serialized.
	#[error("Request body could not be serialized.")]
	Encode(#[from] serde_json::Error),
	/// Configuration failed validation.
	#[error(transparent)]
	Validation(#[from] crate::config::ConfigValidationError),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling {url}.")]
	Network {
		/// Target URL of the failed call.
		url: String,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred during transport.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(url: &Url, src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { url: url.to_string(), source: Box::new(src) }
	}
}
impl From<TransportError> for RefreshError {
	fn from(e: TransportError) -> Self {
		let message = match StdError::source(&e) {
			Some(source) => format!("{e} {source}"),
			None => e.to_string(),
		};

		Self::Transport { message }
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn refresh_error_converts_into_client_error() {
		let err: Error = RefreshError::MissingRefreshCredential.into();

		assert!(matches!(err, Error::RefreshFailed(RefreshError::MissingRefreshCredential)));
		assert_eq!(err.to_string(), "No refresh credential is available.");
	}

	#[test]
	fn transport_error_flattens_into_refresh_error() {
		let url = Url::parse("https://api.example.com/api/auth/token/refresh/")
			.expect("Fixture URL should parse.");
		let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
		let refresh = RefreshError::from(TransportError::network(&url, io));

		match refresh {
			RefreshError::Transport { message } => {
				assert!(message.contains("api.example.com"));
				assert!(message.contains("reset by peer"));
			},
			other => panic!("Unexpected refresh error: {other:?}."),
		}
	}
}

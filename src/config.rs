//! Client configuration: API base URL, credential endpoints, and refresh timing.

// crates.io
use serde::Deserializer;
// self
use crate::{_prelude::*, error::ConfigError};

/// Errors raised while constructing or validating a [`ClientConfig`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum ConfigValidationError {
	/// Base URL must use HTTP or HTTPS.
	#[error("Base URL must use http or https, got `{scheme}`.")]
	UnsupportedScheme {
		/// Scheme that failed validation.
		scheme: String,
	},
	/// Base URL cannot have paths joined onto it (e.g. `mailto:`).
	#[error("Base URL `{url}` cannot be used as a base.")]
	CannotBeABase {
		/// URL that failed validation.
		url: String,
	},
	/// Endpoint path does not resolve against the base URL.
	#[error("The {endpoint} path `{path}` is invalid: {reason}.")]
	InvalidPath {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Path that failed validation.
		path: String,
		/// Parser message.
		reason: String,
	},
	/// Base URL path must end with `/`, otherwise joining drops its last segment.
	#[error("Base URL `{url}` must end with `/`.")]
	MissingTrailingSlash {
		/// URL that failed validation.
		url: String,
	},
	/// The refresh exchange needs a positive timeout.
	#[error("Refresh timeout must be positive.")]
	NonPositiveTimeout,
}

/// Immutable client configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
	/// Root of the API; must end with `/` so relative paths join beneath it.
	///
	/// The builder and deserialization append a missing slash; [`ClientConfig::validate`]
	/// rejects a hand-built value without one.
	#[serde(deserialize_with = "deserialize_base_url")]
	pub base_url: Url,
	/// Path of the sign-in exchange, relative to [`ClientConfig::base_url`].
	pub sign_in_path: String,
	/// Path of the refresh exchange, relative to [`ClientConfig::base_url`].
	pub refresh_path: String,
	/// Upper bound on one refresh exchange; expiry fails the whole episode.
	pub refresh_timeout: Duration,
	/// Whether `401` responses trigger a refresh + replay. When disabled every `401` is
	/// surfaced as [`Error::Unauthorized`] immediately.
	pub replay_unauthorized: bool,
}
impl ClientConfig {
	/// Default sign-in path.
	pub const DEFAULT_SIGN_IN_PATH: &'static str = "api/auth/token/";
	/// Default refresh path.
	pub const DEFAULT_REFRESH_PATH: &'static str = "api/auth/token/refresh/";
	/// Default refresh exchange timeout.
	pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::seconds(30);

	/// Creates a builder rooted at `base_url`.
	pub fn builder(base_url: Url) -> ClientConfigBuilder {
		ClientConfigBuilder::new(base_url)
	}

	/// Resolves an API path against the base URL.
	pub fn endpoint(&self, path: &str) -> Result<Url, ConfigError> {
		self.base_url
			.join(path.trim_start_matches('/'))
			.map_err(|source| ConfigError::InvalidEndpoint { path: path.to_owned(), source })
	}

	/// Absolute URL of the sign-in exchange.
	pub fn sign_in_url(&self) -> Result<Url, ConfigError> {
		self.endpoint(&self.sign_in_path)
	}

	/// Absolute URL of the refresh exchange.
	pub fn refresh_url(&self) -> Result<Url, ConfigError> {
		self.endpoint(&self.refresh_path)
	}

	/// Re-runs builder validation, e.g. after deserializing a config file.
	pub fn validate(&self) -> Result<(), ConfigValidationError> {
		match self.base_url.scheme() {
			"http" | "https" => {},
			other => {
				return Err(ConfigValidationError::UnsupportedScheme { scheme: other.to_owned() });
			},
		}

		if self.base_url.cannot_be_a_base() {
			return Err(ConfigValidationError::CannotBeABase { url: self.base_url.to_string() });
		}
		if !self.base_url.path().ends_with('/') {
			return Err(ConfigValidationError::MissingTrailingSlash {
				url: self.base_url.to_string(),
			});
		}
		if !self.refresh_timeout.is_positive() {
			return Err(ConfigValidationError::NonPositiveTimeout);
		}

		for (endpoint, path) in [("sign-in", &self.sign_in_path), ("refresh", &self.refresh_path)]
		{
			if let Err(e) = self.base_url.join(path.trim_start_matches('/')) {
				return Err(ConfigValidationError::InvalidPath {
					endpoint,
					path: path.clone(),
					reason: e.to_string(),
				});
			}
		}

		Ok(())
	}
}

/// Builder for [`ClientConfig`] values.
#[derive(Debug)]
pub struct ClientConfigBuilder {
	base_url: Url,
	sign_in_path: String,
	refresh_path: String,
	refresh_timeout: Duration,
	replay_unauthorized: bool,
}
impl ClientConfigBuilder {
	/// Creates a builder with default paths and timeout.
	pub fn new(base_url: Url) -> Self {
		Self {
			base_url,
			sign_in_path: ClientConfig::DEFAULT_SIGN_IN_PATH.into(),
			refresh_path: ClientConfig::DEFAULT_REFRESH_PATH.into(),
			refresh_timeout: ClientConfig::DEFAULT_REFRESH_TIMEOUT,
			replay_unauthorized: true,
		}
	}

	/// Overrides the sign-in path.
	pub fn sign_in_path(mut self, path: impl Into<String>) -> Self {
		self.sign_in_path = path.into();

		self
	}

	/// Overrides the refresh path.
	pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
		self.refresh_path = path.into();

		self
	}

	/// Overrides the refresh exchange timeout.
	pub fn refresh_timeout(mut self, timeout: Duration) -> Self {
		self.refresh_timeout = timeout;

		self
	}

	/// Enables or disables refresh + replay on `401`.
	pub fn replay_unauthorized(mut self, enabled: bool) -> Self {
		self.replay_unauthorized = enabled;

		self
	}

	/// Consumes the builder and validates the resulting config.
	pub fn build(self) -> Result<ClientConfig, ConfigValidationError> {
		let config = ClientConfig {
			base_url: with_trailing_slash(self.base_url),
			sign_in_path: self.sign_in_path,
			refresh_path: self.refresh_path,
			refresh_timeout: self.refresh_timeout,
			replay_unauthorized: self.replay_unauthorized,
		};

		config.validate()?;

		Ok(config)
	}
}

fn with_trailing_slash(mut base_url: Url) -> Url {
	if !base_url.cannot_be_a_base() && !base_url.path().ends_with('/') {
		let path = format!("{}/", base_url.path());

		base_url.set_path(&path);
	}

	base_url
}

fn deserialize_base_url<'de, D>(deserializer: D) -> Result<Url, D::Error>
where
	D: Deserializer<'de>,
{
	Url::deserialize(deserializer).map(with_trailing_slash)
}

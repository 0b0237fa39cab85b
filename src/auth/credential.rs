//! The access/refresh credential pair owned by a [`CredentialStore`](crate::store::CredentialStore).

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Fixed persistence key for the access credential.
pub const ACCESS_KEY: &str = "access";
/// Fixed persistence key for the refresh credential.
pub const REFRESH_KEY: &str = "refresh";

/// Short-lived access credential plus the longer-lived refresh credential.
///
/// Either value may be empty, meaning "unauthenticated". The access credential is attached to
/// every outbound call when present; the refresh credential is only read by the
/// [`RefreshCoordinator`](crate::refresh::RefreshCoordinator).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
	/// Bearer token attached to API calls.
	#[serde(default)]
	pub access: TokenSecret,
	/// Token exchanged for a new access credential.
	#[serde(default)]
	pub refresh: TokenSecret,
}
impl CredentialPair {
	/// Builds a pair from raw strings.
	pub fn new(access: impl Into<TokenSecret>, refresh: impl Into<TokenSecret>) -> Self {
		Self { access: access.into(), refresh: refresh.into() }
	}

	/// Returns `true` when both credentials are empty.
	pub fn is_empty(&self) -> bool {
		self.access.is_empty() && self.refresh.is_empty()
	}

	/// Overwrites whichever values are provided, leaving absent ones untouched.
	pub fn apply(&mut self, access: Option<&str>, refresh: Option<&str>) {
		if let Some(access) = access {
			self.access = TokenSecret::new(access);
		}
		if let Some(refresh) = refresh {
			self.refresh = TokenSecret::new(refresh);
		}
	}
}

/// Wire shape shared by the sign-in and refresh endpoints.
///
/// Sign-in responses carry both fields; refresh responses may omit `refresh` when the server
/// does not rotate it.
#[derive(Clone, Debug, Deserialize)]
pub struct TokenGrant {
	/// Newly issued access credential.
	#[serde(default)]
	pub access: Option<String>,
	/// Newly issued refresh credential, if rotated.
	#[serde(default)]
	pub refresh: Option<String>,
}
impl TokenGrant {
	/// Returns the access credential when it is present and non-empty.
	pub fn usable_access(&self) -> Option<&str> {
		self.access.as_deref().filter(|value| !value.is_empty())
	}

	/// Returns the refresh credential when it is present and non-empty.
	pub fn usable_refresh(&self) -> Option<&str> {
		self.refresh.as_deref().filter(|value| !value.is_empty())
	}
}

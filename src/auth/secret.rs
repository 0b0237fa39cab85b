//! Secure token secret wrapper that redacts sensitive material.

// self
use crate::_prelude::*;

/// Redacted token secret wrapper keeping sensitive material out of logs.
///
/// An empty secret means "absent"; stores hand out empty secrets instead of `None` so callers
/// can treat "never signed in" and "cleared" the same way.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenSecret(String);
impl TokenSecret {
	/// Wraps a new secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner token value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Returns `true` when no credential is held.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Formats the value as an `Authorization` header payload, if present.
	pub fn bearer(&self) -> Option<String> {
		if self.is_empty() { None } else { Some(format!("Bearer {}", self.0)) }
	}
}
impl AsRef<str> for TokenSecret {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl From<&str> for TokenSecret {
	fn from(value: &str) -> Self {
		Self::new(value)
	}
}
impl From<String> for TokenSecret {
	fn from(value: String) -> Self {
		Self(value)
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		if self.is_empty() {
			f.debug_tuple("TokenSecret").field(&"<empty>").finish()
		} else {
			f.debug_tuple("TokenSecret").field(&"<redacted>").finish()
		}
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

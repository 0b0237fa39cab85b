//! Storage contract and built-in backends for the access/refresh credential pair.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{_prelude::*, auth::CredentialPair};

/// Boxed future returned by [`CredentialStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract for the credential pair.
///
/// Reads and writes must be effectively atomic per key: a `get` racing a `set` observes either
/// the old or the new value of each credential, never a torn one.
pub trait CredentialStore
where
	Self: Send + Sync,
{
	/// Returns the current pair; absent values come back empty.
	fn get(&self) -> StoreFuture<'_, CredentialPair>;

	/// Writes whichever credentials are provided, leaving absent ones unchanged.
	fn set<'a>(
		&'a self,
		access: Option<&'a str>,
		refresh: Option<&'a str>,
	) -> StoreFuture<'a, ()>;

	/// Removes both credentials.
	fn clear(&self) -> StoreFuture<'_, ()>;
}

/// Error type produced by [`CredentialStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::error::Error;

	#[test]
	fn store_error_converts_into_client_error_with_source() {
		let store_error = StoreError::Backend { message: "disk unavailable".into() };
		let client_error: Error = store_error.clone().into();

		assert!(matches!(client_error, Error::Storage(_)));
		assert!(client_error.to_string().contains("disk unavailable"));

		let source = StdError::source(&client_error)
			.expect("Client error should expose the original store error as its source.");

		assert_eq!(source.to_string(), store_error.to_string());
	}
}

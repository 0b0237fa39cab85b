//! Thread-safe in-memory [`CredentialStore`] for sessions that do not outlive the process.

// self
use crate::{
	_prelude::*,
	auth::CredentialPair,
	store::{CredentialStore, StoreFuture},
};

/// Keeps the credential pair in-process behind a read/write lock.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(Arc<RwLock<CredentialPair>>);
impl MemoryStore {
	/// Creates a store pre-populated with `pair`.
	pub fn with_pair(pair: CredentialPair) -> Self {
		Self(Arc::new(RwLock::new(pair)))
	}

	/// Returns the current pair without going through the async contract.
	pub fn snapshot(&self) -> CredentialPair {
		self.0.read().clone()
	}
}
impl CredentialStore for MemoryStore {
	fn get(&self) -> StoreFuture<'_, CredentialPair> {
		let pair = self.snapshot();

		Box::pin(async move { Ok(pair) })
	}

	fn set<'a>(
		&'a self,
		access: Option<&'a str>,
		refresh: Option<&'a str>,
	) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			self.0.write().apply(access, refresh);

			Ok(())
		})
	}

	fn clear(&self) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			*self.0.write() = CredentialPair::default();

			Ok(())
		})
	}
}

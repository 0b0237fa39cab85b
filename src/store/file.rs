//! File-backed [`CredentialStore`] for CLIs and bots that keep a session across restarts.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	auth::{ACCESS_KEY, CredentialPair, REFRESH_KEY},
	store::{CredentialStore, StoreError, StoreFuture},
};

/// Persists the credential pair to a JSON object after each mutation.
///
/// The file holds at most two entries, under the fixed keys [`ACCESS_KEY`] and
/// [`REFRESH_KEY`]; empty credentials are omitted rather than written as empty strings.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	inner: Arc<RwLock<CredentialPair>>,
}
impl FileStore {
	/// Opens (or creates) a store at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let snapshot = Self::load_snapshot(&path)?;

		Ok(Self { path, inner: Arc::new(RwLock::new(snapshot)) })
	}

	/// Returns the backing file path.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn load_snapshot(path: &Path) -> Result<CredentialPair, StoreError> {
		if !path.exists() {
			return Ok(CredentialPair::default());
		}

		let metadata = path.metadata().map_err(|e| StoreError::Backend {
			message: format!("Failed to inspect {}: {e}", path.display()),
		})?;

		if metadata.len() == 0 {
			return Ok(CredentialPair::default());
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;
		let mut entries: BTreeMap<String, String> =
			serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
				message: format!("Failed to parse {}: {e}", path.display()),
			})?;

		Ok(CredentialPair::new(
			entries.remove(ACCESS_KEY).unwrap_or_default(),
			entries.remove(REFRESH_KEY).unwrap_or_default(),
		))
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}
		Ok(())
	}

	fn persist_locked(&self, pair: &CredentialPair) -> Result<(), StoreError> {
		Self::ensure_parent_exists(&self.path)?;

		let mut entries = BTreeMap::new();

		if !pair.access.is_empty() {
			entries.insert(ACCESS_KEY, pair.access.expose());
		}
		if !pair.refresh.is_empty() {
			entries.insert(REFRESH_KEY, pair.refresh.expose());
		}

		let serialized =
			serde_json::to_vec_pretty(&entries).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize credential snapshot: {e}"),
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}
}
impl CredentialStore for FileStore {
	fn get(&self) -> StoreFuture<'_, CredentialPair> {
		Box::pin(async move { Ok(self.inner.read().clone()) })
	}

	fn set<'a>(
		&'a self,
		access: Option<&'a str>,
		refresh: Option<&'a str>,
	) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			let mut guard = self.inner.write();
			let mut next = guard.clone();

			next.apply(access, refresh);
			self.persist_locked(&next)?;
			*guard = next;

			Ok(())
		})
	}

	fn clear(&self) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			let mut guard = self.inner.write();
			let next = CredentialPair::default();

			self.persist_locked(&next)?;
			*guard = next;

			Ok(())
		})
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::{env, process};
	// crates.io
	use tokio::runtime::Runtime;
	// self
	use super::*;

	fn temp_path() -> PathBuf {
		let unique = format!(
			"bearer_session_file_store_{}_{}.json",
			process::id(),
			OffsetDateTime::now_utc().unix_timestamp_nanos(),
		);

		env::temp_dir().join(unique)
	}

	#[test]
	fn set_and_reload_round_trip() {
		let path = temp_path();
		let store = FileStore::open(&path).expect("Failed to open file store snapshot.");
		let rt = Runtime::new().expect("Failed to build Tokio runtime for file store test.");

		rt.block_on(store.set(Some("a1"), Some("r1")))
			.expect("Failed to write credentials to file store.");
		rt.block_on(store.set(Some("a2"), None)).expect("Failed to rotate access credential.");
		drop(store);

		let reopened = FileStore::open(&path).expect("Failed to reopen file store snapshot.");
		let pair =
			rt.block_on(reopened.get()).expect("Failed to read credentials from file store.");

		assert_eq!(pair, CredentialPair::new("a2", "r1"));

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file store snapshot {}: {e}", path.display())
		});
	}

	#[test]
	fn clear_removes_both_keys_on_disk() {
		let path = temp_path();
		let store = FileStore::open(&path).expect("Failed to open file store snapshot.");
		let rt = Runtime::new().expect("Failed to build Tokio runtime for file store test.");

		rt.block_on(store.set(Some("a1"), Some("r1")))
			.expect("Failed to write credentials to file store.");
		rt.block_on(store.clear()).expect("Failed to clear file store.");

		let raw = fs::read_to_string(&path).expect("Cleared snapshot should remain readable.");
		let entries: BTreeMap<String, String> =
			serde_json::from_str(&raw).expect("Cleared snapshot should be a JSON object.");

		assert!(entries.is_empty());
		assert!(
			rt.block_on(store.get()).expect("Failed to read cleared file store.").is_empty()
		);

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file store snapshot {}: {e}", path.display())
		});
	}

	#[test]
	fn open_rejects_corrupt_snapshot() {
		let path = temp_path();

		fs::write(&path, b"not json").expect("Failed to seed corrupt snapshot.");

		let err = FileStore::open(&path).expect_err("Corrupt snapshots should not load.");

		assert!(matches!(err, StoreError::Serialization { .. }));

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file store snapshot {}: {e}", path.display())
		});
	}
}

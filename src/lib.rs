//! Bearer-token HTTP client that refreshes an expired access credential exactly once, fans the
//! fresh credential out to every call that was waiting on it, and replays those calls
//! transparently.
//!
//! The moving parts, leaves first:
//!
//! - [`store::CredentialStore`] persists the access/refresh credential pair.
//! - [`transport::HttpTransport`] performs the raw HTTP exchange.
//! - [`dispatch::RequestDispatcher`] attaches `Authorization: Bearer <access>` and sends.
//! - [`refresh::RefreshCoordinator`] runs the single-flight refresh episode.
//! - [`guard::ResponseGuard`] observes `401` responses, drives the coordinator, and replays the
//!   original call once.
//! - [`session::SessionClient`] ties everything to a base URL with sign-in/sign-out helpers.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod guard;
pub mod obs;
pub mod refresh;
pub mod session;
pub mod store;
pub mod transport;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		config::ClientConfig,
		session::SessionClient,
		store::{CredentialStore, MemoryStore},
		transport::ReqwestTransport,
	};

	/// Session client type alias used by reqwest-backed integration tests.
	pub type ReqwestTestClient = SessionClient<ReqwestTransport>;

	/// Builds a config rooted at `base_url` with default endpoint paths.
	pub fn test_config(base_url: &str) -> ClientConfig {
		ClientConfig::builder(
			Url::parse(base_url).expect("Mock server base URL should parse successfully."),
		)
		.build()
		.expect("Default test configuration should validate.")
	}

	/// Constructs a [`SessionClient`] backed by an in-memory store seeded with the provided
	/// credentials.
	pub async fn build_reqwest_test_client(
		base_url: &str,
		access: &str,
		refresh: &str,
	) -> (ReqwestTestClient, Arc<MemoryStore>) {
		let store_backend = Arc::new(MemoryStore::default());

		<dyn CredentialStore>::set(store_backend.as_ref(), Some(access), Some(refresh))
			.await
			.expect("Seeding the memory store should succeed.");

		let store: Arc<dyn CredentialStore> = store_backend.clone();
		let client = ReqwestTestClient::with_transport(
			test_config(base_url),
			store,
			ReqwestTransport::default(),
		)
		.expect("Test client should build from the default configuration.");

		(client, store_backend)
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, VecDeque},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use http::{HeaderMap, HeaderValue, Method, StatusCode};
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _};

//! Demonstrates signing in, fetching the current user, and recovering from an expired access
//! credential against a mock API.
//!
//! 1. `POST api/auth/token/` trades a username/password pair for both credentials.
//! 2. `GET api/auth/me/` is rejected once the server considers `a1` expired.
//! 3. The client refreshes through `POST api/auth/token/refresh/` and replays the call with
//!    `a2` without the caller noticing.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use serde::Deserialize;
use serde_json::json;
use url::Url;
// self
use bearer_session::{
	config::ClientConfig,
	session::ReqwestSessionClient,
	store::{CredentialStore, MemoryStore},
};

#[derive(Debug, Deserialize)]
struct Me {
	username: String,
	email: String,
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let sign_in = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/api/auth/token/")
				.json_body(json!({ "username": "analyst", "password": "demo-password" }));
			then.status(200).json_body(json!({ "access": "a1", "refresh": "r1" }));
		})
		.await;
	let expired = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/auth/me/").header("authorization", "Bearer a1");
			then.status(401)
				.json_body(json!({ "detail": "Given token not valid for any token type" }));
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/api/auth/token/refresh/")
				.json_body(json!({ "refresh": "r1" }));
			then.status(200).json_body(json!({ "access": "a2" }));
		})
		.await;
	let me = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/auth/me/").header("authorization", "Bearer a2");
			then.status(200)
				.json_body(json!({ "username": "analyst", "email": "analyst@example.com" }));
		})
		.await;
	let config = ClientConfig::builder(Url::parse(&server.base_url())?).build()?;
	let store: Arc<dyn CredentialStore> = Arc::new(MemoryStore::default());
	let client = ReqwestSessionClient::new(config, store)?;
	let pair = client.sign_in("analyst", "demo-password").await?;

	println!("Signed in: {pair:?}");

	let profile: Me = client.get_json("api/auth/me/").await?;

	println!("Fetched profile for {} <{}>.", profile.username, profile.email);
	println!("Stored credentials after refresh: {:?}", client.credentials().await?);
	println!("Refresh exchanges performed: {}", client.coordinator().metrics().exchanges());

	sign_in.assert_async().await;
	expired.assert_async().await;
	refresh.assert_async().await;
	me.assert_async().await;

	client.sign_out().await?;

	println!("Signed out; authenticated = {}.", client.is_authenticated().await?);

	Ok(())
}

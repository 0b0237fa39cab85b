//! Session façade wiring the store, dispatcher, coordinator, and guard to one API base URL.

// crates.io
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	auth::CredentialPair,
	config::ClientConfig,
	dispatch::RequestDispatcher,
	error::ConfigError,
	guard::ResponseGuard,
	obs::{self, OpKind, OpRecord, OpSpan},
	refresh::{HttpRefreshExchange, RefreshCoordinator},
	store::CredentialStore,
	transport::{ApiRequest, ApiResponse, HttpTransport},
};
#[cfg(feature = "reqwest")] use crate::transport::ReqwestTransport;

#[cfg(feature = "reqwest")]
/// Session client specialized for the crate's default reqwest transport.
pub type ReqwestSessionClient = SessionClient<ReqwestTransport>;

#[derive(Serialize)]
struct SignInBody<'a> {
	username: &'a str,
	password: &'a str,
}

#[derive(Deserialize)]
struct SignInGrant {
	access: String,
	refresh: String,
}

/// Authenticated API client.
///
/// Every call made through [`send`](Self::send) and the path helpers goes through the
/// [`ResponseGuard`], so an expired access credential is refreshed once and the call replayed
/// without the caller noticing. Sign-in and the refresh exchange go straight to the transport.
pub struct SessionClient<C>
where
	C: ?Sized + HttpTransport,
{
	config: ClientConfig,
	store: Arc<dyn CredentialStore>,
	guard: ResponseGuard<C>,
	sign_in_url: Url,
}
impl<C> SessionClient<C>
where
	C: ?Sized + HttpTransport,
{
	/// Creates a client that performs every call through `transport`.
	pub fn with_transport(
		config: ClientConfig,
		store: Arc<dyn CredentialStore>,
		transport: impl Into<Arc<C>>,
	) -> Result<Self> {
		config.validate().map_err(ConfigError::from)?;

		let transport = transport.into();
		let sign_in_url = config.sign_in_url()?;
		let exchange = HttpRefreshExchange::<C>::new(transport.clone(), config.refresh_url()?);
		let coordinator = Arc::new(RefreshCoordinator::new(
			store.clone(),
			Arc::new(exchange),
			config.refresh_timeout,
		));
		let dispatcher = RequestDispatcher::new(transport, store.clone());
		let guard =
			ResponseGuard::new(dispatcher, coordinator).with_replay(config.replay_unauthorized);

		Ok(Self { config, store, guard, sign_in_url })
	}

	/// Returns the configuration the client was built with.
	pub fn config(&self) -> &ClientConfig {
		&self.config
	}

	/// Returns the guard every API call goes through.
	pub fn guard(&self) -> &ResponseGuard<C> {
		&self.guard
	}

	/// Returns the shared refresh coordinator.
	pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
		self.guard.coordinator()
	}

	/// Returns the currently stored credential pair.
	pub async fn credentials(&self) -> Result<CredentialPair> {
		Ok(self.store.get().await?)
	}

	/// Returns `true` when either credential is stored.
	pub async fn is_authenticated(&self) -> Result<bool> {
		Ok(!self.credentials().await?.is_empty())
	}

	/// Exchanges a username/password pair for both credentials and stores them.
	pub async fn sign_in(&self, username: &str, password: &str) -> Result<CredentialPair> {
		const KIND: OpKind = OpKind::SignIn;

		let span = OpSpan::new(KIND, "sign_in");
		let record = OpRecord::start(KIND);
		let result = span
			.instrument(async move {
				let request = ApiRequest::post(self.sign_in_url.clone())
					.with_json(&SignInBody { username, password })?;
				let response = self.guard.dispatcher().execute(request).await?;

				if !response.is_success() {
					return Err(Error::SignInRejected {
						status: response.status.as_u16(),
						body: response.body_preview(),
					});
				}

				let grant = response.json::<SignInGrant>()?;

				if grant.access.is_empty() || grant.refresh.is_empty() {
					return Err(Error::SignInRejected {
						status: response.status.as_u16(),
						body: response.body_preview(),
					});
				}

				self.store.set(Some(grant.access.as_str()), Some(grant.refresh.as_str())).await?;

				Ok(CredentialPair::new(grant.access, grant.refresh))
			})
			.await;

		record.finish(&result);

		result
	}

	/// Forgets both credentials.
	pub async fn sign_out(&self) -> Result<()> {
		self.store.clear().await?;
		obs::note("signed out; stored credentials cleared");

		Ok(())
	}

	/// Sends `request` through the guard.
	pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
		self.guard.execute(request).await
	}

	/// `GET` on an API path relative to the base URL.
	pub async fn get(&self, path: &str) -> Result<ApiResponse> {
		self.send(ApiRequest::get(self.config.endpoint(path)?)).await
	}

	/// `POST` of a JSON body to an API path relative to the base URL.
	pub async fn post_json<T>(&self, path: &str, body: &T) -> Result<ApiResponse>
	where
		T: ?Sized + Serialize,
	{
		let request = ApiRequest::post(self.config.endpoint(path)?).with_json(body)?;

		self.send(request).await
	}

	/// `GET` on an API path, decoding a 2xx JSON body.
	///
	/// Non-2xx statuses fail with [`Error::Status`].
	pub async fn get_json<T>(&self, path: &str) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let response = self.get(path).await?;

		if !response.is_success() {
			return Err(Error::Status { response });
		}

		response.json()
	}
}
#[cfg(feature = "reqwest")]
impl SessionClient<ReqwestTransport> {
	/// Creates a client backed by a default reqwest transport.
	pub fn new(config: ClientConfig, store: Arc<dyn CredentialStore>) -> Result<Self> {
		Self::with_transport(config, store, ReqwestTransport::default())
	}
}
impl<C> Debug for SessionClient<C>
where
	C: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionClient")
			.field("base_url", &self.config.base_url.as_str())
			.field("guard", &self.guard)
			.finish()
	}
}

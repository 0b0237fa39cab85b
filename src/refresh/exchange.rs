//! The remote refresh exchange performed by an episode leader.

// self
use crate::{
	_prelude::*,
	auth::{TokenGrant, TokenSecret},
	error::RefreshError,
	error::ConfigError,
	transport::{ApiRequest, HttpTransport},
};

/// Boxed future returned by [`RefreshExchange::exchange`].
pub type ExchangeFuture<'a> =
	Pin<Box<dyn Future<Output = Result<RefreshedCredentials, RefreshError>> + 'a + Send>>;

/// Credentials produced by a successful exchange.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefreshedCredentials {
	/// New access credential; never empty.
	pub access: TokenSecret,
	/// Rotated refresh credential, when the server issued one.
	pub refresh: Option<TokenSecret>,
}

/// Trades a refresh credential for a new access credential.
///
/// Implementations make exactly one attempt; the coordinator never retries.
pub trait RefreshExchange
where
	Self: Send + Sync,
{
	/// Performs the exchange for `refresh`, which is guaranteed non-empty.
	fn exchange<'a>(&'a self, refresh: &'a TokenSecret) -> ExchangeFuture<'a>;
}

#[derive(Serialize)]
struct RefreshBody<'a> {
	refresh: &'a str,
}

/// Default exchange: `POST {"refresh": ...}` to a fixed endpoint, expecting
/// `{"access": ..., "refresh"?: ...}`.
///
/// The call goes straight to the transport so a rejected refresh never re-enters the guard.
pub struct HttpRefreshExchange<C>
where
	C: ?Sized + HttpTransport,
{
	transport: Arc<C>,
	endpoint: Url,
}
impl<C> HttpRefreshExchange<C>
where
	C: ?Sized + HttpTransport,
{
	/// Creates an exchange that posts to `endpoint` through `transport`.
	pub fn new(transport: impl Into<Arc<C>>, endpoint: Url) -> Self {
		Self { transport: transport.into(), endpoint }
	}

	/// Returns the refresh endpoint.
	pub fn endpoint(&self) -> &Url {
		&self.endpoint
	}
}
impl<C> RefreshExchange for HttpRefreshExchange<C>
where
	C: ?Sized + HttpTransport,
{
	fn exchange<'a>(&'a self, refresh: &'a TokenSecret) -> ExchangeFuture<'a> {
		Box::pin(async move {
			let request = ApiRequest::post(self.endpoint.clone())
				.with_json(&RefreshBody { refresh: refresh.expose() })
				.map_err(encode_failure)?;
			let response = self.transport.execute(request).await?;

			if !response.is_success() {
				return Err(RefreshError::Rejected {
					status: response.status.as_u16(),
					body: response.body_preview(),
				});
			}

			let grant = response.json::<TokenGrant>().map_err(|e| {
				RefreshError::MalformedResponse {
					message: match StdError::source(&e) {
						Some(source) => source.to_string(),
						None => e.to_string(),
					},
				}
			})?;
			let access = grant.usable_access().ok_or_else(|| RefreshError::MalformedResponse {
				message: "response carried no access credential".into(),
			})?;

			Ok(RefreshedCredentials {
				access: TokenSecret::new(access),
				refresh: grant.usable_refresh().map(TokenSecret::new),
			})
		})
	}
}
fn encode_failure(e: ConfigError) -> RefreshError {
	RefreshError::Encode {
		message: match StdError::source(&e) {
			Some(source) => source.to_string(),
			None => e.to_string(),
		},
	}
}

impl<C> Debug for HttpRefreshExchange<C>
where
	C: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("HttpRefreshExchange").field("endpoint", &self.endpoint).finish()
	}
}

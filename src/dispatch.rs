//! Outbound call dispatch: attach the stored access credential, then hand the request to the
//! transport.

// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	store::CredentialStore,
	transport::{ApiRequest, ApiResponse, HttpTransport},
};

/// Sends requests with `Authorization: Bearer <access>` attached.
///
/// The dispatcher never looks at the response status; authorization failures are the
/// [`ResponseGuard`](crate::guard::ResponseGuard)'s job.
pub struct RequestDispatcher<C>
where
	C: ?Sized + HttpTransport,
{
	transport: Arc<C>,
	store: Arc<dyn CredentialStore>,
}
impl<C> RequestDispatcher<C>
where
	C: ?Sized + HttpTransport,
{
	/// Creates a dispatcher that reads credentials from `store`.
	pub fn new(transport: impl Into<Arc<C>>, store: Arc<dyn CredentialStore>) -> Self {
		Self { transport: transport.into(), store }
	}

	/// Returns the underlying transport.
	pub fn transport(&self) -> &Arc<C> {
		&self.transport
	}

	/// Attaches the currently stored access credential (if any) and sends.
	pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
		let prepared = self.prepare(request).await?;

		self.execute(prepared).await
	}

	/// Attaches `access` instead of the stored credential and sends.
	pub async fn send_with(
		&self,
		request: ApiRequest,
		access: &TokenSecret,
	) -> Result<ApiResponse> {
		self.execute(request.authorize(access)?).await
	}

	/// Attaches the currently stored access credential without sending.
	pub async fn prepare(&self, request: ApiRequest) -> Result<ApiRequest> {
		let pair = self.store.get().await?;

		Ok(request.authorize(&pair.access)?)
	}

	/// Sends an already prepared request as-is.
	pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse> {
		Ok(self.transport.execute(request).await?)
	}
}
impl<C> Clone for RequestDispatcher<C>
where
	C: ?Sized + HttpTransport,
{
	fn clone(&self) -> Self {
		Self { transport: self.transport.clone(), store: self.store.clone() }
	}
}
impl<C> Debug for RequestDispatcher<C>
where
	C: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("RequestDispatcher(..)")
	}
}

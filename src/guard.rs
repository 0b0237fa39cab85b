//! Response inspection: turn a `401` into one refresh episode and one replay.

// self
use crate::{
	_prelude::*,
	dispatch::RequestDispatcher,
	obs::{self, OpKind, OpRecord, OpSpan},
	refresh::RefreshCoordinator,
	transport::{ApiRequest, ApiResponse, HttpTransport},
};

/// Sends requests through a [`RequestDispatcher`] and recovers from expired access
/// credentials.
///
/// Every `401` on a fresh request asks the shared [`RefreshCoordinator`] for a new access
/// credential and resubmits the request exactly once. A request that was already replayed is
/// never retried again.
pub struct ResponseGuard<C>
where
	C: ?Sized + HttpTransport,
{
	dispatcher: RequestDispatcher<C>,
	coordinator: Arc<RefreshCoordinator>,
	replay_unauthorized: bool,
}
impl<C> ResponseGuard<C>
where
	C: ?Sized + HttpTransport,
{
	/// Creates a guard that replays authorization failures.
	pub fn new(dispatcher: RequestDispatcher<C>, coordinator: Arc<RefreshCoordinator>) -> Self {
		Self { dispatcher, coordinator, replay_unauthorized: true }
	}

	/// Enables or disables refresh-and-replay; when disabled every `401` surfaces as
	/// [`Error::Unauthorized`].
	pub fn with_replay(mut self, enabled: bool) -> Self {
		self.replay_unauthorized = enabled;

		self
	}

	/// Returns the dispatcher used for original and replayed submissions.
	pub fn dispatcher(&self) -> &RequestDispatcher<C> {
		&self.dispatcher
	}

	/// Returns the coordinator consulted on authorization failures.
	pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
		&self.coordinator
	}

	/// Sends `request` with the stored access credential and applies the authorization
	/// failure contract to its response.
	///
	/// Non-`401` responses are returned unchanged, whatever their status.
	pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse> {
		const KIND: OpKind = OpKind::Dispatch;

		let span = OpSpan::new(KIND, "execute");
		let record = OpRecord::start(KIND);
		let result = span
			.instrument(async move {
				let prepared = self.dispatcher.prepare(request).await?;
				let response = self.dispatcher.execute(prepared.clone()).await?;

				self.recover(prepared, response).await
			})
			.await;

		if let Some(status) = final_status(&result) {
			span.record_status(status);
		}

		record.finish(&result);

		result
	}

	/// Applies the authorization failure contract to a `response` already obtained for
	/// `request`.
	pub async fn recover(
		&self,
		request: ApiRequest,
		response: ApiResponse,
	) -> Result<ApiResponse> {
		if !response.is_unauthorized() {
			return Ok(response);
		}
		if request.marker().is_replayed() {
			return Err(Error::ReplayRejected { response });
		}
		if !self.replay_unauthorized {
			return Err(Error::Unauthorized { response });
		}

		obs::note("authorization failed; awaiting refreshed credential");

		let rejected = request.bearer_credential();
		let access = self.coordinator.obtain_fresh_access_after(rejected).await?;

		self.replay(request.replayed(&access)?).await
	}

	async fn replay(&self, request: ApiRequest) -> Result<ApiResponse> {
		const KIND: OpKind = OpKind::Replay;

		let span = OpSpan::new(KIND, "replay");
		let record = OpRecord::start(KIND);
		let result = span
			.instrument(async move {
				let response = self.dispatcher.execute(request).await?;

				if response.is_unauthorized() {
					obs::note("replayed request was rejected again");

					return Err(Error::ReplayRejected { response });
				}

				Ok(response)
			})
			.await;

		if let Some(status) = final_status(&result) {
			span.record_status(status);
		}

		record.finish(&result);

		result
	}
}

fn final_status(result: &Result<ApiResponse>) -> Option<StatusCode> {
	match result {
		Ok(response)
		| Err(Error::Unauthorized { response })
		| Err(Error::ReplayRejected { response }) => Some(response.status),
		Err(_) => None,
	}
}

impl<C> Debug for ResponseGuard<C>
where
	C: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ResponseGuard")
			.field("coordinator", &self.coordinator)
			.field("replay_unauthorized", &self.replay_unauthorized)
			.finish()
	}
}

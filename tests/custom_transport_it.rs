// std
use std::sync::atomic::{AtomicUsize, Ordering};
// self
use bearer_session::{
	_preludet::*,
	auth::CredentialPair,
	config::ClientConfig,
	error::{RefreshError, TransportError},
	session::SessionClient,
	store::{CredentialStore, MemoryStore},
	transport::{ApiRequest, ApiResponse, HttpTransport, TransportFuture},
};

#[derive(Debug)]
struct ConnectionReset;
impl Display for ConnectionReset {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "Connection reset by peer.")
	}
}
impl StdError for ConnectionReset {}

/// Rejects every API call with `401` and drops the connection on the refresh endpoint.
#[derive(Default)]
struct FlakyTransport {
	api_calls: AtomicUsize,
	refresh_calls: AtomicUsize,
}
impl HttpTransport for FlakyTransport {
	fn execute(&self, request: ApiRequest) -> TransportFuture<'_> {
		Box::pin(async move {
			if request.url.path().ends_with("/token/refresh/") {
				self.refresh_calls.fetch_add(1, Ordering::SeqCst);
				tokio::task::yield_now().await;

				return Err(TransportError::network(&request.url, ConnectionReset));
			}
			if request.url.path().ends_with("/offline/") {
				return Err(TransportError::network(&request.url, ConnectionReset));
			}

			self.api_calls.fetch_add(1, Ordering::SeqCst);

			Ok(ApiResponse::new(StatusCode::UNAUTHORIZED, ""))
		})
	}
}

fn build_client(
	transport: Arc<FlakyTransport>,
) -> (SessionClient<FlakyTransport>, Arc<MemoryStore>) {
	let config = ClientConfig::builder(
		Url::parse("https://dashboard.example.com/").expect("Fixture base URL should parse."),
	)
	.build()
	.expect("Default configuration should validate.");
	let backend = Arc::new(MemoryStore::with_pair(CredentialPair::new("a1", "r1")));
	let store: Arc<dyn CredentialStore> = backend.clone();
	let client = <SessionClient<FlakyTransport>>::with_transport(config, store, transport)
		.expect("Client should build from a valid configuration.");

	(client, backend)
}

#[tokio::test]
async fn refresh_transport_failure_fans_out_and_clears_store() {
	let transport = Arc::new(FlakyTransport::default());
	let (client, store) = build_client(transport.clone());
	let (a, b) = tokio::join!(client.get("api/etl/runs/"), client.get("api/etl/jobs/"));

	for result in [a, b] {
		match result {
			Err(Error::RefreshFailed(RefreshError::Transport { message })) => {
				assert!(message.contains("Connection reset by peer."));
				assert!(message.contains("dashboard.example.com"));
			},
			other => panic!("Unexpected result: {other:?}."),
		}
	}

	assert_eq!(transport.api_calls.load(Ordering::SeqCst), 2);
	assert_eq!(transport.refresh_calls.load(Ordering::SeqCst), 1);
	assert!(store.snapshot().is_empty());
	assert_eq!(client.coordinator().metrics().failures(), 1);
	assert_eq!(client.coordinator().metrics().joined(), 1);
}

#[tokio::test]
async fn transport_failure_on_original_call_skips_refresh() {
	let transport = Arc::new(FlakyTransport::default());
	let (client, store) = build_client(transport.clone());
	let err = client.get("api/offline/").await.expect_err("Dropped connection should surface.");

	assert!(matches!(err, Error::Transport(TransportError::Network { .. })));
	assert_eq!(transport.refresh_calls.load(Ordering::SeqCst), 0);
	assert_eq!(store.snapshot(), CredentialPair::new("a1", "r1"));
}

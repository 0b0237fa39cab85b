//! Single-flight credential refresh.
//!
//! [`RefreshCoordinator::obtain_fresh_access`] is the only way the client refreshes. The first
//! caller while the coordinator is idle becomes the episode leader and starts one remote
//! exchange (bounded by the configured timeout) on its own task. Every caller arriving while
//! that exchange is in flight is queued as a follower and receives the episode outcome, in
//! arrival order, the moment the episode resolves. Success writes the new credentials to the
//! store; failure clears it. The exchange is never retried inside an episode, and cancelling
//! the leader's call does not cancel the episode.

mod episode;
mod exchange;
mod metrics;

pub use episode::{EpisodeOutcome, EpisodeState};
pub use exchange::*;
pub use metrics::RefreshMetrics;

// crates.io
use tokio::sync::oneshot::Receiver;
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	error::RefreshError,
	obs::{self, OpKind, OpRecord, OpSpan},
	refresh::episode::{Admission, LeaderGuard, RefreshEpisode},
	store::CredentialStore,
};

/// Owns the refresh episode and fans its outcome out to every caller that needs it.
///
/// Construct one per session and share it (`Arc`) between every guard that can observe an
/// authorization failure. Episodes run on the ambient tokio runtime.
pub struct RefreshCoordinator {
	shared: Arc<EpisodeRunner>,
}
impl RefreshCoordinator {
	/// Creates an idle coordinator.
	pub fn new(
		store: Arc<dyn CredentialStore>,
		exchange: Arc<dyn RefreshExchange>,
		timeout: Duration,
	) -> Self {
		Self {
			shared: Arc::new(EpisodeRunner {
				store,
				exchange,
				timeout,
				episode: Default::default(),
				metrics: Default::default(),
			}),
		}
	}

	/// Returns whether an episode is currently in flight.
	pub fn state(&self) -> EpisodeState {
		self.shared.episode.lock().state()
	}

	/// Returns how many followers are waiting on the current episode.
	pub fn queued(&self) -> usize {
		self.shared.episode.lock().queued()
	}

	/// Returns the shared episode counters.
	pub fn metrics(&self) -> &Arc<RefreshMetrics> {
		&self.shared.metrics
	}

	/// Returns the credential store this coordinator writes to.
	pub fn store(&self) -> &Arc<dyn CredentialStore> {
		&self.shared.store
	}

	/// Returns a fresh access credential, leading a new episode or joining the running one.
	pub async fn obtain_fresh_access(&self) -> EpisodeOutcome {
		let admission = self.shared.episode.lock().admit();

		match admission {
			Admission::Leader => self.lead().await,
			Admission::Follower(rx) => {
				self.shared.metrics.record_joined();

				Self::follow(rx).await
			},
		}
	}

	/// Like [`obtain_fresh_access`](Self::obtain_fresh_access), but first checks whether the
	/// store already holds a different credential than the one that was `rejected`.
	///
	/// A call that was sent before an earlier episode rotated the credential, and whose `401`
	/// arrives after that episode resolved, is served the rotated credential instead of
	/// starting another exchange.
	pub async fn obtain_fresh_access_after(&self, rejected: &str) -> EpisodeOutcome {
		if self.state() == EpisodeState::Idle {
			let rotated = self
				.shared
				.store
				.get()
				.await
				.ok()
				.map(|pair| pair.access)
				.filter(|access| !access.is_empty() && access.expose() != rejected);

			if let Some(access) = rotated {
				self.shared.metrics.record_reused();
				obs::note("reusing credential rotated by an earlier episode");

				return Ok(access);
			}
		}

		self.obtain_fresh_access().await
	}

	async fn follow(rx: Receiver<EpisodeOutcome>) -> EpisodeOutcome {
		rx.await.unwrap_or(Err(RefreshError::Abandoned))
	}

	async fn lead(&self) -> EpisodeOutcome {
		let runner = self.shared.clone();
		// Dropping the handle detaches the task; the episode still resolves for the followers.
		let episode = tokio::spawn(async move { runner.resolve().await });

		match episode.await {
			Ok(outcome) => outcome,
			Err(e) => {
				obs::warn_with_error("refresh episode task ended without an outcome", &e);

				Err(RefreshError::Abandoned)
			},
		}
	}
}
impl Debug for RefreshCoordinator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RefreshCoordinator")
			.field("state", &self.state())
			.field("queued", &self.queued())
			.field("timeout", &self.shared.timeout)
			.finish()
	}
}

/// State shared between the coordinator and the task running the current episode.
struct EpisodeRunner {
	store: Arc<dyn CredentialStore>,
	exchange: Arc<dyn RefreshExchange>,
	timeout: Duration,
	episode: Mutex<RefreshEpisode>,
	metrics: Arc<RefreshMetrics>,
}
impl EpisodeRunner {
	async fn resolve(&self) -> EpisodeOutcome {
		const KIND: OpKind = OpKind::Refresh;

		let guard = LeaderGuard::new(&self.episode);
		let span = OpSpan::new(KIND, "obtain_fresh_access");
		let record = OpRecord::start(KIND);

		self.metrics.record_episode();

		let outcome = span.instrument(self.run()).await;

		match &outcome {
			Ok(_) => self.metrics.record_success(),
			Err(_) => self.metrics.record_failure(),
		}

		record.finish(&outcome);

		let settled = guard.resolve(&outcome);

		obs::note_count("refresh episode resolved", settled);

		outcome
	}

	async fn run(&self) -> EpisodeOutcome {
		let result = match self.store.get().await {
			Ok(current) => self.exchange_once(&current.refresh).await,
			Err(e) => Err(RefreshError::Storage { message: e.to_string() }),
		};
		let result = match result {
			Ok(fresh) => self
				.store
				.set(
					Some(fresh.access.expose()),
					fresh.refresh.as_ref().map(TokenSecret::expose),
				)
				.await
				.map(|_| fresh.access)
				.map_err(|e| RefreshError::Storage { message: e.to_string() }),
			Err(e) => Err(e),
		};

		if let Err(e) = &result {
			obs::warn_with_error("refresh episode failed; clearing stored credentials", e);

			if let Err(clear_err) = self.store.clear().await {
				obs::warn_with_error("failed to clear stored credentials", &clear_err);
			}
		}

		result
	}

	async fn exchange_once(
		&self,
		refresh: &TokenSecret,
	) -> Result<RefreshedCredentials, RefreshError> {
		if refresh.is_empty() {
			return Err(RefreshError::MissingRefreshCredential);
		}

		self.metrics.record_exchange();

		match tokio::time::timeout(self.timeout.unsigned_abs(), self.exchange.exchange(refresh))
			.await
		{
			Ok(result) => result,
			Err(_) => Err(RefreshError::TimedOut { after: self.timeout }),
		}
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// crates.io
	use tokio::sync::Notify;
	// self
	use super::*;
	use crate::{
		auth::CredentialPair,
		config::ClientConfig,
		store::{MemoryStore, StoreError, StoreFuture},
	};

	const TIMEOUT: Duration = ClientConfig::DEFAULT_REFRESH_TIMEOUT;

	struct ScriptedExchange {
		calls: AtomicUsize,
		seen: Mutex<Vec<String>>,
		gate: Option<Notify>,
		panics: bool,
		outcome: Result<RefreshedCredentials, RefreshError>,
	}
	impl ScriptedExchange {
		fn succeeding(access: &str, refresh: Option<&str>) -> Self {
			Self::with_outcome(Ok(RefreshedCredentials {
				access: TokenSecret::new(access),
				refresh: refresh.map(TokenSecret::new),
			}))
		}

		fn failing(err: RefreshError) -> Self {
			Self::with_outcome(Err(err))
		}

		fn with_outcome(outcome: Result<RefreshedCredentials, RefreshError>) -> Self {
			Self {
				calls: AtomicUsize::new(0),
				seen: Mutex::new(Vec::new()),
				gate: None,
				panics: false,
				outcome,
			}
		}

		fn gated(mut self) -> Self {
			self.gate = Some(Notify::new());

			self
		}

		fn panicking(mut self) -> Self {
			self.panics = true;

			self
		}

		fn open_gate(&self) {
			self.gate.as_ref().expect("Exchange should be gated.").notify_one();
		}

		fn calls(&self) -> usize {
			self.calls.load(Ordering::SeqCst)
		}
	}
	impl RefreshExchange for ScriptedExchange {
		fn exchange<'a>(&'a self, refresh: &'a TokenSecret) -> ExchangeFuture<'a> {
			Box::pin(async move {
				self.calls.fetch_add(1, Ordering::SeqCst);
				self.seen.lock().push(refresh.expose().to_owned());

				if let Some(gate) = &self.gate {
					gate.notified().await;
				}
				if self.panics {
					panic!("Scripted exchange failed mid-flight.");
				}

				self.outcome.clone()
			})
		}
	}

	struct ReadOnlyStore(MemoryStore);
	impl CredentialStore for ReadOnlyStore {
		fn get(&self) -> StoreFuture<'_, CredentialPair> {
			self.0.get()
		}

		fn set<'a>(
			&'a self,
			_access: Option<&'a str>,
			_refresh: Option<&'a str>,
		) -> StoreFuture<'a, ()> {
			Box::pin(async { Err(StoreError::Backend { message: "read-only".into() }) })
		}

		fn clear(&self) -> StoreFuture<'_, ()> {
			self.0.clear()
		}
	}

	fn coordinator(
		store: Arc<dyn CredentialStore>,
		exchange: Arc<ScriptedExchange>,
		timeout: Duration,
	) -> Arc<RefreshCoordinator> {
		Arc::new(RefreshCoordinator::new(store, exchange, timeout))
	}

	async fn wait_until(mut condition: impl FnMut() -> bool) {
		for _ in 0..10_000 {
			if condition() {
				return;
			}

			tokio::task::yield_now().await;
		}

		panic!("Condition was not reached while yielding.");
	}

	#[tokio::test]
	async fn concurrent_callers_share_one_exchange() {
		let store = Arc::new(MemoryStore::with_pair(CredentialPair::new("", "r1")));
		let exchange = Arc::new(ScriptedExchange::succeeding("a2", None).gated());
		let coordinator = coordinator(store.clone(), exchange.clone(), TIMEOUT);
		let leader = tokio::spawn({
			let coordinator = coordinator.clone();

			async move { coordinator.obtain_fresh_access().await }
		});

		wait_until(|| exchange.calls() == 1).await;

		let followers = (0..4)
			.map(|_| {
				let coordinator = coordinator.clone();

				tokio::spawn(async move { coordinator.obtain_fresh_access().await })
			})
			.collect::<Vec<_>>();

		wait_until(|| coordinator.queued() == 4).await;
		assert_eq!(coordinator.state(), EpisodeState::InFlight);
		exchange.open_gate();

		let leader = leader.await.expect("Leader task should not panic.");

		assert_eq!(leader.expect("Leader should obtain a credential.").expose(), "a2");

		for follower in followers {
			let outcome = follower.await.expect("Follower task should not panic.");

			assert_eq!(outcome.expect("Follower should obtain a credential.").expose(), "a2");
		}

		assert_eq!(exchange.calls(), 1);
		assert_eq!(*exchange.seen.lock(), vec!["r1".to_owned()]);
		assert_eq!(store.snapshot(), CredentialPair::new("a2", "r1"));
		assert_eq!(coordinator.state(), EpisodeState::Idle);
		assert_eq!(coordinator.metrics().episodes(), 1);
		assert_eq!(coordinator.metrics().joined(), 4);
		assert!(coordinator.metrics().last_success_at().is_some());
	}

	#[tokio::test]
	async fn failed_exchange_fails_every_caller_and_clears_store() {
		let store = Arc::new(MemoryStore::with_pair(CredentialPair::new("a1", "r1")));
		let rejection = RefreshError::Rejected { status: 401, body: "token_not_valid".into() };
		let exchange = Arc::new(ScriptedExchange::failing(rejection.clone()).gated());
		let coordinator = coordinator(store.clone(), exchange.clone(), TIMEOUT);
		let leader = tokio::spawn({
			let coordinator = coordinator.clone();

			async move { coordinator.obtain_fresh_access().await }
		});

		wait_until(|| exchange.calls() == 1).await;

		let follower = tokio::spawn({
			let coordinator = coordinator.clone();

			async move { coordinator.obtain_fresh_access().await }
		});

		wait_until(|| coordinator.queued() == 1).await;
		exchange.open_gate();

		assert_eq!(leader.await.expect("Leader task should not panic."), Err(rejection.clone()));
		assert_eq!(follower.await.expect("Follower task should not panic."), Err(rejection));
		assert!(store.snapshot().is_empty());
		assert_eq!(coordinator.metrics().failures(), 1);
	}

	#[tokio::test]
	async fn missing_refresh_credential_skips_remote_call() {
		let store = Arc::new(MemoryStore::default());
		let exchange = Arc::new(ScriptedExchange::succeeding("never", None));
		let coordinator = coordinator(store.clone(), exchange.clone(), TIMEOUT);
		let outcome = coordinator.obtain_fresh_access().await;

		assert_eq!(outcome, Err(RefreshError::MissingRefreshCredential));
		assert_eq!(exchange.calls(), 0);
		assert_eq!(coordinator.metrics().episodes(), 1);
		assert_eq!(coordinator.metrics().exchanges(), 0);
		assert!(store.snapshot().is_empty());
	}

	#[tokio::test(start_paused = true)]
	async fn hung_exchange_times_out_as_failure() {
		let store = Arc::new(MemoryStore::with_pair(CredentialPair::new("a1", "r1")));
		let exchange = Arc::new(ScriptedExchange::succeeding("late", None).gated());
		let coordinator = coordinator(store.clone(), exchange.clone(), Duration::seconds(5));
		let outcome = coordinator.obtain_fresh_access().await;

		assert_eq!(outcome, Err(RefreshError::TimedOut { after: Duration::seconds(5) }));
		assert_eq!(exchange.calls(), 1);
		assert!(store.snapshot().is_empty());
		assert_eq!(coordinator.state(), EpisodeState::Idle);
	}

	#[tokio::test]
	async fn cancelled_leader_does_not_fail_followers() {
		let store = Arc::new(MemoryStore::with_pair(CredentialPair::new("a1", "r1")));
		let exchange = Arc::new(ScriptedExchange::succeeding("a2", None).gated());
		let coordinator = coordinator(store.clone(), exchange.clone(), TIMEOUT);
		let leader = tokio::spawn({
			let coordinator = coordinator.clone();

			async move { coordinator.obtain_fresh_access().await }
		});

		wait_until(|| exchange.calls() == 1).await;

		let follower = tokio::spawn({
			let coordinator = coordinator.clone();

			async move { coordinator.obtain_fresh_access().await }
		});

		wait_until(|| coordinator.queued() == 1).await;
		leader.abort();

		assert!(leader.await.expect_err("Leader should be cancelled.").is_cancelled());
		assert_eq!(coordinator.state(), EpisodeState::InFlight);

		exchange.open_gate();

		let outcome = follower.await.expect("Follower task should not panic.");

		assert_eq!(outcome.expect("Follower should obtain a credential.").expose(), "a2");
		assert_eq!(exchange.calls(), 1);
		assert_eq!(coordinator.state(), EpisodeState::Idle);
		assert_eq!(store.snapshot(), CredentialPair::new("a2", "r1"));
	}

	#[tokio::test]
	async fn panicked_episode_is_abandoned() {
		let store = Arc::new(MemoryStore::with_pair(CredentialPair::new("a1", "r1")));
		let exchange = Arc::new(ScriptedExchange::succeeding("a2", None).gated().panicking());
		let coordinator = coordinator(store.clone(), exchange.clone(), TIMEOUT);
		let leader = tokio::spawn({
			let coordinator = coordinator.clone();

			async move { coordinator.obtain_fresh_access().await }
		});

		wait_until(|| exchange.calls() == 1).await;

		let follower = tokio::spawn({
			let coordinator = coordinator.clone();

			async move { coordinator.obtain_fresh_access().await }
		});

		wait_until(|| coordinator.queued() == 1).await;
		exchange.open_gate();

		assert_eq!(
			leader.await.expect("Leader task should not panic."),
			Err(RefreshError::Abandoned)
		);
		assert_eq!(
			follower.await.expect("Follower task should not panic."),
			Err(RefreshError::Abandoned)
		);
		assert_eq!(coordinator.state(), EpisodeState::Idle);
		assert_eq!(store.snapshot(), CredentialPair::new("a1", "r1"));
	}

	#[tokio::test]
	async fn rotated_credential_is_reused_without_new_episode() {
		let store = Arc::new(MemoryStore::with_pair(CredentialPair::new("a2", "r1")));
		let exchange = Arc::new(ScriptedExchange::succeeding("a3", None));
		let coordinator = coordinator(store.clone(), exchange.clone(), TIMEOUT);
		let reused = coordinator
			.obtain_fresh_access_after("a1")
			.await
			.expect("Rotated credential should be reused.");

		assert_eq!(reused.expose(), "a2");
		assert_eq!(exchange.calls(), 0);
		assert_eq!(coordinator.metrics().reused(), 1);

		let refreshed = coordinator
			.obtain_fresh_access_after("a2")
			.await
			.expect("Rejected current credential should trigger a refresh.");

		assert_eq!(refreshed.expose(), "a3");
		assert_eq!(exchange.calls(), 1);
	}

	#[tokio::test]
	async fn rotated_refresh_credential_is_persisted() {
		let store = Arc::new(MemoryStore::with_pair(CredentialPair::new("a1", "r1")));
		let exchange = Arc::new(ScriptedExchange::succeeding("a2", Some("r2")));
		let coordinator = coordinator(store.clone(), exchange.clone(), TIMEOUT);

		coordinator.obtain_fresh_access().await.expect("Refresh should succeed.");

		assert_eq!(store.snapshot(), CredentialPair::new("a2", "r2"));
	}

	#[tokio::test]
	async fn unwritable_store_fails_episode() {
		let backing = MemoryStore::with_pair(CredentialPair::new("a1", "r1"));
		let store = Arc::new(ReadOnlyStore(backing.clone()));
		let exchange = Arc::new(ScriptedExchange::succeeding("a2", None));
		let coordinator = coordinator(store, exchange, TIMEOUT);
		let outcome = coordinator.obtain_fresh_access().await;

		assert!(matches!(outcome, Err(RefreshError::Storage { .. })));
		assert!(backing.snapshot().is_empty());
	}
}

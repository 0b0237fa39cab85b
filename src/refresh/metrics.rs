// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::_prelude::*;

/// Thread-safe counters describing refresh episodes.
#[derive(Debug, Default)]
pub struct RefreshMetrics {
	episodes: AtomicU64,
	exchanges: AtomicU64,
	success: AtomicU64,
	failure: AtomicU64,
	joined: AtomicU64,
	reused: AtomicU64,
	last_success_at: Mutex<Option<OffsetDateTime>>,
}
impl RefreshMetrics {
	/// Returns the number of episodes led (one per `Idle -> InFlight` transition).
	pub fn episodes(&self) -> u64 {
		self.episodes.load(Ordering::Relaxed)
	}

	/// Returns the number of remote refresh exchanges issued.
	pub fn exchanges(&self) -> u64 {
		self.exchanges.load(Ordering::Relaxed)
	}

	/// Returns the number of episodes that produced a fresh access credential.
	pub fn successes(&self) -> u64 {
		self.success.load(Ordering::Relaxed)
	}

	/// Returns the number of episodes that failed.
	pub fn failures(&self) -> u64 {
		self.failure.load(Ordering::Relaxed)
	}

	/// Returns the number of callers that joined an in-flight episode as followers.
	pub fn joined(&self) -> u64 {
		self.joined.load(Ordering::Relaxed)
	}

	/// Returns the number of callers served from a credential another episode already rotated.
	pub fn reused(&self) -> u64 {
		self.reused.load(Ordering::Relaxed)
	}

	/// Returns when the last successful episode resolved.
	pub fn last_success_at(&self) -> Option<OffsetDateTime> {
		*self.last_success_at.lock()
	}

	pub(crate) fn record_episode(&self) {
		self.episodes.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_exchange(&self) {
		self.exchanges.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_success(&self) {
		self.success.fetch_add(1, Ordering::Relaxed);
		*self.last_success_at.lock() = Some(OffsetDateTime::now_utc());
	}

	pub(crate) fn record_failure(&self) {
		self.failure.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_joined(&self) {
		self.joined.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_reused(&self) {
		self.reused.fetch_add(1, Ordering::Relaxed);
	}
}

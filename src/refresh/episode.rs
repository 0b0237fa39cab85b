//! The single live refresh episode and its FIFO queue of pending callers.

// std
use std::mem;
// crates.io
use tokio::sync::oneshot::{self, Receiver, Sender};
// self
use crate::{_prelude::*, auth::TokenSecret, error::RefreshError};

/// Result every participant of an episode observes.
pub type EpisodeOutcome = Result<TokenSecret, RefreshError>;

type PendingCall = Sender<EpisodeOutcome>;

/// Observable coordinator state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EpisodeState {
	/// No refresh exchange is running.
	Idle,
	/// A leader is performing the refresh exchange.
	InFlight,
}

/// Role handed to a caller entering the coordinator.
#[derive(Debug)]
pub(crate) enum Admission {
	/// Caller owns the episode and must resolve it.
	Leader,
	/// Caller waits for the leader's outcome.
	Follower(Receiver<EpisodeOutcome>),
}

/// Mutable episode state guarded by the coordinator's lock.
#[derive(Debug, Default)]
pub(crate) struct RefreshEpisode {
	in_flight: bool,
	queue: VecDeque<PendingCall>,
}
impl RefreshEpisode {
	pub(crate) fn state(&self) -> EpisodeState {
		if self.in_flight { EpisodeState::InFlight } else { EpisodeState::Idle }
	}

	pub(crate) fn queued(&self) -> usize {
		self.queue.len()
	}

	/// Starts an episode or enqueues the caller behind the running one.
	pub(crate) fn admit(&mut self) -> Admission {
		if self.in_flight {
			let (tx, rx) = oneshot::channel();

			self.queue.push_back(tx);

			Admission::Follower(rx)
		} else {
			self.in_flight = true;

			Admission::Leader
		}
	}

	/// Flips back to idle and hands out the queue in one step.
	pub(crate) fn conclude(&mut self) -> VecDeque<PendingCall> {
		self.in_flight = false;

		mem::take(&mut self.queue)
	}
}

/// Settles every follower in arrival order; returns how many were still listening.
pub(crate) fn settle(queue: VecDeque<PendingCall>, outcome: &EpisodeOutcome) -> usize {
	queue.into_iter().filter(|pending| !pending.is_closed()).fold(0, |delivered, pending| {
		if pending.send(outcome.clone()).is_ok() { delivered + 1 } else { delivered }
	})
}

/// Resolves the episode exactly once, even if the episode task panics or is cancelled.
pub(crate) struct LeaderGuard<'a> {
	episode: &'a Mutex<RefreshEpisode>,
	armed: bool,
}
impl<'a> LeaderGuard<'a> {
	pub(crate) fn new(episode: &'a Mutex<RefreshEpisode>) -> Self {
		Self { episode, armed: true }
	}

	/// Concludes the episode with `outcome` and returns the number of followers settled.
	pub(crate) fn resolve(mut self, outcome: &EpisodeOutcome) -> usize {
		self.armed = false;

		let queue = self.episode.lock().conclude();

		settle(queue, outcome)
	}
}
impl Drop for LeaderGuard<'_> {
	fn drop(&mut self) {
		if self.armed {
			let queue = self.episode.lock().conclude();

			settle(queue, &Err(RefreshError::Abandoned));
		}
	}
}

//! Optional observability helpers for client operations.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `bearer_session.op` with the `op`,
//!   `stage` (call site), and `status` (final HTTP status, when known) fields.
//! - Enable `metrics` to increment the `bearer_session_op_total` counter for every attempt
//!   and outcome, and to record finished operations in the `bearer_session_op_seconds`
//!   histogram. Both are labeled by `op` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Operations observed by the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpKind {
	/// Sign-in exchange.
	SignIn,
	/// Guarded API call (original submission).
	Dispatch,
	/// Remote refresh exchange performed by an episode leader.
	Refresh,
	/// Resubmission after a successful refresh.
	Replay,
}
impl OpKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpKind::SignIn => "sign_in",
			OpKind::Dispatch => "dispatch",
			OpKind::Refresh => "refresh",
			OpKind::Replay => "replay",
		}
	}
}
impl Display for OpKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpOutcome {
	/// Entry to an operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl OpOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpOutcome::Attempt => "attempt",
			OpOutcome::Success => "success",
			OpOutcome::Failure => "failure",
		}
	}
}
impl Display for OpOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

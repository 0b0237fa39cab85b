//! One-shot replay marker carried alongside every outbound request.

// self
use crate::_prelude::*;

/// Records whether a request has already been replayed after a credential refresh.
///
/// The marker is immutable: replaying produces a new request carrying
/// [`RetryMarker::Replayed`], and a replayed request that is rejected again is never retried.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RetryMarker {
	/// Original submission.
	#[default]
	Fresh,
	/// Resubmission carrying a refreshed credential.
	Replayed,
}
impl RetryMarker {
	/// Returns `true` when the request has already used its single replay.
	pub const fn is_replayed(self) -> bool {
		matches!(self, Self::Replayed)
	}

	/// Returns the marker a replay of this request should carry.
	pub const fn advance(self) -> Self {
		Self::Replayed
	}

	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Fresh => "fresh",
			Self::Replayed => "replayed",
		}
	}
}
impl Display for RetryMarker {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

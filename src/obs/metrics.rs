// std
use std::time::{Duration, Instant};
// self
use crate::obs::{OpKind, OpOutcome};

/// One operation in progress.
///
/// Starting it counts the attempt; finishing it counts the outcome and records how long the
/// operation took.
#[derive(Debug)]
#[must_use = "an operation record reports nothing until it is finished"]
pub struct OpRecord {
	kind: OpKind,
	started: Instant,
}
impl OpRecord {
	/// Counts an attempt of `kind` and starts its clock.
	pub fn start(kind: OpKind) -> Self {
		record_op_outcome(kind, OpOutcome::Attempt);

		Self { kind, started: Instant::now() }
	}

	/// Returns the operation being recorded.
	pub fn kind(&self) -> OpKind {
		self.kind
	}

	/// Counts `Ok` as success and `Err` as failure, records the latency, and returns the
	/// outcome label.
	pub fn finish<T, E>(self, result: &Result<T, E>) -> OpOutcome {
		let outcome = if result.is_ok() { OpOutcome::Success } else { OpOutcome::Failure };

		record_op_outcome(self.kind, outcome);
		record_op_latency(self.kind, outcome, self.started.elapsed());

		outcome
	}
}

/// Records an operation outcome via the global metrics recorder (when enabled).
pub fn record_op_outcome(kind: OpKind, outcome: OpOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"bearer_session_op_total",
			"op" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

fn record_op_latency(kind: OpKind, outcome: OpOutcome, elapsed: Duration) {
	#[cfg(feature = "metrics")]
	{
		metrics::histogram!(
			"bearer_session_op_seconds",
			"op" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.record(elapsed.as_secs_f64());
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome, elapsed);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn finish_labels_outcome_from_result() {
		let failed = OpRecord::start(OpKind::Refresh);

		assert_eq!(failed.kind(), OpKind::Refresh);
		assert_eq!(failed.finish::<(), _>(&Err("rejected")), OpOutcome::Failure);
		assert_eq!(OpRecord::start(OpKind::Replay).finish::<_, ()>(&Ok(7)), OpOutcome::Success);
	}
}

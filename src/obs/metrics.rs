// self
use crate::obs::{FlowKind, FlowOutcome};

/// Counter incremented once per flow outcome.
pub const FLOW_COUNTER: &str = "oauth2_implicit_flow_total";

/// Increments [`FLOW_COUNTER`] labeled with `flow` and `outcome`; a no-op without `metrics`.
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	metrics::counter!(FLOW_COUNTER, "flow" => kind.as_str(), "outcome" => outcome.as_str())
		.increment(1);
	#[cfg(not(feature = "metrics"))]
	let _ = (kind, outcome);
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn outcomes_follow_results() {
		assert_eq!(FlowOutcome::of::<(), ()>(&Ok(())), FlowOutcome::Success);
		assert_eq!(FlowOutcome::of::<(), ()>(&Err(())), FlowOutcome::Failure);

		for outcome in [FlowOutcome::Attempt, FlowOutcome::Joined, FlowOutcome::Failure] {
			record_flow_outcome(FlowKind::SilentRenewal, outcome);
		}
	}
}

//! Counters and histograms, compiled to no-ops without the `metrics` feature.

// std
use std::time::Duration as StdDuration;
// self
use crate::obs::{FlowKind, FlowOutcome};

pub(super) fn record_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"oauth2_bff_flow_total",
			"flow" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}
	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

pub(super) fn record_duration(kind: FlowKind, outcome: FlowOutcome, elapsed: StdDuration) {
	#[cfg(feature = "metrics")]
	{
		metrics::histogram!(
			"oauth2_bff_flow_duration_seconds",
			"flow" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.record(elapsed.as_secs_f64());
	}
	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome, elapsed);
	}
}

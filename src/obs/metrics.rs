//! `oidc_rest_client_flow_total` counter.

// self
use crate::obs::{FlowKind, FlowOutcome};

/// Counts one step of a token grant.
///
/// Token flows record an `attempt` when a request to the identity provider starts and then
/// exactly one of `success` or `failure`; cache hits record nothing. Without the `metrics`
/// feature this compiles to nothing.
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"oidc_rest_client_flow_total",
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

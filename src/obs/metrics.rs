// self
use crate::{
	obs::{Outcome, Stage},
	policy::AuthPolicy,
};

/// Records a stage outcome via the global metrics recorder (when enabled).
pub fn record_outcome(stage: Stage, outcome: Outcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"session_gateway_call_total",
			"stage" => stage.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (stage, outcome);
	}
}

/// Records the policy chosen for a 401/403 response (when enabled).
pub fn record_auth_policy(policy: AuthPolicy, status: u16) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("session_gateway_auth_policy_total", "policy" => policy.as_str())
			.increment(1);
	}
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(policy = policy.as_str(), status, "Auth failure classified.");
	}

	#[cfg(not(any(feature = "metrics", feature = "tracing")))]
	{
		let _ = (policy, status);
	}
}

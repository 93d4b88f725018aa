//! Auth-failure classification as an ordered, data-driven rule table.
//!
//! Rules are evaluated top to bottom and the first match wins. Domain exemptions sit above the
//! generic refresh rule so anonymous reads of public content never trigger a refresh.

// self
use crate::_prelude::*;

/// Policy applied to a 401/403 response.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthPolicy {
	/// Clear the secondary session only and reject.
	SessionExempt,
	/// Reject without refreshing; the failure came from the auth endpoints or the login page.
	AuthEndpointPassthrough,
	/// Reject without refreshing; 401 on public content means "no content".
	PublicReadPassthrough,
	/// Hand off to the refresh coordinator.
	RefreshEligible,
	/// Clear the primary session, navigate to login, and reject.
	ForcedLogout,
}
impl AuthPolicy {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			AuthPolicy::SessionExempt => "session_exempt",
			AuthPolicy::AuthEndpointPassthrough => "auth_endpoint_passthrough",
			AuthPolicy::PublicReadPassthrough => "public_read_passthrough",
			AuthPolicy::RefreshEligible => "refresh_eligible",
			AuthPolicy::ForcedLogout => "forced_logout",
		}
	}
}
impl Display for AuthPolicy {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Facts about a failed call that rules can match on.
#[derive(Clone, Copy, Debug)]
pub struct FailureContext<'a> {
	/// HTTP status of the response.
	pub status: u16,
	/// Full request URL.
	pub url: &'a str,
	/// Route the user is currently on, when known.
	pub current_route: Option<&'a str>,
	/// Whether the descriptor was already resent after a refresh.
	pub retried: bool,
}

/// Condition part of a [`PolicyRule`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RuleCondition {
	/// Matches every failure with the rule's status.
	Always,
	/// URL contains any of the needles.
	UrlContainsAny(Vec<String>),
	/// URL contains any of the needles and none of the exclusions.
	UrlContainsAnyExcept {
		/// Substrings that select the rule.
		needles: Vec<String>,
		/// Substrings that veto the rule.
		exclusions: Vec<String>,
	},
	/// URL contains any of the needles, or the current route equals one of the routes.
	UrlOrRoute {
		/// Substrings matched against the URL.
		needles: Vec<String>,
		/// Routes compared for equality with the current route.
		routes: Vec<String>,
	},
	/// Descriptor has not been retried yet.
	NotRetried,
}
impl RuleCondition {
	fn matches(&self, ctx: &FailureContext) -> bool {
		match self {
			Self::Always => true,
			Self::UrlContainsAny(needles) => contains_any(ctx.url, needles),
			Self::UrlContainsAnyExcept { needles, exclusions } =>
				contains_any(ctx.url, needles) && !contains_any(ctx.url, exclusions),
			Self::UrlOrRoute { needles, routes } =>
				contains_any(ctx.url, needles)
					|| ctx.current_route.is_some_and(|route| routes.iter().any(|r| r == route)),
			Self::NotRetried => !ctx.retried,
		}
	}
}

fn contains_any(url: &str, needles: &[String]) -> bool {
	needles.iter().any(|needle| url.contains(needle.as_str()))
}

/// One row of the classification table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PolicyRule {
	/// Status the rule applies to.
	pub status: u16,
	/// Additional condition.
	pub condition: RuleCondition,
	/// Policy returned on match.
	pub policy: AuthPolicy,
}
impl PolicyRule {
	/// Creates a rule.
	pub fn new(status: u16, condition: RuleCondition, policy: AuthPolicy) -> Self {
		Self { status, condition, policy }
	}

	/// Returns `true` when the rule applies to `ctx`.
	pub fn matches(&self, ctx: &FailureContext) -> bool {
		self.status == ctx.status && self.condition.matches(ctx)
	}
}

/// URL fragments and routes feeding the default rule table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EndpointPatterns {
	/// Comment-subsystem paths served under the secondary identity.
	pub comment_paths: Vec<String>,
	/// Login, refresh, and logout endpoint paths.
	pub auth_paths: Vec<String>,
	/// Routes on which a 401 never triggers a refresh.
	pub login_routes: Vec<String>,
	/// Public content-listing paths.
	pub public_listing_paths: Vec<String>,
	/// Fragments marking draft-only paths, which are excluded from the public listing rule.
	pub draft_markers: Vec<String>,
}
impl Default for EndpointPatterns {
	fn default() -> Self {
		fn owned(items: &[&str]) -> Vec<String> {
			items.iter().map(|item| (*item).to_owned()).collect()
		}

		Self {
			comment_paths: owned(&["/comments"]),
			auth_paths: owned(&["/users/login", "/users/refresh", "/users/logout"]),
			login_routes: owned(&["/login"]),
			public_listing_paths: owned(&["/posts/list", "/posts/search", "/tags"]),
			draft_markers: owned(&["draft"]),
		}
	}
}

/// Ordered rule table deciding how a 401/403 is handled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EndpointClassifier {
	rules: Vec<PolicyRule>,
}
impl EndpointClassifier {
	/// Uses `rules` verbatim; evaluation follows their order.
	pub fn new(rules: Vec<PolicyRule>) -> Self {
		Self { rules }
	}

	/// Builds the standard table from `patterns`.
	pub fn from_patterns(patterns: &EndpointPatterns) -> Self {
		const UNAUTHORIZED: u16 = 401;
		const FORBIDDEN: u16 = 403;

		Self::new(vec![
			PolicyRule::new(
				UNAUTHORIZED,
				RuleCondition::UrlContainsAny(patterns.comment_paths.clone()),
				AuthPolicy::SessionExempt,
			),
			PolicyRule::new(
				UNAUTHORIZED,
				RuleCondition::UrlOrRoute {
					needles: patterns.auth_paths.clone(),
					routes: patterns.login_routes.clone(),
				},
				AuthPolicy::AuthEndpointPassthrough,
			),
			PolicyRule::new(
				UNAUTHORIZED,
				RuleCondition::UrlContainsAnyExcept {
					needles: patterns.public_listing_paths.clone(),
					exclusions: patterns.draft_markers.clone(),
				},
				AuthPolicy::PublicReadPassthrough,
			),
			PolicyRule::new(UNAUTHORIZED, RuleCondition::NotRetried, AuthPolicy::RefreshEligible),
			PolicyRule::new(FORBIDDEN, RuleCondition::Always, AuthPolicy::ForcedLogout),
			PolicyRule::new(UNAUTHORIZED, RuleCondition::Always, AuthPolicy::ForcedLogout),
		])
	}

	/// Returns the rows in evaluation order.
	pub fn rules(&self) -> &[PolicyRule] {
		&self.rules
	}

	/// Returns the first matching policy, or `None` when no rule covers the failure.
	pub fn classify(&self, ctx: &FailureContext) -> Option<AuthPolicy> {
		self.rules.iter().find(|rule| rule.matches(ctx)).map(|rule| rule.policy)
	}
}
impl Default for EndpointClassifier {
	fn default() -> Self {
		Self::from_patterns(&EndpointPatterns::default())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn ctx(status: u16, url: &str) -> FailureContext<'_> {
		FailureContext { status, url, current_route: Some("/"), retried: false }
	}

	#[test]
	fn default_table_follows_priority_order() {
		let classifier = EndpointClassifier::default();
		let cases = [
			(401, "https://api.test/v1/comments/7", AuthPolicy::SessionExempt),
			(401, "https://api.test/v1/users/refresh", AuthPolicy::AuthEndpointPassthrough),
			(401, "https://api.test/v1/users/login", AuthPolicy::AuthEndpointPassthrough),
			(401, "https://api.test/v1/posts/list?page=1", AuthPolicy::PublicReadPassthrough),
			(401, "https://api.test/v1/posts/list/draft", AuthPolicy::RefreshEligible),
			(401, "https://api.test/v1/posts/42", AuthPolicy::RefreshEligible),
			(403, "https://api.test/v1/comments/7", AuthPolicy::ForcedLogout),
			(403, "https://api.test/v1/posts/list", AuthPolicy::ForcedLogout),
		];

		for (status, url, expected) in cases {
			assert_eq!(classifier.classify(&ctx(status, url)), Some(expected), "{status} {url}");
		}
	}

	#[test]
	fn login_route_suppresses_refresh() {
		let classifier = EndpointClassifier::default();
		let failure = FailureContext { current_route: Some("/login"), ..ctx(401, "/v1/posts/42") };

		assert_eq!(classifier.classify(&failure), Some(AuthPolicy::AuthEndpointPassthrough));
	}

	#[test]
	fn retried_descriptors_are_logged_out() {
		let classifier = EndpointClassifier::default();
		let failure = FailureContext { retried: true, ..ctx(401, "/v1/posts/42") };

		assert_eq!(classifier.classify(&failure), Some(AuthPolicy::ForcedLogout));
	}

	#[test]
	fn other_statuses_are_unclassified() {
		let classifier = EndpointClassifier::default();

		assert_eq!(classifier.classify(&ctx(500, "/v1/posts/42")), None);
		assert_eq!(classifier.classify(&ctx(404, "/v1/comments/1")), None);
	}

	#[test]
	fn patterns_deserialize_with_defaults() {
		let patterns: EndpointPatterns =
			serde_json::from_str(r#"{"commentPaths":["/discussions"]}"#)
				.expect("Partial pattern document should deserialize.");
		let classifier = EndpointClassifier::from_patterns(&patterns);

		assert_eq!(patterns.auth_paths, EndpointPatterns::default().auth_paths);
		assert_eq!(
			classifier.classify(&ctx(401, "/v1/discussions/3")),
			Some(AuthPolicy::SessionExempt),
		);
		assert_eq!(classifier.classify(&ctx(401, "/v1/comments/3")), Some(AuthPolicy::RefreshEligible));
		assert_eq!(classifier.rules().len(), 6);
	}
}

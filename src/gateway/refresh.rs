//! Single-flight session refresh.
//!
//! The first caller that needs a new access token becomes the leader: it flips the coordinator to
//! refreshing, calls the refresh endpoint directly through the transport, rotates the stored
//! credentials, and settles every caller that queued behind it with the same outcome. The
//! check-and-set happens under a short synchronous lock before the first `.await`, so two refresh
//! calls can never overlap. A leader dropped mid-refresh settles its queue with
//! [`RefreshFailure::Abandoned`].

mod metrics;

pub use metrics::RefreshMetrics;

// std
use std::mem;
// crates.io
use tokio::sync::oneshot;
// self
use crate::{
	_prelude::*,
	auth::{CredentialPair, TokenSecret},
	envelope,
	error::{RefreshFailure, StatusError},
	gateway::Gateway,
	obs::{self, CallSpan, Outcome, Stage},
	policy::AuthPolicy,
	store::CompareAndSwapOutcome,
	transport::{ApiRequest, HttpTransport},
};

/// Outcome shared by the leader with every queued caller.
pub type RefreshOutcome = Result<TokenSecret, RefreshFailure>;

#[derive(Debug, Default)]
struct RefreshState {
	refreshing: bool,
	waiters: VecDeque<oneshot::Sender<RefreshOutcome>>,
}

/// Coordinates refreshes so at most one refresh call is in flight.
#[derive(Debug, Default)]
pub struct RefreshCoordinator {
	state: Mutex<RefreshState>,
	metrics: RefreshMetrics,
}
impl RefreshCoordinator {
	/// Joins the current refresh or starts a new one.
	pub fn begin(&self) -> RefreshTicket<'_> {
		let mut state = self.state.lock();

		if state.refreshing {
			let (tx, rx) = oneshot::channel();

			state.waiters.push_back(tx);
			self.metrics.record_queued();

			return RefreshTicket::Follower(PendingCall(rx));
		}

		state.refreshing = true;
		self.metrics.record_attempt();

		RefreshTicket::Leader(RefreshLease { coordinator: self, settled: false })
	}

	/// Returns `true` while a leader holds the refresh.
	pub fn is_refreshing(&self) -> bool {
		self.state.lock().refreshing
	}

	/// Returns how many callers are queued behind the current refresh.
	pub fn pending(&self) -> usize {
		self.state.lock().waiters.len()
	}

	/// Returns the refresh counters.
	pub fn metrics(&self) -> &RefreshMetrics {
		&self.metrics
	}

	fn settle(&self, outcome: &RefreshOutcome) {
		let waiters = {
			let mut state = self.state.lock();

			state.refreshing = false;

			mem::take(&mut state.waiters)
		};

		for waiter in waiters {
			// A closed receiver means the caller stopped waiting.
			let _ = waiter.send(outcome.clone());
		}
	}
}

/// Role assigned by [`RefreshCoordinator::begin`].
#[derive(Debug)]
pub enum RefreshTicket<'a> {
	/// The caller must perform the refresh and settle the lease.
	Leader(RefreshLease<'a>),
	/// A refresh is already running; wait for its outcome.
	Follower(PendingCall),
}

/// Leadership over the in-flight refresh.
#[derive(Debug)]
#[must_use = "dropping a lease settles queued callers as abandoned"]
pub struct RefreshLease<'a> {
	coordinator: &'a RefreshCoordinator,
	settled: bool,
}
impl RefreshLease<'_> {
	/// Publishes `outcome` to every queued caller and returns the coordinator to idle.
	pub fn settle(mut self, outcome: &RefreshOutcome) {
		self.settled = true;

		match outcome {
			Ok(_) => self.coordinator.metrics.record_success(),
			Err(_) => self.coordinator.metrics.record_failure(),
		}

		self.coordinator.settle(outcome);
	}
}
impl Drop for RefreshLease<'_> {
	fn drop(&mut self) {
		if !self.settled {
			self.coordinator.metrics.record_failure();
			self.coordinator.settle(&Err(RefreshFailure::Abandoned));
		}
	}
}

/// Caller queued behind an in-flight refresh.
#[derive(Debug)]
pub struct PendingCall(oneshot::Receiver<RefreshOutcome>);
impl PendingCall {
	/// Waits for the leader's outcome.
	pub async fn wait(self) -> RefreshOutcome {
		self.0.await.unwrap_or(Err(RefreshFailure::Abandoned))
	}
}

/// Token fields of a refresh response, wrapped or bare.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshedTokens {
	access_token: String,
	#[serde(default)]
	refresh_token: Option<String>,
}
impl RefreshedTokens {
	fn parse(status: u16, body: Value) -> Result<Self, RefreshFailure> {
		let payload = envelope::unwrap(body).map_err(|err| {
			RefreshFailure::Rejected(StatusError { status, message: err.to_string() })
		})?;
		let payload = match payload {
			Value::Object(mut map)
				if !map.contains_key("accessToken")
					&& map.get("data").is_some_and(Value::is_object) =>
				map.remove("data").unwrap_or(Value::Null),
			payload => payload,
		};

		serde_path_to_error::deserialize(payload)
			.map_err(|e| RefreshFailure::MalformedResponse { message: e.to_string() })
	}
}

impl<T> Gateway<T>
where
	T: ?Sized + HttpTransport,
{
	/// Obtains a fresh access token for a call that failed with `failure`.
	///
	/// Leaders that fail clear the session and reject with the original 401; queued callers
	/// reject with the shared [`RefreshFailure`]. The coordinator stays busy until the session is
	/// cleared, so callers failing in the meantime queue behind the failed refresh instead of
	/// starting another one with the rejected refresh token.
	pub(crate) async fn recover_session(&self, failure: StatusError) -> Result<TokenSecret> {
		match self.refresh.begin() {
			RefreshTicket::Follower(pending) => pending.wait().await.map_err(Error::RefreshFailed),
			RefreshTicket::Leader(lease) => {
				let outcome = self.perform_refresh().await;
				// Another sign-in or sign-out owns the store after `SessionEnded`; leave it alone.
				let forced_logout = outcome
					.as_ref()
					.is_err_and(|reason| *reason != RefreshFailure::SessionEnded);

				if forced_logout {
					self.force_logout().await;
				}

				lease.settle(&outcome);

				match outcome {
					Ok(token) => Ok(token),
					Err(_) if forced_logout =>
						Err(Error::Unauthorized { policy: AuthPolicy::ForcedLogout, source: failure }),
					Err(_) =>
						Err(Error::Unauthorized { policy: AuthPolicy::RefreshEligible, source: failure }),
				}
			},
		}
	}

	async fn perform_refresh(&self) -> RefreshOutcome {
		const STAGE: Stage = Stage::Refresh;

		let span = CallSpan::new(STAGE, "perform_refresh");

		obs::record_outcome(STAGE, Outcome::Attempt);

		let outcome = span.instrument(self.refresh_once()).await;

		match &outcome {
			Ok(_) => obs::record_outcome(STAGE, Outcome::Success),
			Err(_) => obs::record_outcome(STAGE, Outcome::Failure),
		}

		outcome
	}

	async fn refresh_once(&self) -> RefreshOutcome {
		let refresh_token = self
			.credentials
			.refresh_token()
			.await
			.map_err(RefreshFailure::Storage)?
			.ok_or(RefreshFailure::MissingRefreshToken)?;
		let request = ApiRequest::post(self.refresh_url.clone())
			.with_json(serde_json::json!({ "refreshToken": refresh_token.expose() }));
		let call = self.transport.execute(request);
		let response = match self.config.refresh_timeout() {
			Some(limit) =>
				tokio::time::timeout(limit, call).await.map_err(|_| RefreshFailure::TimedOut)?,
			None => call.await,
		}
		.map_err(|e| RefreshFailure::Transport { message: e.to_string() })?;
		let status = response.status.as_u16();

		if !response.status.is_success() {
			return Err(RefreshFailure::Rejected(StatusError::new(status, &response.body)));
		}

		let tokens = RefreshedTokens::parse(status, response.body)?;
		let pair = CredentialPair::new(
			tokens.access_token,
			tokens.refresh_token.unwrap_or_else(|| refresh_token.expose().to_owned()),
		);

		match self
			.credentials
			.rotate(refresh_token.expose(), &pair)
			.await
			.map_err(RefreshFailure::Storage)?
		{
			CompareAndSwapOutcome::Updated => Ok(pair.access_token),
			CompareAndSwapOutcome::Mismatch => Err(RefreshFailure::SessionEnded),
		}
	}
}

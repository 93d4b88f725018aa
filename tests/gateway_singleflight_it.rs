// std
use std::{
	collections::HashMap,
	sync::{
		Arc,
		atomic::{AtomicBool, AtomicUsize, Ordering},
	},
	time::Duration as StdDuration,
};
// crates.io
use http::{StatusCode, header::AUTHORIZATION};
use jsonwebtoken::{EncodingKey, Header};
use serde_json::{Value, json};
use time::{Duration, OffsetDateTime};
use tokio::{sync::Notify, task::JoinHandle};
use url::Url;
// self
use session_gateway::{
	auth::{CredentialPair, TokenSecret},
	error::{Error, RefreshFailure, TransportError},
	gateway::{Gateway, GatewayConfig},
	policy::AuthPolicy,
	route::MemoryNavigator,
	store::{
		CompareAndSwapOutcome, KeyValueStore, MemoryStore, StoreError, StoreFuture, StoreWrite,
	},
	transport::{ApiRequest, ApiResponse, HttpTransport, TransportFuture},
};

const REFRESH_PATH: &str = "/v1/users/refresh";
const STALE_ACCESS: &str = "access-stale";

/// Transport that parks refresh calls until the test releases them.
struct ScriptedTransport {
	gate: Notify,
	open: AtomicBool,
	refresh_calls: AtomicUsize,
	refresh_reply: ApiResponse,
	accepted_token: String,
	resource_calls: AtomicUsize,
}
impl ScriptedTransport {
	fn new(refresh_reply: ApiResponse, accepted_token: impl Into<String>) -> Arc<Self> {
		Arc::new(Self {
			gate: Notify::new(),
			open: AtomicBool::new(false),
			refresh_calls: AtomicUsize::new(0),
			refresh_reply,
			accepted_token: accepted_token.into(),
			resource_calls: AtomicUsize::new(0),
		})
	}

	fn refresh_calls(&self) -> usize {
		self.refresh_calls.load(Ordering::SeqCst)
	}

	/// Lets refresh calls answer immediately; call before any refresh starts.
	fn open_gate(&self) {
		self.open.store(true, Ordering::SeqCst);
	}
}
impl HttpTransport for ScriptedTransport {
	fn execute(&self, request: ApiRequest) -> TransportFuture<'_> {
		Box::pin(async move {
			if request.url.path() == REFRESH_PATH {
				self.refresh_calls.fetch_add(1, Ordering::SeqCst);

				if !self.open.load(Ordering::SeqCst) {
					self.gate.notified().await;
				}

				return Ok(self.refresh_reply.clone());
			}

			self.resource_calls.fetch_add(1, Ordering::SeqCst);

			let expected = format!("Bearer {}", self.accepted_token);
			let presented = request.headers.get(AUTHORIZATION).and_then(|value| value.to_str().ok());

			if presented == Some(expected.as_str()) {
				Ok(ApiResponse::new(
					StatusCode::OK,
					json!({ "result": "SUCCESS", "data": { "path": request.url.path() } }),
				))
			} else {
				Ok(ApiResponse::new(StatusCode::UNAUTHORIZED, Value::Null))
			}
		})
	}
}

/// Store whose removal-only batches (session clears) stall and optionally fail.
struct StallingStore {
	inner: MemoryStore,
	clear_delay: StdDuration,
	refuse_clears: bool,
}
impl KeyValueStore for StallingStore {
	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
		self.inner.get(key)
	}

	fn apply(&self, writes: Vec<StoreWrite>) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			if writes.iter().all(|write| matches!(write, StoreWrite::Remove { .. })) {
				tokio::time::sleep(self.clear_delay).await;

				if self.refuse_clears {
					return Err(StoreError::Backend { message: "disk unavailable".into() });
				}
			}

			self.inner.apply(writes).await
		})
	}

	fn compare_and_swap<'a>(
		&'a self,
		guard_key: &'a str,
		expected: Option<&'a str>,
		writes: Vec<StoreWrite>,
	) -> StoreFuture<'a, CompareAndSwapOutcome> {
		self.inner.compare_and_swap(guard_key, expected, writes)
	}
}

struct Harness {
	gateway: Gateway<ScriptedTransport>,
	transport: Arc<ScriptedTransport>,
	store: Arc<MemoryStore>,
	navigator: Arc<MemoryNavigator>,
}

async fn harness(transport: Arc<ScriptedTransport>, config: GatewayConfig) -> Harness {
	let store = Arc::new(MemoryStore::default());
	let backend: Arc<dyn KeyValueStore> = store.clone();

	harness_on(transport, config, store, backend).await
}

async fn stalling_harness(
	transport: Arc<ScriptedTransport>,
	clear_delay: StdDuration,
	refuse_clears: bool,
) -> Harness {
	let store = Arc::new(MemoryStore::default());
	let backend: Arc<dyn KeyValueStore> =
		Arc::new(StallingStore { inner: (*store).clone(), clear_delay, refuse_clears });

	harness_on(transport, config(), store, backend).await
}

async fn harness_on(
	transport: Arc<ScriptedTransport>,
	config: GatewayConfig,
	store: Arc<MemoryStore>,
	backend: Arc<dyn KeyValueStore>,
) -> Harness {
	let navigator = Arc::new(MemoryNavigator::at("/posts"));
	let gateway = Gateway::with_transport(config, backend, navigator.clone(), transport.clone())
		.expect("Scripted gateway configuration should be valid.");

	gateway
		.sign_in(&CredentialPair::new(STALE_ACCESS, "refresh-1"))
		.await
		.expect("Seeding the session should succeed.");

	Harness { gateway, transport, store, navigator }
}

fn config() -> GatewayConfig {
	GatewayConfig::new(Url::parse("https://api.test/").expect("Base URL should parse."))
}

fn fresh_access() -> String {
	let claims = json!({
		"sub": "user-9",
		"exp": (OffsetDateTime::now_utc() + Duration::hours(1)).unix_timestamp(),
	});

	jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(b"scripted"))
		.expect("Test token should encode.")
}

fn spawn_calls(gateway: &Gateway<ScriptedTransport>, count: usize) -> Vec<JoinHandle<Result<Value, Error>>> {
	(0..count)
		.map(|i| {
			let gateway = gateway.clone();

			tokio::spawn(async move { gateway.get(&format!("/v1/posts/{i}")).await })
		})
		.collect()
}

async fn wait_for_refresh_calls(transport: &ScriptedTransport, calls: usize) {
	tokio::time::timeout(StdDuration::from_secs(5), async {
		while transport.refresh_calls() < calls {
			tokio::time::sleep(StdDuration::from_millis(5)).await;
		}
	})
	.await
	.expect("Refresh should start.");
}

async fn wait_for_queue(gateway: &Gateway<ScriptedTransport>, followers: usize) {
	tokio::time::timeout(StdDuration::from_secs(5), async {
		while gateway.refresh_coordinator().pending() < followers {
			tokio::time::sleep(StdDuration::from_millis(5)).await;
		}
	})
	.await
	.expect("Callers should queue behind the in-flight refresh.");
}

#[tokio::test]
async fn concurrent_expiries_share_one_refresh() -> color_eyre::Result<()> {
	let access = fresh_access();
	let transport = ScriptedTransport::new(
		ApiResponse::new(
			StatusCode::OK,
			json!({ "result": "SUCCESS", "data": { "accessToken": access, "refreshToken": "refresh-2" } }),
		),
		access.clone(),
	);
	let Harness { gateway, transport, store, navigator } = harness(transport, config()).await;
	let calls = spawn_calls(&gateway, 5);

	wait_for_queue(&gateway, 4).await;

	assert!(gateway.refresh_coordinator().is_refreshing());
	assert_eq!(transport.refresh_calls(), 1);

	transport.gate.notify_one();

	for (i, call) in calls.into_iter().enumerate() {
		let payload = call.await??;

		assert_eq!(payload, json!({ "path": format!("/v1/posts/{i}") }));
	}

	assert_eq!(transport.refresh_calls(), 1);
	assert_eq!(transport.resource_calls.load(Ordering::SeqCst), 10);
	assert!(!gateway.refresh_coordinator().is_refreshing());
	assert_eq!(gateway.refresh_metrics().attempts(), 1);
	assert_eq!(gateway.refresh_metrics().queued(), 4);
	assert_eq!(gateway.refresh_metrics().successes(), 1);

	let snapshot: HashMap<_, _> = store.snapshot();

	assert_eq!(snapshot.get("accessToken"), Some(&access));
	assert_eq!(snapshot.get("refreshToken").map(String::as_str), Some("refresh-2"));
	assert_eq!(snapshot.get("userId").map(String::as_str), Some("user-9"));
	assert!(navigator.history().is_empty());

	Ok(())
}

#[tokio::test]
async fn failed_refresh_rejects_every_queued_call_once() {
	let transport = ScriptedTransport::new(
		ApiResponse::new(
			StatusCode::UNAUTHORIZED,
			json!({ "result": "ERROR", "error": { "code": "REVOKED", "message": "Refresh token revoked." } }),
		),
		"never-issued",
	);
	let Harness { gateway, transport, store, navigator } = harness(transport, config()).await;
	let calls = spawn_calls(&gateway, 4);

	wait_for_queue(&gateway, 3).await;
	transport.gate.notify_one();

	let mut forced = 0;
	let mut shared = 0;

	for call in calls {
		match call.await.expect("Call task should not panic.") {
			Err(Error::Unauthorized { policy: AuthPolicy::ForcedLogout, source }) => {
				assert_eq!(source.status, 401);

				forced += 1;
			},
			Err(Error::RefreshFailed(RefreshFailure::Rejected(source))) => {
				assert_eq!(source.message, "Refresh token revoked.");

				shared += 1;
			},
			other => panic!("Unexpected call outcome: {other:?}."),
		}
	}

	assert_eq!((forced, shared), (1, 3));
	assert_eq!(transport.refresh_calls(), 1);
	assert_eq!(gateway.refresh_metrics().failures(), 1);
	assert!(store.snapshot().is_empty());
	assert_eq!(navigator.history(), vec!["/login".to_owned()]);
}

#[tokio::test]
async fn sign_out_during_refresh_keeps_the_store_empty() {
	let access = fresh_access();
	let transport = ScriptedTransport::new(
		ApiResponse::new(StatusCode::OK, json!({ "accessToken": access, "refreshToken": "refresh-2" })),
		access,
	);
	let Harness { gateway, transport, store, navigator } = harness(transport, config()).await;
	let mut calls = spawn_calls(&gateway, 1);

	wait_for_refresh_calls(&transport, 1).await;
	gateway.sign_out().await.expect("Sign-out should succeed.");
	transport.gate.notify_one();

	let outcome = calls.remove(0).await.expect("Call task should not panic.");

	assert!(matches!(outcome, Err(Error::Unauthorized { policy: AuthPolicy::RefreshEligible, .. })));
	assert!(store.snapshot().is_empty());
	assert!(navigator.history().is_empty());
}

#[tokio::test]
async fn stalled_refresh_times_out_and_forces_logout() {
	let transport = ScriptedTransport::new(ApiResponse::new(StatusCode::OK, Value::Null), "unused");
	let Harness { gateway, transport, store, navigator } =
		harness(transport, config().with_refresh_timeout(Some(StdDuration::from_millis(50)))).await;
	let outcome = gateway.get("/v1/posts/1").await;

	assert!(matches!(outcome, Err(Error::Unauthorized { policy: AuthPolicy::ForcedLogout, .. })));
	assert_eq!(transport.refresh_calls(), 1);
	assert!(!gateway.refresh_coordinator().is_refreshing());
	assert!(store.snapshot().is_empty());
	assert_eq!(navigator.history(), vec!["/login".to_owned()]);
}

#[tokio::test]
async fn login_route_suppresses_refresh() {
	let transport = ScriptedTransport::new(ApiResponse::new(StatusCode::OK, Value::Null), "unused");
	let Harness { gateway, transport, store, navigator } = harness(transport, config()).await;

	navigator.set_route("/login");

	let outcome = gateway.get("/v1/posts/1").await;

	assert!(matches!(
		outcome,
		Err(Error::Unauthorized { policy: AuthPolicy::AuthEndpointPassthrough, .. })
	));
	assert_eq!(transport.refresh_calls(), 0);
	assert_eq!(
		store.snapshot().get("accessToken").map(String::as_str),
		Some(STALE_ACCESS),
		"Passthrough must not touch the session.",
	);

	let token = TokenSecret::new(STALE_ACCESS);

	assert_eq!(gateway.credentials.access_token().await.expect("Read should succeed."), Some(token));
}

#[tokio::test]
async fn calls_failing_during_forced_logout_join_the_failed_refresh() {
	let transport = ScriptedTransport::new(
		ApiResponse::new(
			StatusCode::UNAUTHORIZED,
			json!({ "result": "ERROR", "error": { "code": "REVOKED", "message": "Refresh token revoked." } }),
		),
		"never-issued",
	);

	transport.open_gate();

	let Harness { gateway, transport, store, navigator } =
		stalling_harness(transport, StdDuration::from_millis(200), false).await;
	let mut first = spawn_calls(&gateway, 1);

	wait_for_refresh_calls(&transport, 1).await;
	// The leader is now clearing the session through the stalled store.
	tokio::time::sleep(StdDuration::from_millis(50)).await;

	let late = gateway.get("/v1/posts/2").await;

	assert!(matches!(late, Err(Error::RefreshFailed(RefreshFailure::Rejected(_)))));
	assert!(matches!(
		first.remove(0).await.expect("Call task should not panic."),
		Err(Error::Unauthorized { policy: AuthPolicy::ForcedLogout, .. })
	));
	assert_eq!(transport.refresh_calls(), 1);
	assert_eq!(gateway.refresh_metrics().attempts(), 1);
	assert_eq!(navigator.history(), vec!["/login".to_owned()]);
	assert!(store.snapshot().is_empty());
}

#[tokio::test]
async fn comment_401_survives_a_failing_store() {
	let transport = ScriptedTransport::new(ApiResponse::new(StatusCode::OK, Value::Null), "unused");
	let Harness { gateway, transport, store, navigator } =
		stalling_harness(transport, StdDuration::ZERO, true).await;

	gateway.set_secondary_session("gh").await.expect("Secondary session write should succeed.");

	let outcome = gateway.get("/v1/comments/1").await;

	assert!(matches!(
		outcome,
		Err(Error::Unauthorized { policy: AuthPolicy::SessionExempt, source }) if source.status == 401
	));
	assert_eq!(transport.refresh_calls(), 0);
	assert_eq!(store.snapshot().get("commentSession").map(String::as_str), Some("gh"));
	assert!(navigator.history().is_empty());
}

#[tokio::test]
async fn unencodable_stored_token_is_never_sent() {
	let transport = ScriptedTransport::new(ApiResponse::new(StatusCode::OK, Value::Null), "unused");
	let Harness { gateway, transport, store, .. } = harness(transport, config()).await;

	store.set("accessToken", "line\nbreak".into()).await.expect("Seeding the token should succeed.");

	let outcome = gateway.get("/v1/posts/1").await;

	assert!(matches!(outcome, Err(Error::Transport(TransportError::InvalidCredential))));
	assert_eq!(transport.resource_calls.load(Ordering::SeqCst), 0);
	assert_eq!(transport.refresh_calls(), 0);
}

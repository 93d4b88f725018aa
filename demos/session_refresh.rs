//! Demonstrates a gateway persisting its session in a JSON file and recovering from an expired
//! access token against a mock API.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use serde_json::json;
use url::Url;
// self
use session_gateway::{
	auth::CredentialPair,
	gateway::{Gateway, GatewayConfig},
	route::MemoryNavigator,
	store::{FileStore, KeyValueStore},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let session_path = std::env::temp_dir().join("session-gateway-demo.json");
	let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(&session_path)?);
	let navigator = Arc::new(MemoryNavigator::at("/"));
	let gateway =
		Gateway::new(GatewayConfig::new(Url::parse(&server.base_url())?), store, navigator.clone())?;

	gateway.sign_in(&CredentialPair::new("demo-expired", "demo-refresh")).await?;

	server
		.mock_async(|when, then| {
			when.method(GET).path("/v1/posts/1").header("authorization", "Bearer demo-expired");
			then.status(401);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/v1/posts/1").header("authorization", "Bearer demo-fresh");
			then.status(200)
				.header("content-type", "application/json")
				.json_body(json!({ "result": "SUCCESS", "data": { "id": 1, "title": "Hello" } }));
		})
		.await;

	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/v1/users/refresh");
			then.status(200)
				.header("content-type", "application/json")
				.json_body(json!({ "accessToken": "demo-fresh", "refreshToken": "demo-refresh-2" }));
		})
		.await;
	let post = gateway.get("/v1/posts/1").await?;

	println!("Fetched post: {post}.");
	println!("Refresh calls: {}.", refresh.calls_async().await);
	println!("Session file: {}.", session_path.display());
	println!("Navigations: {:?}.", navigator.history());

	gateway.sign_out().await?;

	Ok(())
}

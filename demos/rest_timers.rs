//! Walks the rest-timer cache through a mock liftlog API: a near-expiry token is refreshed before
//! the first request, repeat reads are served from cache, and creating a preset invalidates it.

// std
use std::sync::Arc;
// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use color_eyre::Result;
use httpmock::prelude::*;
use time::{Duration, OffsetDateTime};
// self
use liftlog_client::{
	auth::{AccessToken, Session},
	cache::{NewRestTimer, RestTimers},
	config::ClientConfig,
	interceptor::{SessionClient, SessionEvent},
	store::{MemoryStore, TokenStore},
};

fn demo_token(lifetime: Duration) -> AccessToken {
	let exp = (OffsetDateTime::now_utc() + lifetime).unix_timestamp();
	let payload = URL_SAFE_NO_PAD.encode(format!(
		r#"{{"sub":"demo-user","email":"lifter@example.com","name":"Demo Lifter","exp":{exp}}}"#
	));

	AccessToken::new(format!("demo.{payload}.signature"))
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let rotated = demo_token(Duration::days(7));
	let refresh_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh");
			then.status(200).json_body(serde_json::json!({ "accessToken": rotated.expose() }));
		})
		.await;
	let list_mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/rest-timers")
				.header("authorization", format!("Bearer {}", rotated.expose()));
			then.status(200).json_body(serde_json::json!([
				{ "id": "t-1", "name": "Heavy sets", "seconds": 180 },
			]));
		})
		.await;
	let create_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/rest-timers");
			then.status(201).json_body(serde_json::json!({
				"id": "t-2",
				"name": "Supersets",
				"seconds": 60,
			}));
		})
		.await;
	let store = Arc::new(TokenStore::new(Arc::new(MemoryStore::default())));

	store.set(Session::new(demo_token(Duration::hours(1))))?;

	let config = ClientConfig::builder(server.base_url()).build()?;
	let client = Arc::new(SessionClient::new(config, store)?);
	let _session = client.subscribe(|event: &SessionEvent| println!("Session event: {event:?}."));
	let timers = RestTimers::new(client.clone());
	let _cache = timers.subscribe(|event| println!("Cache event: {event:?}."));
	let first = timers.list(false).await?;
	let cached = timers.list(false).await?;

	println!("Listed {} preset(s); repeat read matched: {}.", first.len(), first == cached);

	let created = timers.create(&NewRestTimer::new("Supersets", 60)).await?;

	println!("Created preset {} ({}s).", created.name, created.seconds);

	timers.list(false).await?;

	refresh_mock.assert_calls_async(1).await;
	list_mock.assert_calls_async(2).await;
	create_mock.assert_async().await;

	println!("Refresh calls issued by the gate: {}.", client.gate().metrics().attempts());

	Ok(())
}

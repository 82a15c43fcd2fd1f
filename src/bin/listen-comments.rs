//! Subscribes to the comment event channel and prints incoming events.
//!
//! Companion to the API server's fire-and-forget notifier; useful for
//! watching comment activity during development.

use futures::StreamExt;
use tracing_subscriber::EnvFilter;

const CHANNEL: &str = "comments";

#[tokio::main]
async fn main() {
	dotenvy::dotenv().ok();

	tracing_subscriber::fmt()
		.with_env_filter(
			EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
		)
		.init();

	let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1".to_string());

	let client = redis::Client::open(url.as_str()).expect("invalid REDIS_URL");
	let mut pubsub = client
		.get_async_pubsub()
		.await
		.expect("failed to connect to redis");

	pubsub
		.subscribe(CHANNEL)
		.await
		.expect("failed to subscribe");

	tracing::info!(channel = CHANNEL, "listening for comment events");

	let mut messages = pubsub.on_message();

	while let Some(message) = messages.next().await {
		let payload: String = match message.get_payload() {
			Ok(payload) => payload,
			Err(error) => {
				tracing::warn!(%error, "failed to read message payload");
				continue;
			}
		};

		match serde_json::from_str::<serde_json::Value>(&payload) {
			Ok(event) => {
				tracing::info!(
					comment_id = %event["id"],
					post_id = %event["post_id"],
					post_title = %event["post_title"],
					author_email = %event["author_email"],
					body = %event["body"],
					"new comment event",
				);
			}
			Err(error) => {
				tracing::warn!(%error, raw = %payload, "failed to parse message");
			}
		}
	}
}

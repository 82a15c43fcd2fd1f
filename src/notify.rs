use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Channel that comment events are published on. The `listen-comments`
/// binary subscribes to the same name.
pub const COMMENT_CHANNEL: &str = "comments";

/// Event published when a comment is created.
#[derive(Debug, Serialize, Deserialize)]
pub struct CommentEvent {
	pub id: Uuid,
	pub post_id: Uuid,
	pub post_title: String,
	pub author_id: Uuid,
	pub author_email: String,
	pub body: String,
	pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Fire-and-forget publisher for comment events.
///
/// Delivery is best-effort: every failure is logged and swallowed, nothing
/// ever reaches the API caller. When no Redis URL is configured the
/// notifier is a no-op.
#[derive(Clone)]
pub struct Notifier {
	client: Option<redis::Client>,
}

impl Notifier {
	#[must_use]
	pub fn connect(url: Option<&str>) -> Self {
		let client = url.and_then(|url| match redis::Client::open(url) {
			Ok(client) => Some(client),
			Err(error) => {
				tracing::warn!(%error, "invalid redis url, comment events disabled");
				None
			}
		});

		Self { client }
	}

	#[must_use]
	pub fn disabled() -> Self {
		Self { client: None }
	}

	pub async fn publish_comment(&self, event: CommentEvent) {
		let Some(client) = &self.client else {
			return;
		};

		let payload = match serde_json::to_string(&event) {
			Ok(payload) => payload,
			Err(error) => {
				tracing::warn!(%error, "failed to serialize comment event");
				return;
			}
		};

		let result = async {
			let mut connection = client.get_multiplexed_async_connection().await?;

			connection
				.publish::<_, _, i64>(COMMENT_CHANNEL, payload)
				.await
		}
		.await;

		match result {
			Ok(subscribers) => {
				tracing::info!(comment_id = %event.id, subscribers, "published comment event");
			}
			Err(error) => {
				tracing::warn!(comment_id = %event.id, %error, "failed to publish comment event");
			}
		}
	}
}

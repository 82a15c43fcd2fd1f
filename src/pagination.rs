use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 200;

/// This can be removed when [`serde`] supports
/// literal defaults: <https://github.com/serde-rs/serde/issues/368>
#[inline]
fn default_page_size() -> i64 {
	DEFAULT_PAGE_SIZE
}

/// Query-string input for cursor-paginated listings.
#[derive(Debug, Deserialize, Validate)]
pub struct CursorQuery {
	/// Opaque position marker from a previous page's `next` field.
	pub cursor: Option<String>,
	/// The number of items to return per page.
	#[validate(range(min = 1, max = MAX_PAGE_SIZE))]
	#[serde(default = "default_page_size")]
	pub page_size: i64,
}

/// Position in the `created_at DESC, id DESC` ordering. The id tie-break
/// keeps the cursor stable when two rows share a timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
	pub created_at: DateTime<Utc>,
	pub id: Uuid,
}

impl Cursor {
	#[must_use]
	pub fn encode(&self) -> String {
		URL_SAFE_NO_PAD.encode(format!("{}|{}", self.created_at.to_rfc3339(), self.id))
	}

	#[must_use]
	pub fn decode(raw: &str) -> Option<Self> {
		let bytes = URL_SAFE_NO_PAD.decode(raw).ok()?;
		let text = String::from_utf8(bytes).ok()?;
		let (created_at, id) = text.split_once('|')?;

		Some(Self {
			created_at: DateTime::parse_from_rfc3339(created_at)
				.ok()?
				.with_timezone(&Utc),
			id: id.parse().ok()?,
		})
	}
}

/// One page of results plus the cursor for the next one, if any.
#[derive(Debug, Serialize)]
pub struct Page<T> {
	pub results: Vec<T>,
	pub next: Option<String>,
}

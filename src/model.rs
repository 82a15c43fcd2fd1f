use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Timestamps shared by every stored entity.
///
/// `deleted_at` implements soft deletion: rows are marked, never erased,
/// and every read filters on `deleted_at IS NULL`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Timestamps {
	pub created_at: chrono::DateTime<chrono::Utc>,
	pub updated_at: chrono::DateTime<chrono::Utc>,
	pub deleted_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// A model representing a single user.
///
/// Deliberately not `Serialize`: responses that include a user go through
/// the [`Author`] and profile views so the password hash and account flags
/// can never leak into a body by accident.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
	pub id: Uuid,
	pub email: String,
	/// argon2 PHC string
	pub password_hash: String,
	pub first_name: String,
	pub last_name: String,
	pub is_active: bool,
	pub is_staff: bool,
	pub is_superuser: bool,
	pub date_joined: chrono::DateTime<chrono::Utc>,
	pub avatar: Option<String>,
	#[sqlx(flatten)]
	pub timestamps: Timestamps,
}

/// The public view of a post or comment author.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Author {
	pub id: Uuid,
	pub email: String,
	pub first_name: String,
	pub last_name: String,
	pub avatar: Option<String>,
}

#[derive(
	Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum PostStatus {
	Draft,
	Published,
}

/// A single post, owned by its author.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Post {
	pub id: Uuid,
	pub author_id: Uuid,
	pub title: String,
	/// Unique, derived from the title at creation, immutable afterwards.
	pub slug: String,
	pub body: String,
	pub category_id: Option<Uuid>,
	pub status: PostStatus,
	#[sqlx(flatten)]
	pub timestamps: Timestamps,
}

/// A comment left by a user on a post.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Comment {
	pub id: Uuid,
	pub post_id: Uuid,
	pub author_id: Uuid,
	pub body: String,
	#[sqlx(flatten)]
	pub timestamps: Timestamps,
}

/// Ownerless shared taxonomy: a post category.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Category {
	pub id: Uuid,
	pub name: String,
	pub slug: String,
	#[serde(skip)]
	#[sqlx(flatten)]
	pub timestamps: Timestamps,
}

/// Ownerless shared taxonomy: a post tag.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Tag {
	pub id: Uuid,
	pub name: String,
	pub slug: String,
	#[serde(skip)]
	#[sqlx(flatten)]
	pub timestamps: Timestamps,
}

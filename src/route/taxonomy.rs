//! Categories and tags: ownerless shared taxonomy.
//!
//! Any authenticated user may create or delete entries; there is no
//! per-entry owner to check. Deletion cascades differ: removing a category
//! clears the reference on its posts, removing a tag detaches it from
//! every post. The posts themselves are never touched.

use axum::{
	extract::{Path, State},
	http::StatusCode,
	response::IntoResponse,
	routing::get,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::{
	extract::{Json, Session},
	model::{Category, Tag},
	slug::{self, SlugTable},
	AppState, Database,
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("unknown category {0}")]
	UnknownCategory(Uuid),
	#[error("unknown tag {0}")]
	UnknownTag(Uuid),
	#[error("name already taken")]
	NameTaken,
}

impl Error {
	pub fn status(&self) -> StatusCode {
		match self {
			Self::UnknownCategory(..) | Self::UnknownTag(..) => StatusCode::NOT_FOUND,
			Self::NameTaken => StatusCode::BAD_REQUEST,
		}
	}
}

pub fn categories() -> axum::Router<AppState> {
	axum::Router::new()
		.route("/", get(list_categories).post(create_category))
		.route("/:id", axum::routing::delete(delete_category))
}

pub fn tags() -> axum::Router<AppState> {
	axum::Router::new()
		.route("/", get(list_tags).post(create_tag))
		.route("/:id", axum::routing::delete(delete_tag))
}

#[derive(Deserialize, Validate)]
pub struct CreateCategoryInput {
	#[validate(length(min = 1, max = 100))]
	pub name: String,
}

#[derive(Deserialize, Validate)]
pub struct CreateTagInput {
	#[validate(length(min = 1, max = 50))]
	pub name: String,
}

async fn list_categories(
	State(database): State<Database>,
) -> Result<impl IntoResponse, crate::Error> {
	let categories = sqlx::query_as::<_, Category>(
		"SELECT * FROM category WHERE deleted_at IS NULL ORDER BY name",
	)
	.fetch_all(&database)
	.await?;

	Ok(Json(categories))
}

async fn list_tags(State(database): State<Database>) -> Result<impl IntoResponse, crate::Error> {
	let tags = sqlx::query_as::<_, Tag>("SELECT * FROM tag WHERE deleted_at IS NULL ORDER BY name")
		.fetch_all(&database)
		.await?;

	Ok(Json(tags))
}

async fn create_category(
	State(database): State<Database>,
	_session: Session,
	Json(input): Json<CreateCategoryInput>,
) -> Result<impl IntoResponse, crate::Error> {
	let slug = slug::unique_slug(
		&database,
		SlugTable::Category,
		&slug::slugify(&input.name),
	)
	.await?;
	let now = Utc::now();

	let category = sqlx::query_as::<_, Category>(
		r"
		INSERT INTO category (id, name, slug, created_at, updated_at)
		VALUES (?, ?, ?, ?, ?)
		RETURNING *
		",
	)
	.bind(Uuid::new_v4())
	.bind(&input.name)
	.bind(&slug)
	.bind(now)
	.bind(now)
	.fetch_one(&database)
	.await
	.map_err(|e| match e {
		sqlx::Error::Database(ref d) if d.is_unique_violation() => Error::NameTaken.into(),
		e => crate::Error::Database(e),
	})?;

	Ok((StatusCode::CREATED, Json(category)))
}

async fn create_tag(
	State(database): State<Database>,
	_session: Session,
	Json(input): Json<CreateTagInput>,
) -> Result<impl IntoResponse, crate::Error> {
	let slug = slug::unique_slug(&database, SlugTable::Tag, &slug::slugify(&input.name)).await?;
	let now = Utc::now();

	let tag = sqlx::query_as::<_, Tag>(
		r"
		INSERT INTO tag (id, name, slug, created_at, updated_at)
		VALUES (?, ?, ?, ?, ?)
		RETURNING *
		",
	)
	.bind(Uuid::new_v4())
	.bind(&input.name)
	.bind(&slug)
	.bind(now)
	.bind(now)
	.fetch_one(&database)
	.await
	.map_err(|e| match e {
		sqlx::Error::Database(ref d) if d.is_unique_violation() => Error::NameTaken.into(),
		e => crate::Error::Database(e),
	})?;

	Ok((StatusCode::CREATED, Json(tag)))
}

/// Soft-deletes a category, clearing it from every referencing post.
async fn delete_category(
	State(database): State<Database>,
	_session: Session,
	Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, crate::Error> {
	let exists =
		sqlx::query_scalar::<_, i64>("SELECT 1 FROM category WHERE id = ? AND deleted_at IS NULL")
			.bind(id)
			.fetch_optional(&database)
			.await?;

	if exists.is_none() {
		return Err(Error::UnknownCategory(id).into());
	}

	let mut tx = database.begin().await?;

	sqlx::query("UPDATE post SET category_id = NULL WHERE category_id = ?")
		.bind(id)
		.execute(&mut *tx)
		.await?;

	sqlx::query("UPDATE category SET deleted_at = ? WHERE id = ?")
		.bind(Utc::now())
		.bind(id)
		.execute(&mut *tx)
		.await?;

	tx.commit().await?;

	Ok(StatusCode::NO_CONTENT)
}

/// Soft-deletes a tag, detaching it from every post.
async fn delete_tag(
	State(database): State<Database>,
	_session: Session,
	Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, crate::Error> {
	let exists = sqlx::query_scalar::<_, i64>("SELECT 1 FROM tag WHERE id = ? AND deleted_at IS NULL")
		.bind(id)
		.fetch_optional(&database)
		.await?;

	if exists.is_none() {
		return Err(Error::UnknownTag(id).into());
	}

	let mut tx = database.begin().await?;

	sqlx::query("DELETE FROM post_tag WHERE tag_id = ?")
		.bind(id)
		.execute(&mut *tx)
		.await?;

	sqlx::query("UPDATE tag SET deleted_at = ? WHERE id = ?")
		.bind(Utc::now())
		.bind(id)
		.execute(&mut *tx)
		.await?;

	tx.commit().await?;

	Ok(StatusCode::NO_CONTENT)
}

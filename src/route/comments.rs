use axum::{
	extract::{Path, State},
	http::StatusCode,
	response::IntoResponse,
	routing::patch,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::{
	extract::{Json, Session},
	model::Comment,
	policy::{self, Action, Owner},
	AppState, Database,
};

use super::posts::{authors, CommentDetail};

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("unknown comment {0}")]
	UnknownComment(Uuid),
}

impl Error {
	pub fn status(&self) -> StatusCode {
		match self {
			Self::UnknownComment(..) => StatusCode::NOT_FOUND,
		}
	}
}

pub fn routes() -> axum::Router<AppState> {
	axum::Router::new().route("/:id", patch(update_comment).delete(delete_comment))
}

#[derive(Deserialize, Validate)]
pub struct UpdateCommentInput {
	#[validate(length(min = 1))]
	pub body: String,
}

async fn fetch_comment(database: &Database, id: Uuid) -> Result<Comment, crate::Error> {
	sqlx::query_as::<_, Comment>("SELECT * FROM comment WHERE id = ? AND deleted_at IS NULL")
		.bind(id)
		.fetch_optional(database)
		.await?
		.ok_or_else(|| Error::UnknownComment(id).into())
}

/// Edits an owned comment's body.
async fn update_comment(
	State(database): State<Database>,
	session: Session,
	Path(id): Path<Uuid>,
	Json(input): Json<UpdateCommentInput>,
) -> Result<impl IntoResponse, crate::Error> {
	let comment = fetch_comment(&database, id).await?;

	if !policy::can_act(
		Some(session.user.id),
		Action::Mutate,
		Owner::User(comment.author_id),
	) {
		return Err(crate::Error::Forbidden);
	}

	let comment = sqlx::query_as::<_, Comment>(
		"UPDATE comment SET body = ?, updated_at = ? WHERE id = ? RETURNING *",
	)
	.bind(&input.body)
	.bind(Utc::now())
	.bind(comment.id)
	.fetch_one(&database)
	.await?;

	let authors = authors(&database, [comment.author_id]).await?;
	let author = authors
		.get(&comment.author_id)
		.cloned()
		.ok_or(sqlx::Error::RowNotFound)?;

	Ok(Json(CommentDetail::new(comment, author)))
}

/// Soft-deletes an owned comment.
async fn delete_comment(
	State(database): State<Database>,
	session: Session,
	Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, crate::Error> {
	let comment = fetch_comment(&database, id).await?;

	if !policy::can_act(
		Some(session.user.id),
		Action::Mutate,
		Owner::User(comment.author_id),
	) {
		return Err(crate::Error::Forbidden);
	}

	sqlx::query("UPDATE comment SET deleted_at = ? WHERE id = ?")
		.bind(Utc::now())
		.bind(comment.id)
		.execute(&database)
		.await?;

	Ok(StatusCode::NO_CONTENT)
}

use axum::{response::IntoResponse, routing::get};
use serde::Serialize;
use uuid::Uuid;

use crate::{extract::Session, AppState};

pub fn routes() -> axum::Router<AppState> {
	axum::Router::new().route("/profile", get(profile))
}

/// The authenticated user's own profile view.
#[derive(Serialize)]
pub struct Profile {
	pub id: Uuid,
	pub email: String,
	pub first_name: String,
	pub last_name: String,
	pub avatar: Option<String>,
	pub date_joined: chrono::DateTime<chrono::Utc>,
}

/// Returns the authenticated user.
async fn profile(session: Session) -> impl IntoResponse {
	tracing::debug!(user_id = %session.user.id, "profile request");

	axum::Json(Profile {
		id: session.user.id,
		email: session.user.email,
		first_name: session.user.first_name,
		last_name: session.user.last_name,
		avatar: session.user.avatar,
		date_joined: session.user.date_joined,
	})
}

#[cfg(test)]
mod test {
	use crate::test::*;

	#[sqlx::test]
	async fn test_profile_requires_authentication(pool: Database) {
		let app = app(pool);

		let response = app.get("/user/profile").await;

		assert_eq!(response.status_code(), 401);
	}

	#[sqlx::test]
	async fn test_profile_returns_own_account(pool: Database) {
		let app = app(pool);

		let token = access_token(&app, "a@x.com").await;

		let response = app
			.get("/user/profile")
			.add_header(axum::http::header::AUTHORIZATION, bearer(&token))
			.await;

		assert_eq!(response.status_code(), 200);

		let body = response.json::<Value>();

		assert_eq!(body["email"], "a@x.com");
		assert!(body.get("password_hash").is_none());
	}

	#[sqlx::test]
	async fn test_garbage_bearer_token_rejected(pool: Database) {
		let app = app(pool);

		let response = app
			.get("/user/profile")
			.add_header(axum::http::header::AUTHORIZATION, bearer("not-a-jwt"))
			.await;

		assert_eq!(response.status_code(), 401);
	}
}

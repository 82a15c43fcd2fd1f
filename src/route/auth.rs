use argon2::{
	password_hash::{rand_core::OsRng, PasswordHash, SaltString},
	Argon2, PasswordHasher, PasswordVerifier,
};
use axum::{
	body::Body,
	extract::State,
	http::{Response, StatusCode},
	response::IntoResponse,
	routing::post,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
	extract::Json,
	model,
	token::{TokenPair, TokenSigner},
	AppState,
};

pub fn routes() -> axum::Router<AppState> {
	axum::Router::new()
		.route("/register", post(register))
		.route("/token", post(login))
		.route("/token/refresh", post(refresh))
}

/// An error that can occur during authentication.
///
/// Note that the messages are presented to the client, so they should not
/// contain sensitive information. In particular, a failed login never
/// distinguishes an unknown email from a wrong password.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("invalid email or password")]
	InvalidCredentials,
	#[error("email already registered")]
	EmailTaken,
	#[error("missing bearer token")]
	MissingToken,
	#[error("unknown or inactive account")]
	UnknownUser,
	#[error("password hash error: {0}")]
	Hash(argon2::password_hash::Error),
}

impl Error {
	pub fn status(&self) -> StatusCode {
		match self {
			Self::InvalidCredentials | Self::EmailTaken => StatusCode::BAD_REQUEST,
			Self::MissingToken | Self::UnknownUser => StatusCode::UNAUTHORIZED,
			Self::Hash(..) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}
}

impl IntoResponse for Error {
	fn into_response(self) -> Response<Body> {
		crate::Error::from(self).into_response()
	}
}

#[derive(Deserialize, Validate)]
pub struct RegisterInput {
	#[validate(email)]
	pub email: String,
	#[validate(length(min = 8, max = 128))]
	pub password: String,
	#[validate(must_match(other = "password", message = "passwords must match"))]
	pub password_confirm: String,
	#[validate(length(max = 50))]
	#[serde(default)]
	pub first_name: String,
	#[validate(length(max = 50))]
	#[serde(default)]
	pub last_name: String,
}

#[derive(Deserialize, Validate)]
pub struct LoginInput {
	#[validate(email)]
	pub email: String,
	#[validate(length(min = 1))]
	pub password: String,
}

#[derive(Deserialize, Validate)]
pub struct RefreshInput {
	#[validate(length(min = 1))]
	pub refresh: String,
}

#[derive(Serialize)]
pub struct RegisterResponse {
	pub id: Uuid,
	pub email: String,
	pub tokens: TokenPair,
}

#[derive(Serialize)]
pub struct LoginResponse {
	pub email: String,
	pub access: String,
	pub refresh: String,
}

/// Well-formed argon2id hash that matches no password. Verified on the
/// absent-user branch of login so that branch costs the same as a wrong
/// password and response timing does not reveal whether an account exists.
const DUMMY_HASH: &str =
	"$argon2id$v=19$m=19456,t=2,p=1$AAAAAAAAAAAAAAAAAAAAAA$AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

fn normalize_email(email: &str) -> String {
	email.trim().to_ascii_lowercase()
}

fn hash_password(hasher: &Argon2, password: &str) -> Result<String, Error> {
	let salt = SaltString::generate(&mut OsRng);

	hasher
		.hash_password(password.as_bytes(), &salt)
		.map(|hash| hash.to_string())
		.map_err(Error::Hash)
}

/// Registers a new account, returning it with an initial token pair.
async fn register(
	State(state): State<AppState>,
	Json(input): Json<RegisterInput>,
) -> Result<impl IntoResponse, crate::Error> {
	let email = normalize_email(&input.email);
	let password_hash = hash_password(&state.hasher, &input.password)?;
	let now = Utc::now();

	let user = sqlx::query_as::<_, model::User>(
		r"
		INSERT INTO user (id, email, password_hash, first_name, last_name, date_joined, created_at, updated_at)
		VALUES (?, ?, ?, ?, ?, ?, ?, ?)
		RETURNING *
		",
	)
	.bind(Uuid::new_v4())
	.bind(&email)
	.bind(&password_hash)
	.bind(&input.first_name)
	.bind(&input.last_name)
	.bind(now)
	.bind(now)
	.bind(now)
	.fetch_one(&state.database)
	.await
	.map_err(|e| match e {
		sqlx::Error::Database(ref d) if d.is_unique_violation() => Error::EmailTaken.into(),
		e => crate::Error::Database(e),
	})?;

	let tokens = state.signer.issue(user.id)?;

	tracing::info!(user_id = %user.id, "registered account");

	Ok((
		StatusCode::CREATED,
		Json(RegisterResponse {
			id: user.id,
			email: user.email,
			tokens,
		}),
	))
}

/// Returns a token pair, assuming the credentials are valid.
async fn login(
	State(state): State<AppState>,
	Json(input): Json<LoginInput>,
) -> Result<impl IntoResponse, crate::Error> {
	let user = sqlx::query_as::<_, model::User>(
		"SELECT * FROM user WHERE email = ? AND deleted_at IS NULL AND is_active = 1",
	)
	.bind(normalize_email(&input.email))
	.fetch_optional(&state.database)
	.await?;

	let Some(user) = user else {
		let hash = PasswordHash::new(DUMMY_HASH).map_err(Error::Hash)?;
		let _ = state.hasher.verify_password(input.password.as_bytes(), &hash);

		return Err(Error::InvalidCredentials.into());
	};

	let hash = PasswordHash::new(&user.password_hash).map_err(Error::Hash)?;

	if state
		.hasher
		.verify_password(input.password.as_bytes(), &hash)
		.is_err()
	{
		return Err(Error::InvalidCredentials.into());
	}

	let tokens = state.signer.issue(user.id)?;

	Ok(Json(LoginResponse {
		email: user.email,
		access: tokens.access,
		refresh: tokens.refresh,
	}))
}

/// Exchanges a refresh token for a new pair, consuming the old one.
async fn refresh(
	State(signer): State<TokenSigner>,
	State(database): State<crate::Database>,
	Json(input): Json<RefreshInput>,
) -> Result<impl IntoResponse, crate::Error> {
	let pair = signer.rotate(&database, &input.refresh).await?;

	Ok(Json(pair))
}

#[cfg(test)]
mod test {
	use crate::test::*;

	#[sqlx::test]
	async fn test_register_returns_token_pair(pool: Database) {
		let app = app(pool);

		let response = app
			.post("/auth/register")
			.json(&json!({
				"email": "a@x.com",
				"password": "longpass1",
				"password_confirm": "longpass1",
			}))
			.await;

		assert_eq!(response.status_code(), 201);

		let body = response.json::<Value>();

		assert_eq!(body["email"], "a@x.com");
		assert!(body["tokens"]["access"].is_string());
		assert!(body["tokens"]["refresh"].is_string());
	}

	#[sqlx::test]
	async fn test_register_rejects_duplicate_email(pool: Database) {
		let app = app(pool);

		access_token(&app, "a@x.com").await;

		let response = app
			.post("/auth/register")
			.json(&json!({
				// Same address modulo case
				"email": "A@X.com",
				"password": "longpass1",
				"password_confirm": "longpass1",
			}))
			.await;

		assert_eq!(response.status_code(), 400);
	}

	#[sqlx::test]
	async fn test_register_rejects_password_mismatch(pool: Database) {
		let app = app(pool);

		let response = app
			.post("/auth/register")
			.json(&json!({
				"email": "a@x.com",
				"password": "longpass1",
				"password_confirm": "longpass2",
			}))
			.await;

		assert_eq!(response.status_code(), 400);
	}

	#[sqlx::test]
	async fn test_register_rejects_short_password(pool: Database) {
		let app = app(pool);

		let response = app
			.post("/auth/register")
			.json(&json!({
				"email": "a@x.com",
				"password": "short",
				"password_confirm": "short",
			}))
			.await;

		assert_eq!(response.status_code(), 400);
	}

	#[sqlx::test]
	async fn test_login_flow(pool: Database) {
		let app = app(pool);

		access_token(&app, "a@x.com").await;

		let response = app
			.post("/auth/token")
			.json(&json!({
				"email": "a@x.com",
				"password": "longpass1",
			}))
			.await;

		assert_eq!(response.status_code(), 200);

		let body = response.json::<Value>();

		assert!(body["access"].is_string());
		assert!(body["refresh"].is_string());
	}

	#[test]
	fn test_dummy_hash_parses_and_matches_nothing() {
		use argon2::{password_hash::PasswordHash, Argon2, PasswordVerifier};

		let hash = PasswordHash::new(super::DUMMY_HASH).unwrap();

		assert!(Argon2::default()
			.verify_password(b"longpass1", &hash)
			.is_err());
		assert!(Argon2::default().verify_password(b"", &hash).is_err());
	}

	#[sqlx::test]
	async fn test_login_failure_is_generic(pool: Database) {
		let app = app(pool);

		access_token(&app, "a@x.com").await;

		let wrong_password = app
			.post("/auth/token")
			.json(&json!({"email": "a@x.com", "password": "wrongpass1"}))
			.await;

		let unknown_email = app
			.post("/auth/token")
			.json(&json!({"email": "b@x.com", "password": "longpass1"}))
			.await;

		assert_eq!(wrong_password.status_code(), 400);
		assert_eq!(unknown_email.status_code(), 400);

		// Identical bodies: the response never reveals which part was wrong.
		assert_eq!(
			wrong_password.json::<Value>(),
			unknown_email.json::<Value>()
		);
	}

	#[sqlx::test]
	async fn test_refresh_rotation_is_single_use(pool: Database) {
		let app = app(pool);

		let response = app
			.post("/auth/register")
			.json(&json!({
				"email": "a@x.com",
				"password": "longpass1",
				"password_confirm": "longpass1",
			}))
			.await;

		let refresh = response.json::<Value>()["tokens"]["refresh"]
			.as_str()
			.unwrap()
			.to_string();

		let rotated = app
			.post("/auth/token/refresh")
			.json(&json!({"refresh": refresh}))
			.await;

		assert_eq!(rotated.status_code(), 200);
		assert!(rotated.json::<Value>()["access"].is_string());

		let replayed = app
			.post("/auth/token/refresh")
			.json(&json!({"refresh": refresh}))
			.await;

		assert_eq!(replayed.status_code(), 401);
	}

	#[sqlx::test]
	async fn test_refresh_rejects_access_token(pool: Database) {
		let app = app(pool);

		let access = access_token(&app, "a@x.com").await;

		let response = app
			.post("/auth/token/refresh")
			.json(&json!({"refresh": access}))
			.await;

		assert_eq!(response.status_code(), 401);
	}
}

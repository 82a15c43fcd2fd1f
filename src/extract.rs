use axum::{
	body::Body,
	extract::{FromRef, FromRequest, FromRequestParts, Request},
	http::{header, request, Response},
	response::IntoResponse,
};
use serde::de;

use crate::{
	model,
	route::auth,
	token::{TokenKind, TokenSigner},
	Database, Error,
};

pub const AUTHORIZATION_PREFIX: &str = "Bearer ";

/// Extractor that deserializes a JSON body and validates it.
///
/// T must implement [`serde::de::DeserializeOwned`] and [`validator::Validate`]
/// in order to be used in an extractor.
///
/// ```rust,ignore
/// async fn route(Json(user): Json<User>) {
///   // ...
/// }
/// ```
pub struct Json<T>(pub T);

impl<T> IntoResponse for Json<T>
where
	T: serde::Serialize,
{
	fn into_response(self) -> Response<Body> {
		axum::Json(self.0).into_response()
	}
}

#[axum::async_trait]
impl<T, S> FromRequest<S> for Json<T>
where
	T: de::DeserializeOwned + validator::Validate,
	S: Send + Sync,
{
	type Rejection = Error;

	async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
		let result = axum::Json::<T>::from_request(req, state).await?.0;

		result.validate()?;
		Ok(Self(result))
	}
}

/// Extractor that deserializes a query string and validates it.
///
/// This is similar to [`Json<T>`], but does not consume the body.
pub struct Query<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequestParts<S> for Query<T>
where
	T: de::DeserializeOwned + validator::Validate,
	S: Send + Sync,
{
	type Rejection = Error;

	async fn from_request_parts(
		parts: &mut request::Parts,
		state: &S,
	) -> Result<Self, Self::Rejection> {
		let result = axum::extract::Query::<T>::from_request_parts(parts, state)
			.await?
			.0;

		result.validate()?;
		Ok(Self(result))
	}
}

/// Extracts the authenticated user from a bearer access token.
///
/// Fails with 401 when the header is missing, the token is not a valid
/// access token, or the subject no longer resolves to an active account.
///
/// ```rust,ignore
/// async fn route(session: Session) {
///   println!("{:?}", session.user);
/// }
/// ```
#[derive(Debug)]
pub struct Session {
	pub user: model::User,
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Session
where
	Database: FromRef<S>,
	TokenSigner: FromRef<S>,
	S: Sync + Send,
{
	type Rejection = Error;

	async fn from_request_parts(
		parts: &mut request::Parts,
		state: &S,
	) -> Result<Self, Self::Rejection> {
		let header = parts
			.headers
			.get(header::AUTHORIZATION)
			.ok_or(auth::Error::MissingToken)?;

		let token = header
			.to_str()
			.ok()
			.and_then(|value| value.strip_prefix(AUTHORIZATION_PREFIX))
			.ok_or(crate::token::Error::Malformed)?;

		let claims = TokenSigner::from_ref(state).verify(token, TokenKind::Access)?;

		let database = Database::from_ref(state);
		let user = sqlx::query_as::<_, model::User>(
			"SELECT * FROM user WHERE id = ? AND deleted_at IS NULL AND is_active = 1",
		)
		.bind(claims.sub)
		.fetch_optional(&database)
		.await?;

		Ok(Self {
			user: user.ok_or(auth::Error::UnknownUser)?,
		})
	}
}

/// Like [`Session`], but for routes that are readable anonymously.
///
/// Absent or unusable credentials degrade to `None` rather than rejecting,
/// so an expired token browses as an anonymous visitor would.
#[derive(Debug)]
pub struct OptionalSession(pub Option<Session>);

#[axum::async_trait]
impl<S> FromRequestParts<S> for OptionalSession
where
	Database: FromRef<S>,
	TokenSigner: FromRef<S>,
	S: Sync + Send,
{
	type Rejection = Error;

	async fn from_request_parts(
		parts: &mut request::Parts,
		state: &S,
	) -> Result<Self, Self::Rejection> {
		if !parts.headers.contains_key(header::AUTHORIZATION) {
			return Ok(Self(None));
		}

		Ok(Self(Session::from_request_parts(parts, state).await.ok()))
	}
}

use axum::{
	body::Body,
	extract::rejection,
	http::{Response, StatusCode},
	response::IntoResponse,
	Json,
};
use serde::Serialize;
use tower_governor::GovernorError;

use crate::{route, token};

/// Error type for the application.
///
/// The Display trait is not sent to the client, so it can show
/// sensitive information.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("validation error: {0}")]
	Validation(#[from] validator::ValidationErrors),
	#[error("json error: {0}")]
	Json(#[from] rejection::JsonRejection),
	#[error("query error: {0}")]
	Query(#[from] rejection::QueryRejection),
	#[error("auth error: {0}")]
	Auth(#[from] route::auth::Error),
	#[error("token error: {0}")]
	Token(#[from] token::Error),
	#[error("post error: {0}")]
	Posts(#[from] route::posts::Error),
	#[error("comment error: {0}")]
	Comments(#[from] route::comments::Error),
	#[error("taxonomy error: {0}")]
	Taxonomy(#[from] route::taxonomy::Error),
	#[error("you do not own this resource")]
	Forbidden,
	#[error("too many requests")]
	TooManyRequests,
	#[error("rate limiter failure: {0}")]
	RateLimiter(&'static str),
	#[error("database error: {0}")]
	Database(#[from] sqlx::Error),
}

impl Error {
	fn status(&self) -> StatusCode {
		match self {
			Self::Validation(..) | Self::Json(..) | Self::Query(..) => StatusCode::BAD_REQUEST,
			Self::Auth(error) => error.status(),
			Self::Token(error) => error.status(),
			Self::Posts(error) => error.status(),
			Self::Comments(error) => error.status(),
			Self::Taxonomy(error) => error.status(),
			Self::Forbidden => StatusCode::FORBIDDEN,
			Self::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
			Self::RateLimiter(..) | Self::Database(..) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}
}

impl From<GovernorError> for Error {
	fn from(error: GovernorError) -> Self {
		match error {
			GovernorError::TooManyRequests { .. } => Self::TooManyRequests,
			GovernorError::UnableToExtractKey => Self::RateLimiter("unable to extract key"),
			GovernorError::Other { .. } => Self::RateLimiter("internal failure"),
		}
	}
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
	pub success: bool,
	pub errors: Vec<String>,
}

impl IntoResponse for Error {
	fn into_response(self) -> Response<Body> {
		let status = self.status();

		// Internal detail stays server-side.
		let errors = match &self {
			Error::Validation(errors) => errors
				.field_errors()
				.into_iter()
				.flat_map(|(field, errors)| {
					errors
						.iter()
						.map(move |error| format!("{field}: {error}"))
				})
				.collect(),
			Error::Json(error) => vec![error.to_string()],
			Error::Query(error) => vec![error.to_string()],
			_ if status.is_server_error() => {
				tracing::error!(error = %self, "internal error");

				Vec::new()
			}
			_ => vec![self.to_string()],
		};

		(
			status,
			Json(ErrorResponse {
				success: false,
				errors,
			}),
		)
			.into_response()
	}
}

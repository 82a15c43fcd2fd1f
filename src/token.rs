use axum::http::StatusCode;
use chrono::Utc;
use jsonwebtoken::{
	decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Database;

/// Access tokens authorize API calls and expire quickly.
pub const ACCESS_TTL_SECS: i64 = 15 * 60;
/// Refresh tokens are exchanged for a new pair and are single-use.
pub const REFRESH_TTL_SECS: i64 = 24 * 60 * 60;
/// Denylist rows are pruned this long after their token's expiry, safely
/// past the 60 second validation leeway.
const PRUNE_MARGIN_SECS: i64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
	Access,
	Refresh,
}

/// Claims carried by both token kinds.
///
/// `kind` is the discriminator that stops an access token from being
/// accepted where a refresh is required (and vice versa). `jti` identifies
/// a refresh token on the denylist once it has been rotated.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
	pub sub: Uuid,
	pub jti: Uuid,
	pub iat: i64,
	pub exp: i64,
	pub kind: TokenKind,
}

#[derive(Debug, Serialize)]
pub struct TokenPair {
	pub access: String,
	pub refresh: String,
}

/// An error that can occur while verifying or rotating a token.
///
/// Note that the messages are presented to the client, so they should not
/// contain sensitive information.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("token expired")]
	Expired,
	#[error("malformed token")]
	Malformed,
	#[error("wrong token kind")]
	WrongKind,
	#[error("refresh token has been revoked")]
	Revoked,
	#[error("token signing error: {0}")]
	Signing(jsonwebtoken::errors::Error),
	#[error("database error: {0}")]
	Database(#[from] sqlx::Error),
}

impl Error {
	pub fn status(&self) -> StatusCode {
		match self {
			Self::Expired | Self::Malformed | Self::WrongKind | Self::Revoked => {
				StatusCode::UNAUTHORIZED
			}
			Self::Signing(..) | Self::Database(..) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}
}

/// Mints, validates, and rotates the access/refresh token pair.
///
/// Constructed once in `main` from the configured secret and injected
/// through the application state.
#[derive(Clone)]
pub struct TokenSigner {
	encoding: EncodingKey,
	decoding: DecodingKey,
}

impl TokenSigner {
	pub fn new(secret: &[u8]) -> Self {
		Self {
			encoding: EncodingKey::from_secret(secret),
			decoding: DecodingKey::from_secret(secret),
		}
	}

	/// Issues a fresh access/refresh pair bound to `user_id`.
	pub fn issue(&self, user_id: Uuid) -> Result<TokenPair, Error> {
		let now = Utc::now().timestamp();

		Ok(TokenPair {
			access: self.sign(user_id, now, ACCESS_TTL_SECS, TokenKind::Access)?,
			refresh: self.sign(user_id, now, REFRESH_TTL_SECS, TokenKind::Refresh)?,
		})
	}

	fn sign(&self, user_id: Uuid, iat: i64, ttl: i64, kind: TokenKind) -> Result<String, Error> {
		let claims = Claims {
			sub: user_id,
			jti: Uuid::new_v4(),
			iat,
			exp: iat + ttl,
			kind,
		};

		encode(&Header::default(), &claims, &self.encoding).map_err(Error::Signing)
	}

	/// Verifies signature, structure, expiry, and kind.
	pub fn verify(&self, token: &str, expected: TokenKind) -> Result<Claims, Error> {
		let validation = Validation::new(Algorithm::HS256);

		let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
			match e.kind() {
				ErrorKind::ExpiredSignature => Error::Expired,
				_ => Error::Malformed,
			}
		})?;

		if data.claims.kind != expected {
			return Err(Error::WrongKind);
		}

		Ok(data.claims)
	}

	/// Exchanges a refresh token for a new pair, consuming it.
	///
	/// The denylist insert doubles as the check: the primary key on `jti`
	/// means exactly one of two concurrent rotations can succeed, and the
	/// loser observes [`Error::Revoked`]. No pair is issued unless the
	/// insert went through.
	pub async fn rotate(&self, database: &Database, token: &str) -> Result<TokenPair, Error> {
		let claims = self.verify(token, TokenKind::Refresh)?;
		let expires_at = chrono::DateTime::from_timestamp(claims.exp, 0).ok_or(Error::Malformed)?;

		// Opportunistic pruning: rows whose token is past expiry cannot
		// verify anyway. The margin stays behind the verifier's leeway so
		// a rotated token is never forgotten while it still validates.
		sqlx::query("DELETE FROM revoked_token WHERE expires_at < ?")
			.bind(Utc::now() - chrono::Duration::seconds(PRUNE_MARGIN_SECS))
			.execute(database)
			.await?;

		let inserted =
			sqlx::query("INSERT INTO revoked_token (jti, expires_at, revoked_at) VALUES (?, ?, ?)")
				.bind(claims.jti)
				.bind(expires_at)
				.bind(Utc::now())
				.execute(database)
				.await;

		match inserted {
			Ok(..) => {}
			Err(sqlx::Error::Database(ref e)) if e.is_unique_violation() => {
				return Err(Error::Revoked);
			}
			Err(e) => return Err(e.into()),
		}

		self.issue(claims.sub)
	}
}

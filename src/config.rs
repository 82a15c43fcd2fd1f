/// Process configuration, read once at startup and handed to `main`'s
/// constructed dependencies. Nothing else reads the environment.
#[derive(Debug, Clone)]
pub struct Config {
	pub database_url: String,
	/// Shared secret for signing access and refresh tokens.
	pub token_secret: String,
	/// Comment events are published here; `None` disables the notifier.
	pub redis_url: Option<String>,
	pub port: u16,
}

impl Config {
	/// Reads configuration from the environment, panicking on missing or
	/// malformed required values. Call after `dotenvy::dotenv()`.
	#[must_use]
	pub fn from_env() -> Self {
		Self {
			database_url: std::env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
			token_secret: std::env::var("TOKEN_SECRET").expect("TOKEN_SECRET must be set"),
			redis_url: std::env::var("REDIS_URL").ok(),
			port: std::env::var("PORT").map_or_else(
				|_| 3000,
				|port| port.parse().expect("PORT must be a number"),
			),
		}
	}
}

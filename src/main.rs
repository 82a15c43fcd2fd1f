#![warn(clippy::pedantic)]

mod config;
mod error;
mod extract;
mod model;
mod notify;
mod pagination;
mod policy;
mod ratelimit;
mod route;
mod slug;
mod token;

use std::net::SocketAddr;

use argon2::Argon2;
use tower_governor::GovernorLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

pub use error::Error;

pub type Database = sqlx::Pool<sqlx::Sqlite>;
pub type AppState = State;

/// The shared application state.
///
/// This contains all shared dependencies that handlers need to access:
/// the database pool, the password hash configuration, the token signer,
/// and the comment event notifier. Everything is constructed once in
/// `main` and lives for the whole process.
#[derive(Clone, axum::extract::FromRef)]
pub struct State {
	pub database: Database,
	pub hasher: Argon2<'static>,
	pub signer: token::TokenSigner,
	pub notifier: notify::Notifier,
}

#[tokio::main]
async fn main() {
	dotenvy::dotenv().ok();

	tracing_subscriber::fmt()
		.with_env_filter(
			EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
		)
		.init();

	let config = config::Config::from_env();

	let database = Database::connect(&config.database_url)
		.await
		.expect("failed to connect to database");

	sqlx::migrate!()
		.run(&database)
		.await
		.expect("failed to run migrations");

	let state = State {
		database,
		hasher: Argon2::default(),
		signer: token::TokenSigner::new(config.token_secret.as_bytes()),
		notifier: notify::Notifier::connect(config.redis_url.as_deref()),
	};

	let limit_default = ratelimit::default();
	let limit_auth = ratelimit::secure();

	ratelimit::cleanup_old_limits(&[&limit_default, &limit_auth]);

	// Ordered per request: rate limit, then authenticate (extractors),
	// then authorize, then handle.
	let app = axum::Router::new()
		.nest(
			"/auth",
			route::auth::routes().layer(GovernorLayer { config: limit_auth }),
		)
		.nest("/posts", route::posts::routes())
		.nest("/comments", route::comments::routes())
		.nest("/categories", route::taxonomy::categories())
		.nest("/tags", route::taxonomy::tags())
		.nest("/user", route::users::routes())
		.layer(GovernorLayer {
			config: limit_default,
		})
		.layer(TraceLayer::new_for_http())
		.with_state(state);

	let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
		.await
		.expect("failed to bind to port");

	tracing::info!("listening on port {}", config.port);

	axum::serve(
		listener,
		app.into_make_service_with_connect_info::<SocketAddr>(),
	)
	.await
	.unwrap();
}

use std::collections::{HashMap, HashSet};

use axum::{
	extract::{Path, State},
	http::StatusCode,
	response::IntoResponse,
	routing::get,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::QueryBuilder;
use uuid::Uuid;
use validator::Validate;

use crate::{
	extract::{Json, OptionalSession, Query, Session},
	model::{Author, Category, Comment, Post, PostStatus, Tag},
	notify::CommentEvent,
	pagination::{Cursor, CursorQuery, Page},
	policy::{self, Action, Owner},
	slug::{self, SlugTable},
	AppState, Database,
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("unknown post {0}")]
	UnknownPost(String),
	#[error("unknown category {0}")]
	UnknownCategory(Uuid),
	#[error("unknown tag {0}")]
	UnknownTag(Uuid),
	#[error("invalid pagination cursor")]
	InvalidCursor,
}

impl Error {
	pub fn status(&self) -> StatusCode {
		match self {
			Self::UnknownPost(..) => StatusCode::NOT_FOUND,
			Self::UnknownCategory(..) | Self::UnknownTag(..) | Self::InvalidCursor => {
				StatusCode::BAD_REQUEST
			}
		}
	}
}

pub fn routes() -> axum::Router<AppState> {
	axum::Router::new()
		.route("/", get(list_posts).post(create_post))
		.route(
			"/:slug",
			get(get_post).patch(update_post).delete(delete_post),
		)
		.route("/:slug/comments", get(list_comments).post(create_comment))
}

#[derive(Deserialize, Validate)]
pub struct CreatePostInput {
	#[validate(length(min = 1, max = 200))]
	pub title: String,
	#[serde(default)]
	pub body: String,
	pub category: Option<Uuid>,
	#[serde(default)]
	pub tags: Vec<Uuid>,
	pub status: Option<PostStatus>,
}

/// Partial update: only supplied fields are merged. `category` distinguishes
/// absent (keep) from `null` (clear) through the nested [`Option`].
#[derive(Deserialize, Validate)]
pub struct UpdatePostInput {
	#[validate(length(min = 1, max = 200))]
	pub title: Option<String>,
	pub body: Option<String>,
	#[serde(default)]
	pub category: Option<Option<Uuid>>,
	pub tags: Option<Vec<Uuid>>,
	pub status: Option<PostStatus>,
}

#[derive(Deserialize, Validate)]
pub struct CreateCommentInput {
	#[validate(length(min = 1))]
	pub body: String,
}

#[derive(Debug, Serialize)]
pub struct PostDetail {
	pub id: Uuid,
	pub author: Author,
	pub title: String,
	pub slug: String,
	pub body: String,
	pub category: Option<Category>,
	pub tags: Vec<Tag>,
	pub status: PostStatus,
	pub created_at: chrono::DateTime<chrono::Utc>,
	pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
pub struct CommentDetail {
	pub id: Uuid,
	pub author: Author,
	pub body: String,
	pub created_at: chrono::DateTime<chrono::Utc>,
	pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl CommentDetail {
	pub(crate) fn new(comment: Comment, author: Author) -> Self {
		Self {
			id: comment.id,
			author,
			body: comment.body,
			created_at: comment.timestamps.created_at,
			updated_at: comment.timestamps.updated_at,
		}
	}
}

/// Fetches the public author views for a set of user ids.
pub(crate) async fn authors(
	database: &Database,
	ids: impl IntoIterator<Item = Uuid>,
) -> Result<HashMap<Uuid, Author>, sqlx::Error> {
	let ids = ids.into_iter().collect::<HashSet<_>>();

	if ids.is_empty() {
		return Ok(HashMap::new());
	}

	let mut query = QueryBuilder::<sqlx::Sqlite>::new(
		"SELECT id, email, first_name, last_name, avatar FROM user WHERE id IN (",
	);

	let mut separated = query.separated(", ");
	for id in &ids {
		separated.push_bind(id);
	}
	query.push(")");

	let authors = query
		.build_query_as::<Author>()
		.fetch_all(database)
		.await?;

	Ok(authors.into_iter().map(|a| (a.id, a)).collect())
}

#[derive(sqlx::FromRow)]
struct PostTagRow {
	post_id: Uuid,
	#[sqlx(flatten)]
	tag: Tag,
}

/// Joins authors, categories, and tag sets onto a page of posts.
async fn hydrate(database: &Database, posts: Vec<Post>) -> Result<Vec<PostDetail>, sqlx::Error> {
	if posts.is_empty() {
		return Ok(Vec::new());
	}

	let authors = authors(database, posts.iter().map(|p| p.author_id)).await?;

	let category_ids = posts
		.iter()
		.filter_map(|p| p.category_id)
		.collect::<HashSet<_>>();

	let mut categories = HashMap::new();

	if !category_ids.is_empty() {
		let mut query = QueryBuilder::<sqlx::Sqlite>::new("SELECT * FROM category WHERE id IN (");

		let mut separated = query.separated(", ");
		for id in &category_ids {
			separated.push_bind(id);
		}
		query.push(") AND deleted_at IS NULL");

		for category in query
			.build_query_as::<Category>()
			.fetch_all(database)
			.await?
		{
			categories.insert(category.id, category);
		}
	}

	let mut query = QueryBuilder::<sqlx::Sqlite>::new(
		"SELECT pt.post_id, t.* FROM post_tag pt JOIN tag t ON t.id = pt.tag_id WHERE pt.post_id IN (",
	);

	let mut separated = query.separated(", ");
	for post in &posts {
		separated.push_bind(post.id);
	}
	query.push(") AND t.deleted_at IS NULL");

	let mut tags: HashMap<Uuid, Vec<Tag>> = HashMap::new();

	for row in query
		.build_query_as::<PostTagRow>()
		.fetch_all(database)
		.await?
	{
		tags.entry(row.post_id).or_default().push(row.tag);
	}

	posts
		.into_iter()
		.map(|post| {
			let author = authors
				.get(&post.author_id)
				.cloned()
				.ok_or(sqlx::Error::RowNotFound)?;

			Ok(PostDetail {
				id: post.id,
				author,
				title: post.title,
				slug: post.slug,
				body: post.body,
				category: post.category_id.and_then(|id| categories.get(&id).cloned()),
				tags: tags.remove(&post.id).unwrap_or_default(),
				status: post.status,
				created_at: post.timestamps.created_at,
				updated_at: post.timestamps.updated_at,
			})
		})
		.collect()
}

async fn hydrate_one(database: &Database, post: Post) -> Result<PostDetail, sqlx::Error> {
	let mut details = hydrate(database, vec![post]).await?;

	details.pop().ok_or(sqlx::Error::RowNotFound)
}

/// Rejects references to categories that do not exist.
async fn check_category(database: &Database, id: Uuid) -> Result<(), crate::Error> {
	sqlx::query_scalar::<_, i64>("SELECT 1 FROM category WHERE id = ? AND deleted_at IS NULL")
		.bind(id)
		.fetch_optional(database)
		.await?
		.map(|_| ())
		.ok_or_else(|| Error::UnknownCategory(id).into())
}

/// Rejects references to tags that do not exist.
async fn check_tags(database: &Database, ids: &[Uuid]) -> Result<(), crate::Error> {
	if ids.is_empty() {
		return Ok(());
	}

	let mut query = QueryBuilder::<sqlx::Sqlite>::new("SELECT id FROM tag WHERE id IN (");

	let mut separated = query.separated(", ");
	for id in ids {
		separated.push_bind(id);
	}
	query.push(") AND deleted_at IS NULL");

	let known = query
		.build_query_scalar::<Uuid>()
		.fetch_all(database)
		.await?
		.into_iter()
		.collect::<HashSet<_>>();

	match ids.iter().find(|id| !known.contains(id)) {
		Some(missing) => Err(Error::UnknownTag(*missing).into()),
		None => Ok(()),
	}
}

/// Returns a page of posts, newest first.
///
/// Anonymous visitors see published posts only; an authenticated user
/// additionally sees their own drafts. Other users' drafts never appear.
async fn list_posts(
	State(database): State<Database>,
	OptionalSession(session): OptionalSession,
	Query(paginate): Query<CursorQuery>,
) -> Result<impl IntoResponse, crate::Error> {
	let cursor = paginate
		.cursor
		.as_deref()
		.map(|raw| Cursor::decode(raw).ok_or(Error::InvalidCursor))
		.transpose()?;

	let viewer = session.map(|s| s.user.id);

	let mut query = QueryBuilder::<sqlx::Sqlite>::new("SELECT * FROM post WHERE deleted_at IS NULL");

	match viewer {
		Some(id) => {
			query.push(" AND (status = 'published' OR author_id = ");
			query.push_bind(id);
			query.push(")");
		}
		None => {
			query.push(" AND status = 'published'");
		}
	}

	if let Some(cursor) = cursor {
		query.push(" AND (created_at < ");
		query.push_bind(cursor.created_at);
		query.push(" OR (created_at = ");
		query.push_bind(cursor.created_at);
		query.push(" AND id < ");
		query.push_bind(cursor.id);
		query.push("))");
	}

	query.push(" ORDER BY created_at DESC, id DESC LIMIT ");
	query.push_bind(paginate.page_size);

	let posts = query.build_query_as::<Post>().fetch_all(&database).await?;

	let next = (posts.len() as i64 == paginate.page_size)
		.then(|| posts.last())
		.flatten()
		.map(|post| {
			Cursor {
				created_at: post.timestamps.created_at,
				id: post.id,
			}
			.encode()
		});

	Ok(Json(Page {
		results: hydrate(&database, posts).await?,
		next,
	}))
}

/// Returns a single post by its unique slug.
///
/// Deliberately not filtered by status: anyone holding a draft's slug can
/// read it, and draft secrecy rests on slug unguessability. Listing is the
/// only place drafts are hidden.
async fn get_post(
	State(database): State<Database>,
	Path(slug): Path<String>,
) -> Result<impl IntoResponse, crate::Error> {
	let post = fetch_post(&database, &slug).await?;

	Ok(Json(hydrate_one(&database, post).await?))
}

async fn fetch_post(database: &Database, slug: &str) -> Result<Post, crate::Error> {
	sqlx::query_as::<_, Post>("SELECT * FROM post WHERE slug = ? AND deleted_at IS NULL")
		.bind(slug)
		.fetch_optional(database)
		.await?
		.ok_or_else(|| Error::UnknownPost(slug.to_string()).into())
}

/// Creates a new post owned by the authenticated user.
///
/// The slug is derived from the title and the author is taken from the
/// session, never from the body. Status defaults to `draft`.
async fn create_post(
	State(state): State<AppState>,
	session: Session,
	Json(input): Json<CreatePostInput>,
) -> Result<impl IntoResponse, crate::Error> {
	if let Some(category) = input.category {
		check_category(&state.database, category).await?;
	}
	check_tags(&state.database, &input.tags).await?;

	let base = slug::slugify(&input.title);
	let now = Utc::now();

	// Two concurrent creates with the same title can both pick the same
	// slug between the lookup and the insert; the loser rolls back and
	// retries with a fresh suffix.
	let mut attempts = 3;

	let (post, mut tx) = loop {
		attempts -= 1;

		let slug = slug::unique_slug(&state.database, SlugTable::Post, &base).await?;
		let mut tx = state.database.begin().await?;

		let inserted = sqlx::query_as::<_, Post>(
			r"
			INSERT INTO post (id, author_id, title, slug, body, category_id, status, created_at, updated_at)
			VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
			RETURNING *
			",
		)
		.bind(Uuid::new_v4())
		.bind(session.user.id)
		.bind(&input.title)
		.bind(&slug)
		.bind(&input.body)
		.bind(input.category)
		.bind(input.status.unwrap_or(PostStatus::Draft))
		.bind(now)
		.bind(now)
		.fetch_one(&mut *tx)
		.await;

		match inserted {
			Ok(post) => break (post, tx),
			Err(sqlx::Error::Database(ref e)) if e.is_unique_violation() && attempts > 0 => {}
			Err(e) => return Err(e.into()),
		}
	};

	// Duplicate ids in the body collapse to a single attachment.
	for tag in input.tags.iter().copied().collect::<HashSet<_>>() {
		sqlx::query("INSERT INTO post_tag (post_id, tag_id) VALUES (?, ?)")
			.bind(post.id)
			.bind(tag)
			.execute(&mut *tx)
			.await?;
	}

	tx.commit().await?;

	tracing::info!(post_id = %post.id, slug = %post.slug, "created post");

	Ok((
		StatusCode::CREATED,
		Json(hydrate_one(&state.database, post).await?),
	))
}

/// Updates an owned post, merging only the supplied fields.
///
/// The slug is immutable: changing the title does not regenerate it.
async fn update_post(
	State(database): State<Database>,
	session: Session,
	Path(slug): Path<String>,
	Json(input): Json<UpdatePostInput>,
) -> Result<impl IntoResponse, crate::Error> {
	let post = fetch_post(&database, &slug).await?;

	if !policy::can_act(
		Some(session.user.id),
		Action::Mutate,
		Owner::User(post.author_id),
	) {
		return Err(crate::Error::Forbidden);
	}

	if let Some(Some(category)) = input.category {
		check_category(&database, category).await?;
	}
	if let Some(tags) = &input.tags {
		check_tags(&database, tags).await?;
	}

	let mut tx = database.begin().await?;

	sqlx::query(
		r"
		UPDATE post
		SET title = COALESCE(?, title),
			body = COALESCE(?, body),
			status = COALESCE(?, status),
			updated_at = ?
		WHERE id = ?
		",
	)
	.bind(&input.title)
	.bind(&input.body)
	.bind(input.status)
	.bind(Utc::now())
	.bind(post.id)
	.execute(&mut *tx)
	.await?;

	if let Some(category) = input.category {
		sqlx::query("UPDATE post SET category_id = ? WHERE id = ?")
			.bind(category)
			.bind(post.id)
			.execute(&mut *tx)
			.await?;
	}

	if let Some(tags) = &input.tags {
		sqlx::query("DELETE FROM post_tag WHERE post_id = ?")
			.bind(post.id)
			.execute(&mut *tx)
			.await?;

		for tag in tags.iter().copied().collect::<HashSet<_>>() {
			sqlx::query("INSERT INTO post_tag (post_id, tag_id) VALUES (?, ?)")
				.bind(post.id)
				.bind(tag)
				.execute(&mut *tx)
				.await?;
		}
	}

	tx.commit().await?;

	let post = fetch_post(&database, &slug).await?;

	Ok(Json(hydrate_one(&database, post).await?))
}

/// Soft-deletes an owned post together with its comments.
async fn delete_post(
	State(database): State<Database>,
	session: Session,
	Path(slug): Path<String>,
) -> Result<impl IntoResponse, crate::Error> {
	let post = fetch_post(&database, &slug).await?;

	if !policy::can_act(
		Some(session.user.id),
		Action::Mutate,
		Owner::User(post.author_id),
	) {
		return Err(crate::Error::Forbidden);
	}

	let now = Utc::now();
	let mut tx = database.begin().await?;

	sqlx::query("UPDATE post SET deleted_at = ? WHERE id = ?")
		.bind(now)
		.bind(post.id)
		.execute(&mut *tx)
		.await?;

	sqlx::query("UPDATE comment SET deleted_at = ? WHERE post_id = ? AND deleted_at IS NULL")
		.bind(now)
		.bind(post.id)
		.execute(&mut *tx)
		.await?;

	tx.commit().await?;

	Ok(StatusCode::NO_CONTENT)
}

/// Returns a page of a post's comments, newest first. Open to anyone.
async fn list_comments(
	State(database): State<Database>,
	Path(slug): Path<String>,
	Query(paginate): Query<CursorQuery>,
) -> Result<impl IntoResponse, crate::Error> {
	let post = fetch_post(&database, &slug).await?;

	let cursor = paginate
		.cursor
		.as_deref()
		.map(|raw| Cursor::decode(raw).ok_or(Error::InvalidCursor))
		.transpose()?;

	let mut query = QueryBuilder::<sqlx::Sqlite>::new(
		"SELECT * FROM comment WHERE deleted_at IS NULL AND post_id = ",
	);
	query.push_bind(post.id);

	if let Some(cursor) = cursor {
		query.push(" AND (created_at < ");
		query.push_bind(cursor.created_at);
		query.push(" OR (created_at = ");
		query.push_bind(cursor.created_at);
		query.push(" AND id < ");
		query.push_bind(cursor.id);
		query.push("))");
	}

	query.push(" ORDER BY created_at DESC, id DESC LIMIT ");
	query.push_bind(paginate.page_size);

	let comments = query
		.build_query_as::<Comment>()
		.fetch_all(&database)
		.await?;

	let next = (comments.len() as i64 == paginate.page_size)
		.then(|| comments.last())
		.flatten()
		.map(|comment| {
			Cursor {
				created_at: comment.timestamps.created_at,
				id: comment.id,
			}
			.encode()
		});

	let authors = authors(&database, comments.iter().map(|c| c.author_id)).await?;

	let results = comments
		.into_iter()
		.map(|comment| {
			let author = authors
				.get(&comment.author_id)
				.cloned()
				.ok_or(sqlx::Error::RowNotFound)?;

			Ok(CommentDetail::new(comment, author))
		})
		.collect::<Result<Vec<_>, sqlx::Error>>()?;

	Ok(Json(Page { results, next }))
}

/// Creates a comment under a post and publishes a best-effort event.
///
/// The author and post are taken from the session and the path, never from
/// the body.
async fn create_comment(
	State(state): State<AppState>,
	session: Session,
	Path(slug): Path<String>,
	Json(input): Json<CreateCommentInput>,
) -> Result<impl IntoResponse, crate::Error> {
	let post = fetch_post(&state.database, &slug).await?;
	let now = Utc::now();

	let comment = sqlx::query_as::<_, Comment>(
		r"
		INSERT INTO comment (id, post_id, author_id, body, created_at, updated_at)
		VALUES (?, ?, ?, ?, ?, ?)
		RETURNING *
		",
	)
	.bind(Uuid::new_v4())
	.bind(post.id)
	.bind(session.user.id)
	.bind(&input.body)
	.bind(now)
	.bind(now)
	.fetch_one(&state.database)
	.await?;

	let event = CommentEvent {
		id: comment.id,
		post_id: post.id,
		post_title: post.title,
		author_id: session.user.id,
		author_email: session.user.email.clone(),
		body: comment.body.clone(),
		created_at: comment.timestamps.created_at,
	};

	// Fire and forget: publishing must never delay or fail the response.
	let notifier = state.notifier.clone();
	tokio::spawn(async move { notifier.publish_comment(event).await });

	let author = Author {
		id: session.user.id,
		email: session.user.email,
		first_name: session.user.first_name,
		last_name: session.user.last_name,
		avatar: session.user.avatar,
	};

	Ok((StatusCode::CREATED, Json(CommentDetail::new(comment, author))))
}

#[cfg(test)]
mod test {
	use crate::test::*;

	async fn create_post(app: &TestServer, token: &str, body: Value) -> Value {
		let response = app
			.post("/posts")
			.add_header(axum::http::header::AUTHORIZATION, bearer(token))
			.json(&body)
			.await;

		assert_eq!(response.status_code(), 201);
		response.json::<Value>()
	}

	#[sqlx::test]
	async fn test_create_post_defaults_to_draft(pool: Database) {
		let app = app(pool);
		let token = access_token(&app, "a@x.com").await;

		let post = create_post(&app, &token, json!({"title": "Hello World"})).await;

		assert_eq!(post["slug"], "hello-world");
		assert_eq!(post["status"], "draft");
		assert_eq!(post["author"]["email"], "a@x.com");
	}

	#[sqlx::test]
	async fn test_create_post_requires_authentication(pool: Database) {
		let app = app(pool);

		let response = app.post("/posts").json(&json!({"title": "Hello"})).await;

		assert_eq!(response.status_code(), 401);
	}

	#[sqlx::test]
	async fn test_colliding_titles_get_suffixed_slugs(pool: Database) {
		let app = app(pool);
		let token = access_token(&app, "a@x.com").await;

		for expected in ["hello-world", "hello-world-1", "hello-world-2"] {
			let post = create_post(&app, &token, json!({"title": "Hello World"})).await;

			assert_eq!(post["slug"], expected);
		}
	}

	#[sqlx::test]
	async fn test_duplicate_tag_ids_collapse(pool: Database) {
		let app = app(pool);
		let token = access_token(&app, "a@x.com").await;

		let tag = app
			.post("/tags")
			.add_header(axum::http::header::AUTHORIZATION, bearer(&token))
			.json(&json!({"name": "rust"}))
			.await
			.json::<Value>();

		let post = create_post(
			&app,
			&token,
			json!({"title": "Hello", "tags": [tag["id"], tag["id"]]}),
		)
		.await;

		assert_eq!(post["tags"].as_array().unwrap().len(), 1);

		let updated = app
			.patch("/posts/hello")
			.add_header(axum::http::header::AUTHORIZATION, bearer(&token))
			.json(&json!({"tags": [tag["id"], tag["id"], tag["id"]]}))
			.await;

		assert_eq!(updated.status_code(), 200);
		assert_eq!(updated.json::<Value>()["tags"].as_array().unwrap().len(), 1);
	}

	#[sqlx::test]
	async fn test_concurrent_same_title_creates_both_succeed(pool: Database) {
		let app = app(pool);
		let token = access_token(&app, "a@x.com").await;

		let create = || async {
			app.post("/posts")
				.add_header(axum::http::header::AUTHORIZATION, bearer(&token))
				.json(&json!({"title": "Race"}))
				.await
		};

		let (a, b) = tokio::join!(create(), create());

		assert_eq!(a.status_code(), 201);
		assert_eq!(b.status_code(), 201);
		assert_ne!(a.json::<Value>()["slug"], b.json::<Value>()["slug"]);
	}

	#[sqlx::test]
	async fn test_listing_hides_other_users_drafts(pool: Database) {
		let app = app(pool);
		let author = access_token(&app, "a@x.com").await;
		let reader = access_token(&app, "b@x.com").await;

		create_post(&app, &author, json!({"title": "Draft", "status": "draft"})).await;
		create_post(
			&app,
			&author,
			json!({"title": "Public", "status": "published"}),
		)
		.await;

		let slugs = |body: Value| {
			body["results"]
				.as_array()
				.unwrap()
				.iter()
				.map(|p| p["slug"].as_str().unwrap().to_string())
				.collect::<Vec<_>>()
		};

		// Anonymous: published only.
		let anonymous = app.get("/posts").await.json::<Value>();
		assert_eq!(slugs(anonymous), ["public"]);

		// Another authenticated user: still no foreign drafts.
		let other = app
			.get("/posts")
			.add_header(axum::http::header::AUTHORIZATION, bearer(&reader))
			.await
			.json::<Value>();
		assert_eq!(slugs(other), ["public"]);

		// The owner sees their own draft alongside published posts.
		let own = app
			.get("/posts")
			.add_header(axum::http::header::AUTHORIZATION, bearer(&author))
			.await
			.json::<Value>();
		let mut own = slugs(own);
		own.sort();
		assert_eq!(own, ["draft", "public"]);
	}

	#[sqlx::test]
	async fn test_cursor_pagination_is_stable(pool: Database) {
		let app = app(pool);
		let token = access_token(&app, "a@x.com").await;

		for n in 0..12 {
			create_post(
				&app,
				&token,
				json!({"title": format!("Post {n}"), "status": "published"}),
			)
			.await;
		}

		let first = app.get("/posts").await.json::<Value>();
		let results = first["results"].as_array().unwrap();

		assert_eq!(results.len(), 10);

		let next = first["next"].as_str().unwrap();
		let second = app
			.get("/posts")
			.add_query_param("cursor", next)
			.await
			.json::<Value>();

		assert_eq!(second["results"].as_array().unwrap().len(), 2);
		assert!(second["next"].is_null());

		// No duplicates or gaps across the page boundary, even with equal
		// creation timestamps.
		let mut seen = first["results"]
			.as_array()
			.unwrap()
			.iter()
			.chain(second["results"].as_array().unwrap())
			.map(|p| p["slug"].as_str().unwrap().to_string())
			.collect::<Vec<_>>();

		seen.sort();
		seen.dedup();
		assert_eq!(seen.len(), 12);
	}

	#[sqlx::test]
	async fn test_invalid_cursor_rejected(pool: Database) {
		let app = app(pool);

		let response = app.get("/posts").add_query_param("cursor", "garbage").await;

		assert_eq!(response.status_code(), 400);
	}

	#[sqlx::test]
	async fn test_get_by_slug_ignores_status(pool: Database) {
		let app = app(pool);
		let token = access_token(&app, "a@x.com").await;

		create_post(&app, &token, json!({"title": "Secret Draft"})).await;

		// Anyone holding the slug can read a draft.
		let response = app.get("/posts/secret-draft").await;

		assert_eq!(response.status_code(), 200);
		assert_eq!(response.json::<Value>()["status"], "draft");

		let missing = app.get("/posts/no-such-slug").await;

		assert_eq!(missing.status_code(), 404);
	}

	#[sqlx::test]
	async fn test_update_merges_supplied_fields_only(pool: Database) {
		let app = app(pool);
		let token = access_token(&app, "a@x.com").await;

		create_post(
			&app,
			&token,
			json!({"title": "Hello World", "body": "original"}),
		)
		.await;

		let response = app
			.patch("/posts/hello-world")
			.add_header(axum::http::header::AUTHORIZATION, bearer(&token))
			.json(&json!({"title": "Changed Title", "status": "published"}))
			.await;

		assert_eq!(response.status_code(), 200);

		let post = response.json::<Value>();

		assert_eq!(post["title"], "Changed Title");
		assert_eq!(post["body"], "original");
		assert_eq!(post["status"], "published");
		// Slug never regenerates.
		assert_eq!(post["slug"], "hello-world");
	}

	#[sqlx::test]
	async fn test_only_the_owner_can_mutate(pool: Database) {
		let app = app(pool);
		let owner = access_token(&app, "a@x.com").await;
		let stranger = access_token(&app, "b@x.com").await;

		create_post(&app, &owner, json!({"title": "Mine"})).await;

		let patched = app
			.patch("/posts/mine")
			.add_header(axum::http::header::AUTHORIZATION, bearer(&stranger))
			.json(&json!({"title": "Stolen"}))
			.await;

		assert_eq!(patched.status_code(), 403);

		let deleted = app
			.delete("/posts/mine")
			.add_header(axum::http::header::AUTHORIZATION, bearer(&stranger))
			.await;

		assert_eq!(deleted.status_code(), 403);

		// The owner can.
		let patched = app
			.patch("/posts/mine")
			.add_header(axum::http::header::AUTHORIZATION, bearer(&owner))
			.json(&json!({"title": "Still Mine"}))
			.await;

		assert_eq!(patched.status_code(), 200);
	}

	#[sqlx::test]
	async fn test_delete_cascades_to_comments(pool: Database) {
		let app = app(pool.clone());
		let token = access_token(&app, "a@x.com").await;

		create_post(&app, &token, json!({"title": "Hello World"})).await;

		let comment = app
			.post("/posts/hello-world/comments")
			.add_header(axum::http::header::AUTHORIZATION, bearer(&token))
			.json(&json!({"body": "first!"}))
			.await;

		assert_eq!(comment.status_code(), 201);

		let deleted = app
			.delete("/posts/hello-world")
			.add_header(axum::http::header::AUTHORIZATION, bearer(&token))
			.await;

		assert_eq!(deleted.status_code(), 204);
		assert_eq!(app.get("/posts/hello-world").await.status_code(), 404);

		// Soft-deleted, not erased, and marked in the same transaction.
		let live_comments =
			sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM comment WHERE deleted_at IS NULL")
				.fetch_one(&pool)
				.await
				.unwrap();

		assert_eq!(live_comments, 0);
	}

	#[sqlx::test]
	async fn test_comment_flow(pool: Database) {
		let app = app(pool);
		let token = access_token(&app, "a@x.com").await;

		create_post(&app, &token, json!({"title": "Hello World"})).await;

		let anonymous = app
			.post("/posts/hello-world/comments")
			.json(&json!({"body": "anon"}))
			.await;

		assert_eq!(anonymous.status_code(), 401);

		let created = app
			.post("/posts/hello-world/comments")
			.add_header(axum::http::header::AUTHORIZATION, bearer(&token))
			.json(&json!({"body": "first!"}))
			.await;

		assert_eq!(created.status_code(), 201);
		assert_eq!(created.json::<Value>()["author"]["email"], "a@x.com");

		// Listing is open to anyone.
		let listed = app.get("/posts/hello-world/comments").await;

		assert_eq!(listed.status_code(), 200);

		let body = listed.json::<Value>();

		assert_eq!(body["results"].as_array().unwrap().len(), 1);
		assert_eq!(body["results"][0]["body"], "first!");
	}
}

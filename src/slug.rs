use crate::Database;

/// Tables that carry a unique `slug` column.
#[derive(Debug, Clone, Copy)]
pub enum SlugTable {
	Post,
	Category,
	Tag,
}

impl SlugTable {
	fn as_str(self) -> &'static str {
		match self {
			Self::Post => "post",
			Self::Category => "category",
			Self::Tag => "tag",
		}
	}
}

/// Derives a URL-safe slug: lowercased, alphanumeric runs joined by single
/// hyphens, everything else dropped.
#[must_use]
pub fn slugify(text: &str) -> String {
	let mut slug = String::with_capacity(text.len());

	for c in text.chars() {
		if c.is_ascii_alphanumeric() {
			slug.push(c.to_ascii_lowercase());
		} else if !slug.ends_with('-') && !slug.is_empty() {
			slug.push('-');
		}
	}

	let slug = slug.trim_end_matches('-');

	if slug.is_empty() {
		"untitled".to_string()
	} else {
		slug.to_string()
	}
}

/// Resolves `base` to a slug that is unique within `table`, appending a
/// numeric suffix deterministically: `base`, `base-1`, `base-2`, ...
///
/// Soft-deleted rows keep their slug reserved, so the lookup does not
/// filter on `deleted_at`.
pub async fn unique_slug(
	database: &Database,
	table: SlugTable,
	base: &str,
) -> Result<String, sqlx::Error> {
	let query = format!("SELECT 1 FROM {} WHERE slug = ?", table.as_str());
	let mut candidate = base.to_string();
	let mut suffix = 0u32;

	loop {
		let taken = sqlx::query_scalar::<_, i64>(&query)
			.bind(&candidate)
			.fetch_optional(database)
			.await?;

		if taken.is_none() {
			return Ok(candidate);
		}

		suffix += 1;
		candidate = format!("{base}-{suffix}");
	}
}

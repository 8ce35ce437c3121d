/// Data models for article-service
///
/// This module defines structures for:
/// - Article: a published piece of content, ranked and tagged
/// - Tag / Category: labels attached to articles (many-to-many)
/// - CategoryGroupRank: curated ordering of article uids for a page slug
/// - SearchAdInfo: search-ad reference record (terms + channel)
/// - Ingestion payloads accepted by the admin API
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use validator::Validate;

use crate::error::AppError;

/// Rank assigned to articles nobody ranked explicitly
pub const UNRANKED: i32 = 99_999;

/// Width of the category and curated-list slug columns
pub const SLUG_MAX_LEN: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Article {
    pub uid: String,
    pub title: String,
    pub slug: Option<String>,
    pub description: String,
    pub content: String,
    pub cover_img: String,
    pub rank: i32,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

/// An article with its relations loaded, the unit every page is built from.
///
/// `categories` are kept in ascending id order so "first category" is stable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub article: Article,
    pub tags: Vec<Tag>,
    pub categories: Vec<Category>,
}

impl ArticleRecord {
    pub fn uid(&self) -> &str {
        &self.article.uid
    }

    pub fn first_category(&self) -> Option<&Category> {
        self.categories.first()
    }

    pub fn in_category(&self, slug: &str) -> bool {
        self.categories.iter().any(|c| c.slug == slug)
    }
}

/// Ordered list of article uids an editor pinned to a page.
///
/// Duplicates keep their first position. Uids are not checked against the
/// store on write; unknown ones are skipped when the list is assembled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CuratedList(Vec<String>);

impl CuratedList {
    pub fn new<I, S>(uids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let uids = uids
            .into_iter()
            .map(Into::into)
            .filter(|uid: &String| seen.insert(uid.clone()))
            .collect();
        Self(uids)
    }

    /// Build from the stored JSON column. Null, non-array values and
    /// non-string entries are treated as absent.
    pub fn from_json(value: Option<&serde_json::Value>) -> Self {
        match value.and_then(|v| v.as_array()) {
            Some(items) => Self::new(items.iter().filter_map(|v| v.as_str())),
            None => Self::default(),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::from(self.0.clone())
    }

    pub fn uids(&self) -> &[String] {
        &self.0
    }

    pub fn contains(&self, uid: &str) -> bool {
        self.0.iter().any(|u| u == uid)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl<'de> Deserialize<'de> for CuratedList {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let uids = Option::<Vec<String>>::deserialize(deserializer)?;
        Ok(Self::new(uids.unwrap_or_default()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryGroupRank {
    pub slug: String,
    pub rank: CuratedList,
    pub update_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow, Validate)]
pub struct SearchAdInfo {
    #[validate(length(min = 1, max = 10))]
    pub uid: String,
    #[serde(default)]
    #[validate(length(max = 1000))]
    pub terms: String,
    #[serde(default)]
    #[validate(length(max = 50))]
    pub channel_id: String,
}

impl SearchAdInfo {
    /// True when the trimmed, lowercased query equals one of the
    /// comma-separated terms.
    pub fn owns_query(&self, q: &str) -> bool {
        let needle = q.trim().to_lowercase();
        self.terms
            .split(',')
            .any(|term| term.trim().to_lowercase() == needle)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct TagInput {
    #[validate(length(min = 1, max = 50))]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct CategoryInput {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
}

/// One article in a `batch_add` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ArticleInput {
    #[validate(length(min = 1, max = 10))]
    pub uid: String,
    #[serde(default)]
    #[validate(length(max = 250))]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 250))]
    pub slug: Option<String>,
    #[serde(default)]
    #[validate(length(max = 5000))]
    pub description: String,
    #[serde(default)]
    #[validate(length(max = 50000))]
    pub content: String,
    #[serde(default)]
    #[validate(length(max = 200))]
    pub cover_img: String,
    #[serde(default = "default_rank")]
    #[validate(range(min = 0))]
    pub rank: i32,
    #[serde(default)]
    #[validate(nested)]
    pub tags: Vec<TagInput>,
    #[serde(default)]
    #[validate(nested)]
    pub categories: Vec<CategoryInput>,
}

fn default_rank() -> i32 {
    UNRANKED
}

impl ArticleInput {
    /// Tag names with duplicates removed, first occurrence wins
    pub fn tag_names(&self) -> Vec<&str> {
        dedup_names(self.tags.iter().map(|t| t.name.as_str()))
    }

    pub fn category_names(&self) -> Vec<&str> {
        dedup_names(self.categories.iter().map(|c| c.name.as_str()))
    }

    /// Deduplicated category names paired with their slugs. Fails when a
    /// slug is wider than [`SLUG_MAX_LEN`] or two different names in this
    /// item collapse to the same slug.
    pub fn category_slugs(&self) -> crate::error::Result<Vec<(&str, String)>> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut pairs = Vec::new();

        for name in self.category_names() {
            let slug = slugify(name);
            if slug.len() > SLUG_MAX_LEN {
                return Err(AppError::Validation(format!(
                    "category '{}' gives a slug longer than {} characters",
                    name, SLUG_MAX_LEN
                )));
            }
            if !seen.insert(slug.clone()) {
                return Err(AppError::Validation(format!(
                    "categories in one article share the slug '{}'",
                    slug
                )));
            }
            pairs.push((name, slug));
        }

        Ok(pairs)
    }
}

fn dedup_names<'a>(names: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut seen = HashSet::new();
    names.filter(|n| seen.insert(*n)).collect()
}

/// Admin-facing shape of a stored article, mirrors the ingestion payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleData {
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
    pub uid: String,
    pub title: String,
    pub slug: Option<String>,
    pub description: String,
    pub content: String,
    pub cover_img: String,
    pub rank: i32,
    pub tags: Vec<TagInput>,
    pub categories: Vec<CategoryInput>,
}

impl From<&ArticleRecord> for ArticleData {
    fn from(record: &ArticleRecord) -> Self {
        let a = &record.article;
        Self {
            create_time: a.create_time,
            update_time: a.update_time,
            uid: a.uid.clone(),
            title: a.title.clone(),
            slug: a.slug.clone(),
            description: a.description.clone(),
            content: a.content.clone(),
            cover_img: a.cover_img.clone(),
            rank: a.rank,
            tags: record
                .tags
                .iter()
                .map(|t| TagInput {
                    name: t.name.clone(),
                })
                .collect(),
            categories: record
                .categories
                .iter()
                .map(|c| CategoryInput {
                    name: c.name.clone(),
                })
                .collect(),
        }
    }
}

/// URL-safe slug: lowercase ASCII alphanumerics, runs of whitespace, `-`
/// and `_` collapse into one `-`, everything else is dropped.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;

    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else if ch.is_whitespace() || ch == '-' || ch == '_' {
            pending_dash = true;
        }
    }

    slug
}

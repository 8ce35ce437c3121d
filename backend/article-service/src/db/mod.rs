/// Entity store for article-service
///
/// `ArticleStore` is the only way services reach persisted state. The
/// PostgreSQL implementation backs the running service; the in-memory one
/// backs tests and local experiments.
pub mod memory;
pub mod pool;
pub mod postgres;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{
    ArticleInput, ArticleRecord, Category, CategoryGroupRank, CuratedList, SearchAdInfo,
};

pub use memory::MemoryStore;
pub use postgres::PgArticleStore;

/// Which articles are eligible for a fallback pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolScope {
    All,
    /// Articles attached to the category with this slug
    Category(String),
}

/// Orderings the store can apply itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolOrder {
    /// rank ascending, then uid
    Rank,
    /// update_time descending, then uid
    RecentlyUpdated,
    /// create_time ascending, then uid
    Natural,
}

/// One admin listing filter value.
///
/// A comma-separated value selects exact matches (and orders results by
/// their position in the list); a single value is a case-insensitive
/// substring match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldFilter {
    Exact(Vec<String>),
    Contains(String),
}

impl FieldFilter {
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.is_empty() {
            return None;
        }
        if raw.contains(',') {
            let values = raw
                .split(',')
                .map(|v| v.trim().to_string())
                .collect::<Vec<_>>();
            Some(FieldFilter::Exact(values))
        } else {
            Some(FieldFilter::Contains(raw.to_string()))
        }
    }

    pub fn matches(&self, value: &str) -> bool {
        match self {
            FieldFilter::Exact(values) => values.iter().any(|v| v == value),
            FieldFilter::Contains(needle) => {
                value.to_lowercase().contains(&needle.to_lowercase())
            }
        }
    }

    /// Position of `value` in an exact list
    pub fn position(&self, value: &str) -> Option<usize> {
        match self {
            FieldFilter::Exact(values) => values.iter().position(|v| v == value),
            FieldFilter::Contains(_) => None,
        }
    }
}

/// Admin listing filters, all optional and combined with AND
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleFilter {
    pub uids: Option<FieldFilter>,
    pub titles: Option<FieldFilter>,
    pub descriptions: Option<FieldFilter>,
    pub tags: Option<FieldFilter>,
    pub categories: Option<FieldFilter>,
}

impl ArticleFilter {
    pub fn matches(&self, record: &ArticleRecord) -> bool {
        let article = &record.article;

        any_match(&self.uids, std::iter::once(article.uid.as_str()))
            && any_match(&self.titles, std::iter::once(article.title.as_str()))
            && any_match(
                &self.descriptions,
                std::iter::once(article.description.as_str()),
            )
            && any_match(&self.tags, record.tags.iter().map(|t| t.name.as_str()))
            && any_match(
                &self.categories,
                record.categories.iter().map(|c| c.name.as_str()),
            )
    }
}

fn any_match<'a>(filter: &Option<FieldFilter>, mut values: impl Iterator<Item = &'a str>) -> bool {
    match filter {
        Some(f) => values.any(|v| f.matches(v)),
        None => true,
    }
}

#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// The curated row for `slug`, if any
    async fn fetch_rank(&self, slug: &str) -> Result<Option<CategoryGroupRank>>;

    /// Replace (or create) the curated row for `slug` in one statement
    async fn replace_rank(&self, slug: &str, rank: &CuratedList) -> Result<CategoryGroupRank>;

    /// Articles whose uid is in `uids`, in no particular order
    async fn fetch_by_uids(&self, uids: &[String]) -> Result<Vec<ArticleRecord>>;

    /// Articles in `scope` whose uid is not in `exclude`, ordered by `order`
    async fn fetch_pool(
        &self,
        exclude: &[String],
        scope: &PoolScope,
        order: PoolOrder,
    ) -> Result<Vec<ArticleRecord>>;

    async fn find_article(&self, uid: &str) -> Result<Option<ArticleRecord>>;

    async fn find_article_by_slug(&self, slug: &str) -> Result<Option<ArticleRecord>>;

    async fn find_category(&self, slug: &str) -> Result<Option<Category>>;

    /// All categories by ascending id
    async fn list_categories(&self) -> Result<Vec<Category>>;

    async fn find_search_ad(&self, uid: &str) -> Result<Option<SearchAdInfo>>;

    /// Create or update one article and rebuild its tag and category
    /// relations atomically
    async fn upsert_article(&self, input: &ArticleInput) -> Result<()>;

    /// Remove an article and its tag and category links. Returns false
    /// when no article had this uid.
    async fn delete_article(&self, uid: &str) -> Result<bool>;

    async fn upsert_search_ad(&self, input: &SearchAdInfo) -> Result<()>;

    /// All search-ad records by uid
    async fn list_search_ads(&self) -> Result<Vec<SearchAdInfo>>;

    /// Articles matching `filter`, in natural order
    async fn list_articles(&self, filter: &ArticleFilter) -> Result<Vec<ArticleRecord>>;
}

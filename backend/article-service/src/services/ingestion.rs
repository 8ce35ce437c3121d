//! Admin-side writes: batch upserts, single-article create, update and
//! delete, and curated list replacement
//!
//! Batch items are independent. Each one is decoded, validated and written
//! on its own; a failure is recorded in the report and the batch moves on.
//! Every successful write clears the page cache.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};
use validator::Validate;

use crate::cache::PageCache;
use crate::db::ArticleStore;
use crate::error::{AppError, Result};
use crate::metrics::INGESTION_ITEMS_TOTAL;
use crate::models::{
    slugify, ArticleData, ArticleInput, CategoryGroupRank, CuratedList, SearchAdInfo, SLUG_MAX_LEN,
};

/// `{ "data": [...] }` body of the batch endpoints. Items stay raw JSON so
/// one malformed item cannot reject the whole batch.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchPayload {
    #[serde(default)]
    pub data: Vec<Value>,
}

/// Per-item outcome of a batch. Failed items without a readable uid are
/// reported as `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestionReport {
    pub create_success_uid_list: Vec<String>,
    pub create_error_uid_list: Vec<Option<String>>,
}

/// Body of `update_category_rank`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RankUpdate {
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub rank: CuratedList,
}

impl RankUpdate {
    /// `slugify(slug)`, or `slugify(name)` when no slug was given
    pub fn derived_slug(&self) -> Result<String> {
        let source = [self.slug.as_deref(), self.name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|s| !s.is_empty())
            .unwrap_or_default();

        let slug = slugify(source);
        if slug.is_empty() {
            return Err(AppError::BadRequest(
                "a non-empty slug or name is required".to_string(),
            ));
        }
        if slug.len() > SLUG_MAX_LEN {
            return Err(AppError::BadRequest(format!(
                "slug '{}' is longer than {} characters",
                slug, SLUG_MAX_LEN
            )));
        }
        Ok(slug)
    }
}

#[derive(Clone)]
pub struct IngestionService {
    store: Arc<dyn ArticleStore>,
    cache: Arc<dyn PageCache>,
}

impl IngestionService {
    pub fn new(store: Arc<dyn ArticleStore>, cache: Arc<dyn PageCache>) -> Self {
        Self { store, cache }
    }

    pub async fn batch_add_articles(&self, items: Vec<Value>) -> IngestionReport {
        let store = self.store.clone();
        let report = ingest_each("article", items, |input: ArticleInput| {
            let store = store.clone();
            async move {
                store.upsert_article(&input).await?;
                Ok(input.uid)
            }
        })
        .await;
        self.after_write(&report).await;
        report
    }

    pub async fn batch_add_search_ads(&self, items: Vec<Value>) -> IngestionReport {
        let store = self.store.clone();
        let report = ingest_each("search_ad", items, |input: SearchAdInfo| {
            let store = store.clone();
            async move {
                store.upsert_search_ad(&input).await?;
                Ok(input.uid)
            }
        })
        .await;
        self.after_write(&report).await;
        report
    }

    /// Replace the curated list for the derived slug. Uids are stored as
    /// given; ones that do not exist are skipped when pages are assembled.
    pub async fn update_category_rank(&self, update: RankUpdate) -> Result<CategoryGroupRank> {
        let slug = update.derived_slug()?;
        let row = self.store.replace_rank(&slug, &update.rank).await?;
        info!(slug = %slug, uids = row.rank.len(), "Curated list replaced");
        self.clear_cache().await;
        Ok(row)
    }

    /// Create one article. An existing uid is a conflict, not an upsert.
    pub async fn create_article(&self, body: Value) -> Result<ArticleData> {
        let input = decode_article(body)?;
        if self.store.find_article(&input.uid).await?.is_some() {
            return Err(AppError::BadRequest(format!(
                "article '{}' already exists",
                input.uid
            )));
        }
        self.write_article(input).await
    }

    /// Replace the article at `uid`. With `partial`, fields missing from
    /// `body` keep their stored values; otherwise they fall back to the
    /// ingestion defaults. The path uid always wins over one in the body.
    pub async fn update_article(
        &self,
        uid: &str,
        body: Value,
        partial: bool,
    ) -> Result<ArticleData> {
        let Value::Object(fields) = body else {
            return Err(AppError::BadRequest("body must be a JSON object".to_string()));
        };
        let current = self
            .store
            .find_article(uid)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("article '{}' not found", uid)))?;

        let mut merged = if partial {
            match serde_json::to_value(ArticleData::from(&current))? {
                Value::Object(stored) => stored,
                _ => Map::new(),
            }
        } else {
            Map::new()
        };
        merged.extend(fields);
        merged.insert("uid".to_string(), Value::from(uid));

        let input = decode_article(Value::Object(merged))?;
        self.write_article(input).await
    }

    pub async fn delete_article(&self, uid: &str) -> Result<()> {
        if !self.store.delete_article(uid).await? {
            return Err(AppError::NotFound(format!("article '{}' not found", uid)));
        }
        info!(uid = %uid, "Article deleted");
        self.clear_cache().await;
        Ok(())
    }

    async fn write_article(&self, input: ArticleInput) -> Result<ArticleData> {
        self.store.upsert_article(&input).await?;
        self.clear_cache().await;

        let record = self.store.find_article(&input.uid).await?.ok_or_else(|| {
            AppError::Internal(format!("article '{}' missing after write", input.uid))
        })?;
        info!(uid = %input.uid, "Article written");
        Ok(ArticleData::from(&record))
    }

    async fn after_write(&self, report: &IngestionReport) {
        info!(
            succeeded = report.create_success_uid_list.len(),
            failed = report.create_error_uid_list.len(),
            "Batch ingestion finished"
        );
        if !report.create_success_uid_list.is_empty() {
            self.clear_cache().await;
        }
    }

    async fn clear_cache(&self) {
        if let Err(e) = self.cache.clear_pages().await {
            warn!(error = %e, "Failed to clear page cache after write");
        }
    }
}

fn decode_article(body: Value) -> Result<ArticleInput> {
    let input: ArticleInput =
        serde_json::from_value(body).map_err(|e| AppError::Validation(e.to_string()))?;
    input.validate()?;
    Ok(input)
}

fn item_uid(item: &Value) -> Option<String> {
    match item.get("uid")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

async fn ingest_each<T, F, Fut>(kind: &str, items: Vec<Value>, write: F) -> IngestionReport
where
    T: DeserializeOwned + Validate,
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<String>>,
{
    let mut report = IngestionReport::default();

    for item in items {
        let uid = item_uid(&item);
        let outcome = async {
            let input: T =
                serde_json::from_value(item).map_err(|e| AppError::Validation(e.to_string()))?;
            input.validate()?;
            write(input).await
        }
        .await;

        match outcome {
            Ok(uid) => {
                INGESTION_ITEMS_TOTAL
                    .with_label_values(&[kind, "success"])
                    .inc();
                report.create_success_uid_list.push(uid);
            }
            Err(e) => {
                warn!(kind = %kind, uid = ?uid, error = %e, "Batch item rejected");
                INGESTION_ITEMS_TOTAL
                    .with_label_values(&[kind, "error"])
                    .inc();
                report.create_error_uid_list.push(uid);
            }
        }
    }

    report
}

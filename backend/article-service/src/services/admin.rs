//! Admin reads: article listing with filters and ordering, single-record
//! lookups for articles and search ads

use serde::Deserialize;
use std::cmp::Ordering;
use tracing::debug;

use crate::db::{ArticleFilter, ArticleStore, FieldFilter};
use crate::error::{AppError, Result};
use crate::models::{ArticleData, ArticleRecord, SearchAdInfo};

/// Raw listing query string
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    pub uids: Option<String>,
    pub titles: Option<String>,
    pub descriptions: Option<String>,
    pub tags: Option<String>,
    pub categories: Option<String>,
    pub ordering: Option<String>,
    pub page: Option<String>,
    pub size: Option<String>,
}

impl ListQuery {
    pub fn filter(&self) -> ArticleFilter {
        let parse = |raw: &Option<String>| raw.as_deref().and_then(FieldFilter::parse);
        ArticleFilter {
            uids: parse(&self.uids),
            titles: parse(&self.titles),
            descriptions: parse(&self.descriptions),
            tags: parse(&self.tags),
            categories: parse(&self.categories),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderField {
    Rank,
    CreateTime,
    UpdateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTerm {
    pub field: OrderField,
    pub descending: bool,
}

/// Parse `ordering=rank,-updateTime`. Unknown fields are ignored;
/// camelCase and snake_case names are both accepted.
pub fn parse_ordering(raw: &str) -> Vec<OrderTerm> {
    raw.split(',')
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .filter_map(|term| {
            let (descending, name) = match term.strip_prefix('-') {
                Some(name) => (true, name),
                None => (false, term),
            };
            let field = match camel_to_snake(name).as_str() {
                "rank" => OrderField::Rank,
                "create_time" => OrderField::CreateTime,
                "update_time" => OrderField::UpdateTime,
                other => {
                    debug!(field = %other, "Ignoring unknown ordering field");
                    return None;
                }
            };
            Some(OrderTerm { field, descending })
        })
        .collect()
}

fn camel_to_snake(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for ch in name.chars() {
        if ch.is_ascii_uppercase() {
            if !out.is_empty() {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

fn compare(a: &ArticleRecord, b: &ArticleRecord, terms: &[OrderTerm]) -> Ordering {
    for term in terms {
        let ord = match term.field {
            OrderField::Rank => a.article.rank.cmp(&b.article.rank),
            OrderField::CreateTime => a.article.create_time.cmp(&b.article.create_time),
            OrderField::UpdateTime => a.article.update_time.cmp(&b.article.update_time),
        };
        let ord = if term.descending { ord.reverse() } else { ord };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// Position of a record in the first exact-list filter, used when no
/// explicit ordering was asked for.
fn list_position(filter: &ArticleFilter, record: &ArticleRecord) -> Option<usize> {
    let article = &record.article;
    let exact = |f: &Option<FieldFilter>| matches!(f, Some(FieldFilter::Exact(_)));

    if exact(&filter.uids) {
        filter.uids.as_ref()?.position(&article.uid)
    } else if exact(&filter.titles) {
        filter.titles.as_ref()?.position(&article.title)
    } else if exact(&filter.descriptions) {
        filter.descriptions.as_ref()?.position(&article.description)
    } else if exact(&filter.tags) {
        let f = filter.tags.as_ref()?;
        record.tags.iter().filter_map(|t| f.position(&t.name)).min()
    } else if exact(&filter.categories) {
        let f = filter.categories.as_ref()?;
        record.categories.iter().filter_map(|c| f.position(&c.name)).min()
    } else {
        None
    }
}

/// Filtered articles, ordered by the explicit `ordering` when given,
/// otherwise by position in an exact-list filter, otherwise store order.
pub async fn list_articles(store: &dyn ArticleStore, query: &ListQuery) -> Result<Vec<ArticleRecord>> {
    let filter = query.filter();
    let mut records = store.list_articles(&filter).await?;

    let terms = query
        .ordering
        .as_deref()
        .map(parse_ordering)
        .unwrap_or_default();

    if !terms.is_empty() {
        records.sort_by(|a, b| compare(a, b, &terms));
    } else {
        records.sort_by_cached_key(|r| list_position(&filter, r).unwrap_or(usize::MAX));
    }
    Ok(records)
}

/// One article in ingestion shape, or `NotFound`
pub async fn article_data(store: &dyn ArticleStore, uid: &str) -> Result<ArticleData> {
    store
        .find_article(uid)
        .await?
        .map(|record| ArticleData::from(&record))
        .ok_or_else(|| AppError::NotFound(format!("article '{}' not found", uid)))
}

pub async fn search_ad(store: &dyn ArticleStore, uid: &str) -> Result<SearchAdInfo> {
    store
        .find_search_ad(uid)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("search ad '{}' not found", uid)))
}

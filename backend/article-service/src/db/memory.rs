//! In-memory `ArticleStore`
//!
//! Mirrors the PostgreSQL store's ordering and uniqueness rules so services
//! can be exercised without a database. Every write holds the state lock for
//! its whole duration, which gives the same all-or-nothing visibility as a
//! transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::RwLock;

use super::{ArticleFilter, ArticleStore, PoolOrder, PoolScope};
use crate::error::{AppError, Result};
use crate::models::{
    slugify, Article, ArticleInput, ArticleRecord, Category, CategoryGroupRank, CuratedList,
    SearchAdInfo, Tag,
};

#[derive(Debug, Default)]
struct State {
    articles: BTreeMap<String, Article>,
    tags: Vec<Tag>,
    categories: Vec<Category>,
    article_tags: HashMap<String, Vec<i64>>,
    article_categories: HashMap<String, Vec<i64>>,
    ranks: HashMap<String, CategoryGroupRank>,
    search_ads: HashMap<String, SearchAdInfo>,
    next_tag_id: i64,
    next_category_id: i64,
}

impl State {
    fn record(&self, article: &Article) -> ArticleRecord {
        let mut tags: Vec<Tag> = self
            .article_tags
            .get(&article.uid)
            .into_iter()
            .flatten()
            .filter_map(|id| self.tags.iter().find(|t| t.id == *id).cloned())
            .collect();
        tags.sort_by_key(|t| t.id);

        let mut categories: Vec<Category> = self
            .article_categories
            .get(&article.uid)
            .into_iter()
            .flatten()
            .filter_map(|id| self.categories.iter().find(|c| c.id == *id).cloned())
            .collect();
        categories.sort_by_key(|c| c.id);

        ArticleRecord {
            article: article.clone(),
            tags,
            categories,
        }
    }

    fn natural(&self) -> Vec<ArticleRecord> {
        let mut records: Vec<ArticleRecord> =
            self.articles.values().map(|a| self.record(a)).collect();
        sort_records(&mut records, PoolOrder::Natural);
        records
    }

    fn tag_id(&mut self, name: &str) -> i64 {
        if let Some(tag) = self.tags.iter().find(|t| t.name == name) {
            return tag.id;
        }
        self.next_tag_id += 1;
        self.tags.push(Tag {
            id: self.next_tag_id,
            name: name.to_string(),
        });
        self.next_tag_id
    }

    fn category_id(&mut self, name: &str) -> i64 {
        if let Some(category) = self.categories.iter().find(|c| c.name == name) {
            return category.id;
        }
        self.next_category_id += 1;
        self.categories.push(Category {
            id: self.next_category_id,
            name: name.to_string(),
            slug: slugify(name),
        });
        self.next_category_id
    }
}

fn sort_records(records: &mut [ArticleRecord], order: PoolOrder) {
    match order {
        PoolOrder::Rank => records.sort_by(|a, b| {
            (a.article.rank, &a.article.uid).cmp(&(b.article.rank, &b.article.uid))
        }),
        PoolOrder::RecentlyUpdated => records.sort_by(|a, b| {
            b.article
                .update_time
                .cmp(&a.article.update_time)
                .then_with(|| a.article.uid.cmp(&b.article.uid))
        }),
        PoolOrder::Natural => records.sort_by(|a, b| {
            (a.article.create_time, &a.article.uid).cmp(&(b.article.create_time, &b.article.uid))
        }),
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an article with explicit timestamps and relations by name.
    /// Categories are created with `slugify(name)` as slug.
    pub async fn insert(&self, article: Article, tags: &[&str], categories: &[&str]) {
        let mut state = self.state.write().await;
        let tag_ids = tags.iter().map(|n| state.tag_id(n)).collect();
        let category_ids = categories.iter().map(|n| state.category_id(n)).collect();
        state.article_tags.insert(article.uid.clone(), tag_ids);
        state
            .article_categories
            .insert(article.uid.clone(), category_ids);
        state.articles.insert(article.uid.clone(), article);
    }

    pub async fn article_count(&self) -> usize {
        self.state.read().await.articles.len()
    }
}

#[async_trait]
impl ArticleStore for MemoryStore {
    async fn fetch_rank(&self, slug: &str) -> Result<Option<CategoryGroupRank>> {
        Ok(self.state.read().await.ranks.get(slug).cloned())
    }

    async fn replace_rank(&self, slug: &str, rank: &CuratedList) -> Result<CategoryGroupRank> {
        let row = CategoryGroupRank {
            slug: slug.to_string(),
            rank: rank.clone(),
            update_time: Utc::now(),
        };
        self.state
            .write()
            .await
            .ranks
            .insert(slug.to_string(), row.clone());
        Ok(row)
    }

    async fn fetch_by_uids(&self, uids: &[String]) -> Result<Vec<ArticleRecord>> {
        let state = self.state.read().await;
        Ok(uids
            .iter()
            .collect::<HashSet<_>>()
            .into_iter()
            .filter_map(|uid| state.articles.get(uid))
            .map(|a| state.record(a))
            .collect())
    }

    async fn fetch_pool(
        &self,
        exclude: &[String],
        scope: &PoolScope,
        order: PoolOrder,
    ) -> Result<Vec<ArticleRecord>> {
        let state = self.state.read().await;
        let excluded: HashSet<&str> = exclude.iter().map(String::as_str).collect();

        let mut records: Vec<ArticleRecord> = state
            .articles
            .values()
            .filter(|a| !excluded.contains(a.uid.as_str()))
            .map(|a| state.record(a))
            .filter(|r| match scope {
                PoolScope::All => true,
                PoolScope::Category(slug) => r.in_category(slug),
            })
            .collect();
        sort_records(&mut records, order);
        Ok(records)
    }

    async fn find_article(&self, uid: &str) -> Result<Option<ArticleRecord>> {
        let state = self.state.read().await;
        Ok(state.articles.get(uid).map(|a| state.record(a)))
    }

    async fn find_article_by_slug(&self, slug: &str) -> Result<Option<ArticleRecord>> {
        let state = self.state.read().await;
        Ok(state
            .articles
            .values()
            .find(|a| a.slug.as_deref() == Some(slug))
            .map(|a| state.record(a)))
    }

    async fn find_category(&self, slug: &str) -> Result<Option<Category>> {
        let state = self.state.read().await;
        Ok(state.categories.iter().find(|c| c.slug == slug).cloned())
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        let mut categories = self.state.read().await.categories.clone();
        categories.sort_by_key(|c| c.id);
        Ok(categories)
    }

    async fn find_search_ad(&self, uid: &str) -> Result<Option<SearchAdInfo>> {
        Ok(self.state.read().await.search_ads.get(uid).cloned())
    }

    async fn upsert_article(&self, input: &ArticleInput) -> Result<()> {
        let mut state = self.state.write().await;

        // Uniqueness checks run before any mutation so a failed item leaves
        // no trace, matching a rolled back transaction.
        if let Some(slug) = &input.slug {
            let taken = state
                .articles
                .values()
                .any(|a| a.uid != input.uid && a.slug.as_deref() == Some(slug.as_str()));
            if taken {
                return Err(AppError::Database(format!(
                    "duplicate article slug '{}'",
                    slug
                )));
            }
        }
        let categories = input.category_slugs()?;
        for &(name, ref slug) in &categories {
            let clash = state
                .categories
                .iter()
                .any(|c| c.slug == *slug && c.name != name);
            let exists = state.categories.iter().any(|c| c.name == name);
            if clash && !exists {
                return Err(AppError::Database(format!(
                    "duplicate category slug '{}'",
                    slug
                )));
            }
        }

        let now: DateTime<Utc> = Utc::now();
        let create_time = state
            .articles
            .get(&input.uid)
            .map(|a| a.create_time)
            .unwrap_or(now);

        let tag_ids = input.tag_names().into_iter().map(|n| state.tag_id(n)).collect();
        let category_ids = categories
            .iter()
            .map(|(n, _)| state.category_id(n))
            .collect();

        state.article_tags.insert(input.uid.clone(), tag_ids);
        state
            .article_categories
            .insert(input.uid.clone(), category_ids);
        state.articles.insert(
            input.uid.clone(),
            Article {
                uid: input.uid.clone(),
                title: input.title.clone(),
                slug: input.slug.clone(),
                description: input.description.clone(),
                content: input.content.clone(),
                cover_img: input.cover_img.clone(),
                rank: input.rank,
                create_time,
                update_time: now,
            },
        );
        Ok(())
    }

    async fn delete_article(&self, uid: &str) -> Result<bool> {
        let mut state = self.state.write().await;
        state.article_tags.remove(uid);
        state.article_categories.remove(uid);
        Ok(state.articles.remove(uid).is_some())
    }

    async fn upsert_search_ad(&self, input: &SearchAdInfo) -> Result<()> {
        self.state
            .write()
            .await
            .search_ads
            .insert(input.uid.clone(), input.clone());
        Ok(())
    }

    async fn list_search_ads(&self) -> Result<Vec<SearchAdInfo>> {
        let mut ads: Vec<SearchAdInfo> =
            self.state.read().await.search_ads.values().cloned().collect();
        ads.sort_by(|a, b| a.uid.cmp(&b.uid));
        Ok(ads)
    }

    async fn list_articles(&self, filter: &ArticleFilter) -> Result<Vec<ArticleRecord>> {
        let state = self.state.read().await;
        Ok(state
            .natural()
            .into_iter()
            .filter(|r| filter.matches(r))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CategoryInput, TagInput, UNRANKED};
    use chrono::TimeZone;

    fn article(uid: &str, rank: i32, day: u32) -> Article {
        let ts = Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap();
        Article {
            uid: uid.into(),
            title: format!("Title {}", uid),
            slug: None,
            description: String::new(),
            content: String::new(),
            cover_img: String::new(),
            rank,
            create_time: ts,
            update_time: ts,
        }
    }

    fn input(uid: &str, tags: &[&str], categories: &[&str]) -> ArticleInput {
        ArticleInput {
            uid: uid.into(),
            title: "t".into(),
            slug: None,
            description: String::new(),
            content: String::new(),
            cover_img: String::new(),
            rank: UNRANKED,
            tags: tags.iter().map(|n| TagInput { name: n.to_string() }).collect(),
            categories: categories
                .iter()
                .map(|n| CategoryInput { name: n.to_string() })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_pool_orders() {
        let store = MemoryStore::new();
        store.insert(article("b", 5, 1), &[], &["Car"]).await;
        store.insert(article("a", 5, 3), &[], &[]).await;
        store.insert(article("c", 1, 2), &[], &["Car"]).await;

        let uids = |records: Vec<ArticleRecord>| {
            records
                .into_iter()
                .map(|r| r.article.uid)
                .collect::<Vec<_>>()
        };

        let rank = store
            .fetch_pool(&[], &PoolScope::All, PoolOrder::Rank)
            .await
            .unwrap();
        assert_eq!(uids(rank), vec!["c", "a", "b"]);

        let recent = store
            .fetch_pool(&[], &PoolScope::All, PoolOrder::RecentlyUpdated)
            .await
            .unwrap();
        assert_eq!(uids(recent), vec!["a", "c", "b"]);

        let scoped = store
            .fetch_pool(
                &["c".to_string()],
                &PoolScope::Category("car".into()),
                PoolOrder::Natural,
            )
            .await
            .unwrap();
        assert_eq!(uids(scoped), vec!["b"]);
    }

    #[tokio::test]
    async fn test_upsert_rebuilds_relations() {
        let store = MemoryStore::new();
        store
            .upsert_article(&input("a1", &["x", "y"], &["Car"]))
            .await
            .unwrap();
        store
            .upsert_article(&input("a1", &["y"], &["Home", "Car"]))
            .await
            .unwrap();

        let record = store.find_article("a1").await.unwrap().unwrap();
        let tags: Vec<_> = record.tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(tags, vec!["y"]);
        // store order is by id, "Car" was created first
        assert_eq!(record.first_category().unwrap().slug, "car");
        assert_eq!(store.list_categories().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_slug_rejected_without_side_effects() {
        let store = MemoryStore::new();
        let mut first = input("a1", &[], &[]);
        first.slug = Some("same".into());
        store.upsert_article(&first).await.unwrap();

        let mut second = input("a2", &["new-tag"], &[]);
        second.slug = Some("same".into());
        assert!(store.upsert_article(&second).await.is_err());
        assert!(store.find_article("a2").await.unwrap().is_none());
        assert_eq!(store.article_count().await, 1);
    }

    #[tokio::test]
    async fn test_replace_rank_overwrites() {
        let store = MemoryStore::new();
        store
            .replace_rank("index", &CuratedList::new(["a", "b"]))
            .await
            .unwrap();
        store
            .replace_rank("index", &CuratedList::new(["c"]))
            .await
            .unwrap();
        let row = store.fetch_rank("index").await.unwrap().unwrap();
        assert_eq!(row.rank.uids(), &["c"]);
    }

    #[tokio::test]
    async fn test_category_slug_clash_within_one_item() {
        let store = MemoryStore::new();
        let err = store
            .upsert_article(&input("a1", &["x"], &["Car", "car"]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(store.article_count().await, 0);
        assert!(store.list_categories().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_category_slug_wider_than_column_rejected() {
        let store = MemoryStore::new();
        let long_name = "Category ".repeat(6);
        let err = store
            .upsert_article(&input("a1", &[], &[long_name.as_str()]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(store.find_article("a1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_article_drops_relations() {
        let store = MemoryStore::new();
        store
            .upsert_article(&input("a1", &["x"], &["Car"]))
            .await
            .unwrap();

        assert!(store.delete_article("a1").await.unwrap());
        assert!(!store.delete_article("a1").await.unwrap());
        assert!(store.find_article("a1").await.unwrap().is_none());
        let pool = store
            .fetch_pool(&[], &PoolScope::Category("car".into()), PoolOrder::Natural)
            .await
            .unwrap();
        assert!(pool.is_empty());
        // the category itself outlives the article
        assert!(store.find_category("car").await.unwrap().is_some());
    }
}

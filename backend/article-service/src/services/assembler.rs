//! Ranked article assembly
//!
//! A page's candidate sequence is its curated list (in curated order)
//! followed by every other in-scope article in a fallback order. Curated
//! uids that no longer exist are skipped without error.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::rank_resolver;
use super::sampler::{shuffle, ArticleSampler};
use crate::db::{ArticleStore, PoolOrder, PoolScope};
use crate::error::Result;
use crate::metrics::ASSEMBLED_ARTICLES;
use crate::models::ArticleRecord;

/// How the non-curated remainder is ordered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackOrder {
    /// rank ascending, uid as tie-break
    Rank,
    /// most recently updated first
    RecentlyUpdated,
    /// store order (create_time, uid)
    Natural,
    /// store order permuted by the sampler
    Shuffled,
}

impl FallbackOrder {
    fn pool_order(self) -> PoolOrder {
        match self {
            FallbackOrder::Rank => PoolOrder::Rank,
            FallbackOrder::RecentlyUpdated => PoolOrder::RecentlyUpdated,
            FallbackOrder::Natural | FallbackOrder::Shuffled => PoolOrder::Natural,
        }
    }
}

/// Curated articles followed by the fallback pool
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RankedSequence {
    curated: Vec<ArticleRecord>,
    fallback: Vec<ArticleRecord>,
}

/// Category-page view of a sequence
#[derive(Debug, Clone, PartialEq)]
pub struct SplitSequence {
    /// first curated article
    pub top: Option<ArticleRecord>,
    /// remaining curated articles
    pub trending: Vec<ArticleRecord>,
    /// the fallback pool
    pub recent: Vec<ArticleRecord>,
}

impl RankedSequence {
    pub fn new(curated: Vec<ArticleRecord>, fallback: Vec<ArticleRecord>) -> Self {
        Self { curated, fallback }
    }

    pub fn curated(&self) -> &[ArticleRecord] {
        &self.curated
    }

    pub fn fallback(&self) -> &[ArticleRecord] {
        &self.fallback
    }

    pub fn len(&self) -> usize {
        self.curated.len() + self.fallback.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn uids(&self) -> Vec<&str> {
        self.curated
            .iter()
            .chain(self.fallback.iter())
            .map(|r| r.uid())
            .collect()
    }

    pub fn into_vec(self) -> Vec<ArticleRecord> {
        let mut all = self.curated;
        all.extend(self.fallback);
        all
    }

    pub fn split(self) -> SplitSequence {
        let mut curated = self.curated.into_iter();
        SplitSequence {
            top: curated.next(),
            trending: curated.collect(),
            recent: self.fallback,
        }
    }
}

#[derive(Clone)]
pub struct Assembler {
    store: Arc<dyn ArticleStore>,
    sampler: Arc<dyn ArticleSampler>,
}

impl Assembler {
    pub fn new(store: Arc<dyn ArticleStore>, sampler: Arc<dyn ArticleSampler>) -> Self {
        Self { store, sampler }
    }

    pub async fn assemble(
        &self,
        slug: &str,
        scope: &PoolScope,
        order: FallbackOrder,
    ) -> Result<RankedSequence> {
        let curated_list = rank_resolver::resolve(self.store.as_ref(), slug).await?;

        let curated = if curated_list.is_empty() {
            Vec::new()
        } else {
            let mut by_uid: HashMap<String, ArticleRecord> = self
                .store
                .fetch_by_uids(curated_list.uids())
                .await?
                .into_iter()
                .map(|r| (r.article.uid.clone(), r))
                .collect();
            curated_list
                .uids()
                .iter()
                .filter_map(|uid| by_uid.remove(uid))
                .collect::<Vec<_>>()
        };

        let mut fallback = self
            .store
            .fetch_pool(curated_list.uids(), scope, order.pool_order())
            .await?;
        if order == FallbackOrder::Shuffled {
            fallback = shuffle(self.sampler.as_ref(), fallback);
        }

        debug!(
            slug = %slug,
            curated = curated.len(),
            skipped = curated_list.len() - curated.len(),
            fallback = fallback.len(),
            "Assembled ranked sequence"
        );
        ASSEMBLED_ARTICLES
            .with_label_values(&["curated"])
            .observe(curated.len() as f64);
        ASSEMBLED_ARTICLES
            .with_label_values(&["fallback"])
            .observe(fallback.len() as f64);

        Ok(RankedSequence::new(curated, fallback))
    }
}

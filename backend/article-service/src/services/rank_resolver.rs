use tracing::debug;

use crate::db::ArticleStore;
use crate::error::Result;
use crate::models::CuratedList;

/// Curated uid list for `slug`. A missing row or a null list is simply an
/// empty list; only store failures are errors.
pub async fn resolve(store: &dyn ArticleStore, slug: &str) -> Result<CuratedList> {
    let list = store
        .fetch_rank(slug)
        .await?
        .map(|row| row.rank)
        .unwrap_or_default();

    debug!(slug = %slug, curated = list.len(), "Resolved curated list");
    Ok(list)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;

    #[tokio::test]
    async fn test_missing_row_is_empty() {
        let store = MemoryStore::new();
        assert!(resolve(&store, "nope").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_returns_stored_order() {
        let store = MemoryStore::new();
        store
            .replace_rank("index", &CuratedList::new(["b", "a"]))
            .await
            .unwrap();
        let list = resolve(&store, "index").await.unwrap();
        assert_eq!(list.uids(), &["b", "a"]);
    }
}

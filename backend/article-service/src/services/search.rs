use crate::models::ArticleRecord;

/// 0 when the title contains `q`, 1 when only the description does,
/// 2 otherwise. Matching is case-insensitive; an empty query matches all.
fn match_key(record: &ArticleRecord, q_lower: &str) -> u8 {
    if record.article.title.to_lowercase().contains(q_lower) {
        0
    } else if record.article.description.to_lowercase().contains(q_lower) {
        1
    } else {
        2
    }
}

/// Reorder `articles` for query `q` without dropping any. The sort is
/// stable, so articles with the same key keep their input order.
pub fn rank_for_query(mut articles: Vec<ArticleRecord>, q: &str) -> Vec<ArticleRecord> {
    let q_lower = q.to_lowercase();
    articles.sort_by_cached_key(|r| match_key(r, &q_lower));
    articles
}

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use std::collections::HashMap;

use super::{ArticleFilter, ArticleStore, FieldFilter, PoolOrder, PoolScope};
use crate::error::Result;
use crate::models::{
    Article, ArticleInput, ArticleRecord, Category, CategoryGroupRank, CuratedList,
    SearchAdInfo, Tag,
};

const ARTICLE_COLUMNS: &str = "a.uid, a.title, a.slug, a.description, a.content, a.cover_img, \
                               a.rank, a.create_time, a.update_time";

/// sqlx-backed `ArticleStore`
#[derive(Clone)]
pub struct PgArticleStore {
    pool: PgPool,
}

impl PgArticleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Attach tags and categories to `articles`, preserving their order
    async fn load_relations(&self, articles: Vec<Article>) -> Result<Vec<ArticleRecord>> {
        if articles.is_empty() {
            return Ok(Vec::new());
        }
        let uids: Vec<String> = articles.iter().map(|a| a.uid.clone()).collect();

        let tag_rows = sqlx::query(
            r#"
            SELECT at.article_uid, t.id, t.name
            FROM article_article_tags at
            JOIN article_tag t ON t.id = at.tag_id
            WHERE at.article_uid = ANY($1)
            ORDER BY t.id
            "#,
        )
        .bind(&uids)
        .fetch_all(&self.pool)
        .await?;

        let mut tags: HashMap<String, Vec<Tag>> = HashMap::new();
        for row in tag_rows {
            tags.entry(row.try_get("article_uid")?).or_default().push(Tag {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
            });
        }

        let category_rows = sqlx::query(
            r#"
            SELECT ac.article_uid, c.id, c.name, c.slug
            FROM article_article_categories ac
            JOIN article_category c ON c.id = ac.category_id
            WHERE ac.article_uid = ANY($1)
            ORDER BY c.id
            "#,
        )
        .bind(&uids)
        .fetch_all(&self.pool)
        .await?;

        let mut categories: HashMap<String, Vec<Category>> = HashMap::new();
        for row in category_rows {
            categories
                .entry(row.try_get("article_uid")?)
                .or_default()
                .push(Category {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                    slug: row.try_get("slug")?,
                });
        }

        Ok(articles
            .into_iter()
            .map(|article| ArticleRecord {
                tags: tags.remove(&article.uid).unwrap_or_default(),
                categories: categories.remove(&article.uid).unwrap_or_default(),
                article,
            })
            .collect())
    }

    async fn find_one(&self, column: &str, value: &str) -> Result<Option<ArticleRecord>> {
        let sql = format!(
            "SELECT {} FROM article_article a WHERE a.{} = $1",
            ARTICLE_COLUMNS, column
        );
        let article = sqlx::query_as::<_, Article>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;

        match article {
            Some(article) => Ok(self.load_relations(vec![article]).await?.pop()),
            None => Ok(None),
        }
    }
}

fn order_clause(order: PoolOrder) -> &'static str {
    match order {
        PoolOrder::Rank => "a.rank ASC, a.uid ASC",
        PoolOrder::RecentlyUpdated => "a.update_time DESC, a.uid ASC",
        PoolOrder::Natural => "a.create_time ASC, a.uid ASC",
    }
}

/// Escape LIKE wildcards so user input matches literally
fn like_pattern(value: &str) -> String {
    let escaped = value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn push_scalar_filter(qb: &mut QueryBuilder<'_, Postgres>, column: &str, filter: &FieldFilter) {
    qb.push(" AND ");
    match filter {
        FieldFilter::Exact(values) => {
            qb.push(column).push(" = ANY(").push_bind(values.clone()).push(")");
        }
        FieldFilter::Contains(value) => {
            qb.push(column)
                .push(" ILIKE ")
                .push_bind(like_pattern(value));
        }
    }
}

fn push_relation_filter(
    qb: &mut QueryBuilder<'_, Postgres>,
    join_table: &str,
    join_column: &str,
    table: &str,
    filter: &FieldFilter,
) {
    qb.push(format!(
        " AND EXISTS (SELECT 1 FROM {join_table} j JOIN {table} r ON r.id = j.{join_column} \
         WHERE j.article_uid = a.uid AND "
    ));
    match filter {
        FieldFilter::Exact(values) => {
            qb.push("r.name = ANY(").push_bind(values.clone()).push(")");
        }
        FieldFilter::Contains(value) => {
            qb.push("r.name ILIKE ").push_bind(like_pattern(value));
        }
    }
    qb.push(")");
}

#[async_trait]
impl ArticleStore for PgArticleStore {
    async fn fetch_rank(&self, slug: &str) -> Result<Option<CategoryGroupRank>> {
        let row = sqlx::query(
            "SELECT slug, rank, update_time FROM article_category_group_rank WHERE slug = $1",
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let rank: Option<serde_json::Value> = row.try_get("rank")?;
                Ok(Some(CategoryGroupRank {
                    slug: row.try_get("slug")?,
                    rank: CuratedList::from_json(rank.as_ref()),
                    update_time: row.try_get("update_time")?,
                }))
            }
            None => Ok(None),
        }
    }

    async fn replace_rank(&self, slug: &str, rank: &CuratedList) -> Result<CategoryGroupRank> {
        let row = sqlx::query(
            r#"
            INSERT INTO article_category_group_rank (slug, rank)
            VALUES ($1, $2)
            ON CONFLICT (slug) DO UPDATE
            SET rank = EXCLUDED.rank, update_time = NOW()
            RETURNING slug, update_time
            "#,
        )
        .bind(slug)
        .bind(rank.to_json())
        .fetch_one(&self.pool)
        .await?;

        Ok(CategoryGroupRank {
            slug: row.try_get("slug")?,
            rank: rank.clone(),
            update_time: row.try_get("update_time")?,
        })
    }

    async fn fetch_by_uids(&self, uids: &[String]) -> Result<Vec<ArticleRecord>> {
        if uids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {} FROM article_article a WHERE a.uid = ANY($1)",
            ARTICLE_COLUMNS
        );
        let articles = sqlx::query_as::<_, Article>(&sql)
            .bind(uids)
            .fetch_all(&self.pool)
            .await?;
        self.load_relations(articles).await
    }

    async fn fetch_pool(
        &self,
        exclude: &[String],
        scope: &PoolScope,
        order: PoolOrder,
    ) -> Result<Vec<ArticleRecord>> {
        let category_slug = match scope {
            PoolScope::All => None,
            PoolScope::Category(slug) => Some(slug.as_str()),
        };

        let sql = format!(
            r#"
            SELECT {}
            FROM article_article a
            WHERE NOT (a.uid = ANY($1))
              AND ($2::text IS NULL OR EXISTS (
                    SELECT 1
                    FROM article_article_categories ac
                    JOIN article_category c ON c.id = ac.category_id
                    WHERE ac.article_uid = a.uid AND c.slug = $2
              ))
            ORDER BY {}
            "#,
            ARTICLE_COLUMNS,
            order_clause(order)
        );

        let articles = sqlx::query_as::<_, Article>(&sql)
            .bind(exclude)
            .bind(category_slug)
            .fetch_all(&self.pool)
            .await?;
        self.load_relations(articles).await
    }

    async fn find_article(&self, uid: &str) -> Result<Option<ArticleRecord>> {
        self.find_one("uid", uid).await
    }

    async fn find_article_by_slug(&self, slug: &str) -> Result<Option<ArticleRecord>> {
        self.find_one("slug", slug).await
    }

    async fn find_category(&self, slug: &str) -> Result<Option<Category>> {
        let category = sqlx::query_as::<_, Category>(
            "SELECT id, name, slug FROM article_category WHERE slug = $1",
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;
        Ok(category)
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>(
            "SELECT id, name, slug FROM article_category ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(categories)
    }

    async fn find_search_ad(&self, uid: &str) -> Result<Option<SearchAdInfo>> {
        let info = sqlx::query_as::<_, SearchAdInfo>(
            "SELECT uid, terms, channel_id FROM article_search_ad_info WHERE uid = $1",
        )
        .bind(uid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(info)
    }

    async fn upsert_article(&self, input: &ArticleInput) -> Result<()> {
        let categories = input.category_slugs()?;
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO article_article
                (uid, title, slug, description, content, cover_img, rank, update_time)
            VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
            ON CONFLICT (uid) DO UPDATE SET
                title = EXCLUDED.title,
                slug = EXCLUDED.slug,
                description = EXCLUDED.description,
                content = EXCLUDED.content,
                cover_img = EXCLUDED.cover_img,
                rank = EXCLUDED.rank,
                update_time = NOW()
            "#,
        )
        .bind(&input.uid)
        .bind(&input.title)
        .bind(&input.slug)
        .bind(&input.description)
        .bind(&input.content)
        .bind(&input.cover_img)
        .bind(input.rank)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM article_article_tags WHERE article_uid = $1")
            .bind(&input.uid)
            .execute(&mut *tx)
            .await?;

        for name in input.tag_names() {
            let tag_id: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO article_tag (name) VALUES ($1)
                ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
                RETURNING id
                "#,
            )
            .bind(name)
            .fetch_one(&mut *tx)
            .await?;

            sqlx::query("INSERT INTO article_article_tags (article_uid, tag_id) VALUES ($1, $2)")
                .bind(&input.uid)
                .bind(tag_id)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query("DELETE FROM article_article_categories WHERE article_uid = $1")
            .bind(&input.uid)
            .execute(&mut *tx)
            .await?;

        for (name, slug) in categories {
            let existing: Option<i64> = sqlx::query_scalar(
                "SELECT id FROM article_category WHERE name = $1 ORDER BY id LIMIT 1",
            )
            .bind(name)
            .fetch_optional(&mut *tx)
            .await?;

            let category_id = match existing {
                Some(id) => id,
                None => {
                    sqlx::query_scalar(
                        "INSERT INTO article_category (name, slug) VALUES ($1, $2) RETURNING id",
                    )
                    .bind(name)
                    .bind(slug)
                    .fetch_one(&mut *tx)
                    .await?
                }
            };

            sqlx::query(
                "INSERT INTO article_article_categories (article_uid, category_id) VALUES ($1, $2)",
            )
            .bind(&input.uid)
            .bind(category_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete_article(&self, uid: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM article_article_tags WHERE article_uid = $1")
            .bind(uid)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM article_article_categories WHERE article_uid = $1")
            .bind(uid)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM article_article WHERE uid = $1")
            .bind(uid)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        Ok(deleted > 0)
    }

    async fn upsert_search_ad(&self, input: &SearchAdInfo) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO article_search_ad_info (uid, terms, channel_id, update_time)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (uid) DO UPDATE SET
                terms = EXCLUDED.terms,
                channel_id = EXCLUDED.channel_id,
                update_time = NOW()
            "#,
        )
        .bind(&input.uid)
        .bind(&input.terms)
        .bind(&input.channel_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_search_ads(&self) -> Result<Vec<SearchAdInfo>> {
        let ads = sqlx::query_as::<_, SearchAdInfo>(
            "SELECT uid, terms, channel_id FROM article_search_ad_info ORDER BY uid",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(ads)
    }

    async fn list_articles(&self, filter: &ArticleFilter) -> Result<Vec<ArticleRecord>> {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(format!(
            "SELECT {} FROM article_article a WHERE TRUE",
            ARTICLE_COLUMNS
        ));

        if let Some(f) = &filter.uids {
            push_scalar_filter(&mut qb, "a.uid", f);
        }
        if let Some(f) = &filter.titles {
            push_scalar_filter(&mut qb, "a.title", f);
        }
        if let Some(f) = &filter.descriptions {
            push_scalar_filter(&mut qb, "a.description", f);
        }
        if let Some(f) = &filter.tags {
            push_relation_filter(&mut qb, "article_article_tags", "tag_id", "article_tag", f);
        }
        if let Some(f) = &filter.categories {
            push_relation_filter(
                &mut qb,
                "article_article_categories",
                "category_id",
                "article_category",
                f,
            );
        }
        qb.push(" ORDER BY ").push(order_clause(PoolOrder::Natural));

        let articles = qb
            .build_query_as::<Article>()
            .fetch_all(&self.pool)
            .await?;
        self.load_relations(articles).await
    }
}

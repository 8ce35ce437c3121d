//! Article projections
//!
//! Every rendered article shape comes from one projector driven by a
//! `ProjectionDescriptor`: which fields, which image variant, and how the
//! category is shown. Cover images are always signed.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::imgproxy::{ImageVariant, ImgProxy};
use crate::models::{ArticleRecord, Category};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSet {
    /// uid, title, description, tags, category, content, cover_img, rank
    Detail,
    /// uid, title, description, category, cover_img, rank
    Middle,
    /// uid, title, category, cover_img, rank
    Summary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryPolicy {
    /// First category in store order, `null` when there is none
    FirstOnly,
    Omit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectionDescriptor {
    pub fields: FieldSet,
    pub image: ImageVariant,
    pub category: CategoryPolicy,
}

impl ProjectionDescriptor {
    pub const DETAIL: Self = Self::new(FieldSet::Detail);
    pub const MIDDLE: Self = Self::new(FieldSet::Middle);
    pub const SUMMARY: Self = Self::new(FieldSet::Summary);

    const fn new(fields: FieldSet) -> Self {
        Self {
            fields,
            image: ImageVariant::Cover,
            category: CategoryPolicy::FirstOnly,
        }
    }

    pub const fn with_image(self, image: ImageVariant) -> Self {
        Self { image, ..self }
    }

    pub const fn with_category(self, category: CategoryPolicy) -> Self {
        Self { category, ..self }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryView {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

impl From<&Category> for CategoryView {
    fn from(c: &Category) -> Self {
        Self {
            id: c.id,
            name: c.name.clone(),
            slug: c.slug.clone(),
        }
    }
}

/// Rendered article. Fields outside the descriptor's set are left out of
/// the JSON entirely; a shown-but-missing category serializes as `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArticleView {
    pub uid: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Option<CategoryView>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub cover_img: String,
    pub rank: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SitemapEntry {
    pub url: String,
    pub changefreq: &'static str,
    pub priority: f64,
    pub lastmod: String,
}

impl SitemapEntry {
    pub fn new(url: impl Into<String>, changefreq: &'static str, priority: f64, now: DateTime<Utc>) -> Self {
        Self {
            url: url.into(),
            changefreq,
            priority,
            lastmod: format_lastmod(now),
        }
    }

    pub fn for_article(record: &ArticleRecord, now: DateTime<Utc>) -> Self {
        Self::new(format!("/article/{}", record.uid()), "daily", 0.6, now)
    }
}

pub fn format_lastmod(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%dT%H:%M:%S+00:00").to_string()
}

#[derive(Clone)]
pub struct Projector {
    signer: ImgProxy,
}

impl Projector {
    pub fn new(signer: ImgProxy) -> Self {
        Self { signer }
    }

    pub fn project(&self, record: &ArticleRecord, descriptor: &ProjectionDescriptor) -> ArticleView {
        let article = &record.article;
        let detail = descriptor.fields == FieldSet::Detail;
        let with_description = matches!(descriptor.fields, FieldSet::Detail | FieldSet::Middle);

        ArticleView {
            uid: article.uid.clone(),
            title: article.title.clone(),
            description: with_description.then(|| article.description.clone()),
            tags: detail.then(|| record.tags.iter().map(|t| t.name.clone()).collect()),
            category: match descriptor.category {
                CategoryPolicy::FirstOnly => Some(record.first_category().map(CategoryView::from)),
                CategoryPolicy::Omit => None,
            },
            content: detail.then(|| article.content.clone()),
            cover_img: self.signer.url(&article.cover_img, descriptor.image),
            rank: article.rank,
        }
    }

    pub fn project_all<'a, I>(&self, records: I, descriptor: &ProjectionDescriptor) -> Vec<ArticleView>
    where
        I: IntoIterator<Item = &'a ArticleRecord>,
    {
        records
            .into_iter()
            .map(|r| self.project(r, descriptor))
            .collect()
    }
}

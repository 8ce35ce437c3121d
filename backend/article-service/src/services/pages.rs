//! Page assembly: turns store state into the payloads of the public pages

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use super::assembler::{Assembler, FallbackOrder};
use super::pagination::{paginate, Page, PageRequest};
use super::projection::{ArticleView, ProjectionDescriptor, Projector, SitemapEntry};
use super::sampler::{sample, ArticleSampler};
use super::search::rank_for_query;
use crate::db::{ArticleStore, PoolOrder, PoolScope};
use crate::error::{AppError, Result};
use crate::imgproxy::ImageVariant;
use crate::models::SearchAdInfo;

/// Curated slug that drives the index page
pub const INDEX_SLUG: &str = "index";
const INDEX_CANDIDATES: usize = 26;
const POPULAR_COUNT: usize = 10;
const TAGS_PER_GROUP: usize = 6;

/// Fixed tag groups the search page samples its tag cloud from
pub const TAG_GROUPS: [&[&str]; 4] = [
    &["Donate", "Charity", "Non-Profit", "Tax Deduction", "Car Donation", "Motorcycle", "Boat", "Recycle"],
    &["Blueprint", "Design", "Model", "Schema", "Prototype", "Concept", "Production", "Innovation"],
    &["Car", "Truck", "Bike", "Bus", "SUV", "Van", "Motorcycle", "Automobile"],
    &["Fix", "Restore", "Maintenance", "Service", "Mechanics", "Parts", "Replace", "Overhaul"],
];

const CATEGORY_VIEW: ProjectionDescriptor =
    ProjectionDescriptor::MIDDLE.with_image(ImageVariant::Medium);
const SEARCH_VIEW: ProjectionDescriptor =
    ProjectionDescriptor::MIDDLE.with_image(ImageVariant::Small);
const POPULAR_VIEW: ProjectionDescriptor =
    ProjectionDescriptor::SUMMARY.with_image(ImageVariant::Small);
const ARTICLE_VIEW: ProjectionDescriptor =
    ProjectionDescriptor::DETAIL.with_image(ImageVariant::Large);

/// Pagination numbers that go into the response envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageMeta {
    pub count: usize,
    pub page: usize,
    pub page_size: usize,
    pub num_pages: usize,
    pub has_next: bool,
    pub has_previous: bool,
}

impl<T> From<&Page<T>> for PageMeta {
    fn from(page: &Page<T>) -> Self {
        Self {
            count: page.total_count,
            page: page.page,
            page_size: page.page_size,
            num_pages: page.num_pages,
            has_next: page.has_next,
            has_previous: page.has_previous,
        }
    }
}

/// Page payload plus pagination numbers when the page is paginated
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered<T> {
    pub data: T,
    pub meta: Option<PageMeta>,
}

impl<T> Rendered<T> {
    fn plain(data: T) -> Self {
        Self { data, meta: None }
    }

    fn paged(data: T, meta: PageMeta) -> Self {
        Self {
            data,
            meta: Some(meta),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexPage {
    pub swiper_article_list: Vec<ArticleView>,
    pub trending_article_list: Vec<ArticleView>,
    pub latest_article_list: Vec<ArticleView>,
    pub editors_article_list: Vec<ArticleView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryPage {
    pub top_article: Option<ArticleView>,
    pub trending_article_list: Vec<ArticleView>,
    pub recent_article_list: Vec<ArticleView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryDataPage {
    pub recent_article_list: Vec<ArticleView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArticlePage {
    pub current_article: ArticleView,
    pub popular_article_list: Vec<ArticleView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchPage {
    pub search_article_list: Vec<ArticleView>,
    pub is_own: bool,
    pub tag_list: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchDataPage {
    pub search_article_list: Vec<ArticleView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentPage {
    pub search_ad_info: SearchAdInfo,
    pub search_article: ArticleView,
}

#[derive(Clone)]
pub struct PageService {
    store: Arc<dyn ArticleStore>,
    assembler: Assembler,
    projector: Projector,
    sampler: Arc<dyn ArticleSampler>,
}

impl PageService {
    pub fn new(
        store: Arc<dyn ArticleStore>,
        sampler: Arc<dyn ArticleSampler>,
        projector: Projector,
    ) -> Self {
        Self {
            assembler: Assembler::new(store.clone(), sampler.clone()),
            store,
            projector,
            sampler,
        }
    }

    /// The first 26 candidates of the `index` sequence, sliced 4/6/4/12
    pub async fn index(&self) -> Result<Rendered<IndexPage>> {
        let candidates = self
            .assembler
            .assemble(INDEX_SLUG, &PoolScope::All, FallbackOrder::Rank)
            .await?
            .into_vec();

        let views = self.projector.project_all(
            candidates.iter().take(INDEX_CANDIDATES),
            &ProjectionDescriptor::SUMMARY,
        );
        let slice = |from: usize, to: usize| -> Vec<ArticleView> {
            views
                .get(from.min(views.len())..to.min(views.len()))
                .map(<[ArticleView]>::to_vec)
                .unwrap_or_default()
        };

        Ok(Rendered::plain(IndexPage {
            swiper_article_list: slice(0, 4),
            trending_article_list: slice(4, 10),
            latest_article_list: slice(10, 14),
            editors_article_list: slice(14, 26),
        }))
    }

    /// Curated head of a category plus a page of its recently updated rest
    pub async fn category(&self, slug: &str, request: PageRequest) -> Result<Rendered<CategoryPage>> {
        if self.store.find_category(slug).await?.is_none() {
            return Err(AppError::NotFound(format!("category '{}'", slug)));
        }

        let split = self
            .assembler
            .assemble(
                slug,
                &PoolScope::Category(slug.to_string()),
                FallbackOrder::RecentlyUpdated,
            )
            .await?
            .split();

        let recent = paginate(split.recent, request)?;
        let meta = PageMeta::from(&recent);

        Ok(Rendered::paged(
            CategoryPage {
                top_article: split
                    .top
                    .as_ref()
                    .map(|r| self.projector.project(r, &CATEGORY_VIEW)),
                trending_article_list: self.projector.project_all(&split.trending, &CATEGORY_VIEW),
                recent_article_list: self.projector.project_all(&recent.items, &CATEGORY_VIEW),
            },
            meta,
        ))
    }

    /// Only the paginated recent list of a category (infinite scroll)
    pub async fn category_data(
        &self,
        slug: &str,
        request: PageRequest,
    ) -> Result<Rendered<CategoryDataPage>> {
        let split = self
            .assembler
            .assemble(
                slug,
                &PoolScope::Category(slug.to_string()),
                FallbackOrder::RecentlyUpdated,
            )
            .await?
            .split();

        let recent = paginate(split.recent, request)?;
        Ok(Rendered::paged(
            CategoryDataPage {
                recent_article_list: self.projector.project_all(&recent.items, &CATEGORY_VIEW),
            },
            PageMeta::from(&recent),
        ))
    }

    pub async fn article(&self, uid: &str) -> Result<Rendered<ArticlePage>> {
        let current = self
            .store
            .find_article(uid)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("article '{}'", uid)))?;

        let others = self
            .store
            .fetch_pool(&[uid.to_string()], &PoolScope::All, PoolOrder::Natural)
            .await?;
        let popular = sample(self.sampler.as_ref(), &others, POPULAR_COUNT);

        Ok(Rendered::plain(ArticlePage {
            current_article: self.projector.project(&current, &ARTICLE_VIEW),
            popular_article_list: self.projector.project_all(&popular, &POPULAR_VIEW),
        }))
    }

    async fn search_results(&self, q: &str, request: PageRequest) -> Result<(Vec<ArticleView>, PageMeta)> {
        let all = self
            .store
            .fetch_pool(&[], &PoolScope::All, PoolOrder::Natural)
            .await?;
        let page = paginate(rank_for_query(all, q), request)?;
        let meta = PageMeta::from(&page);
        Ok((self.projector.project_all(&page.items, &SEARCH_VIEW), meta))
    }

    pub async fn search(
        &self,
        q: &str,
        sai_id: Option<&str>,
        request: PageRequest,
    ) -> Result<Rendered<SearchPage>> {
        let (search_article_list, meta) = self.search_results(q, request).await?;

        let is_own = match sai_id {
            Some(id) => self
                .store
                .find_search_ad(id)
                .await?
                .map_or(false, |info| info.owns_query(q)),
            None => false,
        };

        Ok(Rendered::paged(
            SearchPage {
                search_article_list,
                is_own,
                tag_list: self.tag_cloud(),
            },
            meta,
        ))
    }

    pub async fn search_data(&self, q: &str, request: PageRequest) -> Result<Rendered<SearchDataPage>> {
        let (search_article_list, meta) = self.search_results(q, request).await?;
        Ok(Rendered::paged(SearchDataPage { search_article_list }, meta))
    }

    pub async fn content(&self, sai_uid: &str, slug: &str) -> Result<Rendered<ContentPage>> {
        let search_ad_info = self
            .store
            .find_search_ad(sai_uid)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("search ad '{}'", sai_uid)))?;
        let article = self
            .store
            .find_article_by_slug(slug)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("article slug '{}'", slug)))?;

        Ok(Rendered::plain(ContentPage {
            search_ad_info,
            search_article: self.projector.project(&article, &ProjectionDescriptor::DETAIL),
        }))
    }

    pub async fn sitemap(&self, now: DateTime<Utc>) -> Result<Rendered<Vec<SitemapEntry>>> {
        let mut entries = vec![
            SitemapEntry::new("/", "weekly", 1.0, now),
            SitemapEntry::new("/q", "weekly", 1.0, now),
        ];
        entries.extend(
            self.store
                .list_categories()
                .await?
                .iter()
                .map(|c| SitemapEntry::new(format!("/c/{}", c.slug), "weekly", 0.9, now)),
        );
        entries.extend(
            self.store
                .fetch_pool(&[], &PoolScope::All, PoolOrder::Natural)
                .await?
                .iter()
                .map(|r| SitemapEntry::for_article(r, now)),
        );
        Ok(Rendered::plain(entries))
    }

    fn tag_cloud(&self) -> Vec<Vec<String>> {
        TAG_GROUPS
            .iter()
            .map(|group| {
                sample(self.sampler.as_ref(), *group, TAGS_PER_GROUP)
                    .into_iter()
                    .map(str::to_string)
                    .collect()
            })
            .collect()
    }
}

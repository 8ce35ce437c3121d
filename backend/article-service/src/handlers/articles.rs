/// Public page handlers
use actix_web::{web, HttpResponse};
use serde::Deserialize;

use super::{envelope, AppState};
use crate::cache::{get_or_compute, page_cache_key};
use crate::error::Result;
use crate::services::PageRequest;

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
    pub size: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub page: Option<String>,
    pub size: Option<String>,
    pub sai_id: Option<String>,
}

impl SearchQuery {
    /// Raw `q`, whitespace included; only the search-ad match trims it
    fn query(&self) -> &str {
        self.q.as_deref().unwrap_or_default()
    }
}

fn page_request(state: &AppState, page: &Option<String>, size: &Option<String>) -> Result<PageRequest> {
    PageRequest::from_query(page.as_deref(), size.as_deref(), &state.pagination)
}

/// Index page
pub async fn get_index_page(state: web::Data<AppState>) -> Result<HttpResponse> {
    let pages = &state.pages;
    let key = page_cache_key("index", &[]);
    let body = get_or_compute(state.cache.as_ref(), "index", &key, state.ttl.index, || async move {
        envelope(pages.index().await?)
    })
    .await?;
    Ok(HttpResponse::Ok().json(body))
}

/// Category page: curated head plus a page of recent articles
pub async fn get_category_page(
    state: web::Data<AppState>,
    slug: web::Path<String>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse> {
    let request = page_request(&state, &query.page, &query.size)?;
    let pages = &state.pages;
    let slug = slug.into_inner();
    let key = page_cache_key(
        "category",
        &[
            ("slug", Some(slug.as_str())),
            ("page", query.page.as_deref()),
            ("size", query.size.as_deref()),
        ],
    );
    let body = get_or_compute(
        state.cache.as_ref(),
        "category",
        &key,
        state.ttl.category,
        || async move { envelope(pages.category(&slug, request).await?) },
    )
    .await?;
    Ok(HttpResponse::Ok().json(body))
}

pub async fn get_category_data(
    state: web::Data<AppState>,
    slug: web::Path<String>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse> {
    let request = page_request(&state, &query.page, &query.size)?;
    let pages = &state.pages;
    let slug = slug.into_inner();
    let key = page_cache_key(
        "category_data",
        &[
            ("slug", Some(slug.as_str())),
            ("page", query.page.as_deref()),
            ("size", query.size.as_deref()),
        ],
    );
    let body = get_or_compute(
        state.cache.as_ref(),
        "category_data",
        &key,
        state.ttl.api_data,
        || async move { envelope(pages.category_data(&slug, request).await?) },
    )
    .await?;
    Ok(HttpResponse::Ok().json(body))
}

/// Article detail with a random "popular" list
pub async fn get_article_page(
    state: web::Data<AppState>,
    uid: web::Path<String>,
) -> Result<HttpResponse> {
    let pages = &state.pages;
    let uid = uid.into_inner();
    let key = page_cache_key("article", &[("uid", Some(uid.as_str()))]);
    let body = get_or_compute(
        state.cache.as_ref(),
        "article",
        &key,
        state.ttl.detail,
        || async move { envelope(pages.article(&uid).await?) },
    )
    .await?;
    Ok(HttpResponse::Ok().json(body))
}

pub async fn get_search_page(
    state: web::Data<AppState>,
    query: web::Query<SearchQuery>,
) -> Result<HttpResponse> {
    let request = page_request(&state, &query.page, &query.size)?;
    let pages = &state.pages;
    let q = query.query();
    let sai_id = query.sai_id.as_deref().filter(|s| !s.is_empty());
    let key = page_cache_key(
        "q",
        &[
            ("q", Some(q)),
            ("page", query.page.as_deref()),
            ("size", query.size.as_deref()),
            ("sai_id", sai_id),
        ],
    );
    let body = get_or_compute(state.cache.as_ref(), "q", &key, state.ttl.query, || async move {
        envelope(pages.search(q, sai_id, request).await?)
    })
    .await?;
    Ok(HttpResponse::Ok().json(body))
}

pub async fn get_search_data(
    state: web::Data<AppState>,
    query: web::Query<SearchQuery>,
) -> Result<HttpResponse> {
    let request = page_request(&state, &query.page, &query.size)?;
    let pages = &state.pages;
    let q = query.query();
    let key = page_cache_key(
        "q_data",
        &[
            ("q", Some(q)),
            ("page", query.page.as_deref()),
            ("size", query.size.as_deref()),
        ],
    );
    let body = get_or_compute(
        state.cache.as_ref(),
        "q_data",
        &key,
        state.ttl.api_data,
        || async move { envelope(pages.search_data(q, request).await?) },
    )
    .await?;
    Ok(HttpResponse::Ok().json(body))
}

/// Landing page for a search ad: the ad record plus one article
pub async fn get_content_page(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse> {
    let pages = &state.pages;
    let (sai_uid, slug) = path.into_inner();
    let key = page_cache_key(
        "content",
        &[("sai_uid", Some(sai_uid.as_str())), ("slug", Some(slug.as_str()))],
    );
    let body = get_or_compute(
        state.cache.as_ref(),
        "content",
        &key,
        state.ttl.search_ad,
        || async move { envelope(pages.content(&sai_uid, &slug).await?) },
    )
    .await?;
    Ok(HttpResponse::Ok().json(body))
}

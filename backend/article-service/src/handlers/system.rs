/// Ingestion API, admin article and search-ad records, and the sitemap
use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde_json::Value;

use super::articles::PageQuery;
use super::{envelope, AppState};
use crate::cache::{get_or_compute, page_cache_key};
use crate::error::Result;
use crate::models::ArticleData;
use crate::services::admin::{self, ListQuery};
use crate::services::pages::{PageMeta, Rendered};
use crate::services::{paginate, BatchPayload, PageRequest, RankUpdate};

/// Upsert a batch of articles. Always 200; per-item outcomes are in the body.
pub async fn batch_add_articles(
    state: web::Data<AppState>,
    payload: web::Json<BatchPayload>,
) -> Result<HttpResponse> {
    let report = state
        .ingestion
        .batch_add_articles(payload.into_inner().data)
        .await;
    Ok(HttpResponse::Ok().json(envelope(Rendered {
        data: report,
        meta: None,
    })?))
}

pub async fn batch_add_search_ads(
    state: web::Data<AppState>,
    payload: web::Json<BatchPayload>,
) -> Result<HttpResponse> {
    let report = state
        .ingestion
        .batch_add_search_ads(payload.into_inner().data)
        .await;
    Ok(HttpResponse::Ok().json(envelope(Rendered {
        data: report,
        meta: None,
    })?))
}

/// Replace a curated list wholesale
pub async fn update_category_rank(
    state: web::Data<AppState>,
    payload: web::Json<RankUpdate>,
) -> Result<HttpResponse> {
    let row = state
        .ingestion
        .update_category_rank(payload.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(envelope(Rendered {
        data: row,
        meta: None,
    })?))
}

/// Filtered, ordered and paginated admin listing in ingestion shape
pub async fn list_article_data(
    state: web::Data<AppState>,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse> {
    let request = PageRequest::from_query(
        query.page.as_deref(),
        query.size.as_deref(),
        &state.pagination,
    )?;
    let records = admin::list_articles(state.store.as_ref(), &query).await?;
    let page = paginate(records, request)?;
    let meta = PageMeta::from(&page);
    let page = page.map(|record| ArticleData::from(&record));

    Ok(HttpResponse::Ok().json(envelope(Rendered {
        data: page.items,
        meta: Some(meta),
    })?))
}

fn single<T: serde::Serialize>(data: T) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(envelope(Rendered { data, meta: None })?))
}

pub async fn get_article_data(
    state: web::Data<AppState>,
    uid: web::Path<String>,
) -> Result<HttpResponse> {
    single(admin::article_data(state.store.as_ref(), &uid).await?)
}

pub async fn create_article_data(
    state: web::Data<AppState>,
    body: web::Json<Value>,
) -> Result<HttpResponse> {
    single(state.ingestion.create_article(body.into_inner()).await?)
}

/// Full replace: omitted fields fall back to their defaults
pub async fn put_article_data(
    state: web::Data<AppState>,
    uid: web::Path<String>,
    body: web::Json<Value>,
) -> Result<HttpResponse> {
    single(
        state
            .ingestion
            .update_article(&uid, body.into_inner(), false)
            .await?,
    )
}

pub async fn patch_article_data(
    state: web::Data<AppState>,
    uid: web::Path<String>,
    body: web::Json<Value>,
) -> Result<HttpResponse> {
    single(
        state
            .ingestion
            .update_article(&uid, body.into_inner(), true)
            .await?,
    )
}

pub async fn delete_article_data(
    state: web::Data<AppState>,
    uid: web::Path<String>,
) -> Result<HttpResponse> {
    state.ingestion.delete_article(&uid).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn list_search_ad_data(
    state: web::Data<AppState>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse> {
    let request = PageRequest::from_query(
        query.page.as_deref(),
        query.size.as_deref(),
        &state.pagination,
    )?;
    let page = paginate(state.store.list_search_ads().await?, request)?;
    let meta = PageMeta::from(&page);

    Ok(HttpResponse::Ok().json(envelope(Rendered {
        data: page.items,
        meta: Some(meta),
    })?))
}

pub async fn get_search_ad_data(
    state: web::Data<AppState>,
    uid: web::Path<String>,
) -> Result<HttpResponse> {
    single(admin::search_ad(state.store.as_ref(), &uid).await?)
}

pub async fn get_sitemap(state: web::Data<AppState>) -> Result<HttpResponse> {
    let pages = &state.pages;
    let key = page_cache_key("sitemap", &[]);
    let body = get_or_compute(
        state.cache.as_ref(),
        "sitemap",
        &key,
        state.ttl.sitemap,
        || async move { envelope(pages.sitemap(Utc::now()).await?) },
    )
    .await?;
    Ok(HttpResponse::Ok().json(body))
}

/// HTTP handlers for article-service
///
/// - `articles`: public pages, all served through the page cache
/// - `system`: token-gated ingestion and admin record API plus the sitemap
///
/// Handlers only parse input, pick a cache key and wrap results in the
/// response envelope. Page assembly lives in `services::pages`.
pub mod articles;
pub mod system;

use actix_web::web;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::cache::PageCache;
use crate::config::{PaginationConfig, RouteTtlConfig};
use crate::db::ArticleStore;
use crate::error::Result;
use crate::middleware::AdminTokenGate;
use crate::services::pages::{PageMeta, Rendered};
use crate::services::{ArticleSampler, IngestionService, PageService, Projector};

pub use articles::{
    get_article_page, get_category_data, get_category_page, get_content_page, get_index_page,
    get_search_data, get_search_page,
};
pub use system::{
    batch_add_articles, batch_add_search_ads, create_article_data, delete_article_data,
    get_article_data, get_search_ad_data, get_sitemap, list_article_data, list_search_ad_data,
    patch_article_data, put_article_data, update_category_rank,
};

/// Shared state handed to every handler through `web::Data`
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ArticleStore>,
    pub cache: Arc<dyn PageCache>,
    pub pages: PageService,
    pub ingestion: IngestionService,
    pub ttl: RouteTtlConfig,
    pub pagination: PaginationConfig,
}

impl AppState {
    pub fn new(
        store: Arc<dyn ArticleStore>,
        cache: Arc<dyn PageCache>,
        sampler: Arc<dyn ArticleSampler>,
        projector: Projector,
        ttl: RouteTtlConfig,
        pagination: PaginationConfig,
    ) -> Self {
        Self {
            pages: PageService::new(store.clone(), sampler, projector),
            ingestion: IngestionService::new(store.clone(), cache.clone()),
            store,
            cache,
            ttl,
            pagination,
        }
    }
}

/// `{ "code": 200, "msg": "ok", "data": ... }`, plus the pagination
/// numbers at the top level when the page has them.
pub fn envelope<T: Serialize>(rendered: Rendered<T>) -> Result<Value> {
    let mut body = Map::new();
    body.insert("code".to_string(), Value::from(200));
    body.insert("msg".to_string(), Value::from("ok"));
    body.insert("data".to_string(), serde_json::to_value(rendered.data)?);

    if let Some(PageMeta {
        count,
        page,
        page_size,
        num_pages,
        has_next,
        has_previous,
    }) = rendered.meta
    {
        body.insert("count".to_string(), Value::from(count));
        body.insert("page".to_string(), Value::from(page));
        body.insert("page_size".to_string(), Value::from(page_size));
        body.insert("num_pages".to_string(), Value::from(num_pages));
        body.insert("has_next".to_string(), Value::from(has_next));
        body.insert("has_previous".to_string(), Value::from(has_previous));
    }

    Ok(Value::Object(body))
}

/// Register every `/api/v1` article route. Admin routes sit behind
/// `AdminTokenGate` with `admin_token`.
pub fn configure(cfg: &mut web::ServiceConfig, admin_token: &str) {
    cfg.service(
        web::scope("/api/v1")
            .service(
                web::scope("/article/page")
                    .route("/index", web::get().to(get_index_page))
                    .route("/c/{slug}", web::get().to(get_category_page))
                    .route("/get-data/{slug}", web::get().to(get_category_data))
                    .route("/article/{uid}", web::get().to(get_article_page))
                    .route("/q", web::get().to(get_search_page))
                    .route("/q/data", web::get().to(get_search_data))
                    .route(
                        "/content/{sai_uid}/{slug}",
                        web::get().to(get_content_page),
                    ),
            )
            .route("/system/page/sitemap", web::get().to(get_sitemap))
            .service(
                web::scope("/system/article")
                    .wrap(AdminTokenGate::new(admin_token))
                    .service(
                        web::resource("/article_data")
                            .route(web::get().to(list_article_data))
                            .route(web::post().to(create_article_data)),
                    )
                    .route(
                        "/article_data/batch_add",
                        web::post().to(batch_add_articles),
                    )
                    .route(
                        "/article_data/update_category_rank",
                        web::post().to(update_category_rank),
                    )
                    .service(
                        web::resource("/article_data/{uid}")
                            .route(web::get().to(get_article_data))
                            .route(web::put().to(put_article_data))
                            .route(web::patch().to(patch_article_data))
                            .route(web::delete().to(delete_article_data)),
                    )
                    .route(
                        "/search_ad_info_data",
                        web::get().to(list_search_ad_data),
                    )
                    .route(
                        "/search_ad_info_data/batch_add",
                        web::post().to(batch_add_search_ads),
                    )
                    .route(
                        "/search_ad_info_data/{uid}",
                        web::get().to(get_search_ad_data),
                    ),
            ),
    );
}

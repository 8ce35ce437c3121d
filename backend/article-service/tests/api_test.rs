//! HTTP-level tests for article-service
//!
//! Routes are registered exactly as in `main`, backed by the in-memory
//! store, an in-memory page cache and a deterministic sampler.

use actix_web::{http::StatusCode, test, web, App};
use article_service::cache::MemoryPageCache;
use article_service::config::{PaginationConfig, RouteTtlConfig};
use article_service::db::MemoryStore;
use article_service::handlers;
use article_service::imgproxy::ImgProxy;
use article_service::services::sampler::OrderedSampler;
use article_service::services::Projector;
use article_service::AppState;
use serde_json::{json, Value};
use std::sync::Arc;

const TOKEN: &str = "test-admin-token";

struct Fixture {
    state: AppState,
    cache: Arc<MemoryPageCache>,
}

fn fixture() -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let cache = Arc::new(MemoryPageCache::new());
    let projector = Projector::new(ImgProxy::new("00", "00", "https://img.test/").unwrap());
    let state = AppState::new(
        store,
        cache.clone(),
        Arc::new(OrderedSampler),
        projector,
        RouteTtlConfig::default(),
        PaginationConfig::default(),
    );
    Fixture { state, cache }
}

macro_rules! app {
    ($fixture:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($fixture.state.clone()))
                .configure(|cfg| handlers::configure(cfg, TOKEN)),
        )
        .await
    };
}

fn article(uid: &str, title: &str, category: &str) -> Value {
    json!({
        "uid": uid,
        "title": title,
        "slug": format!("{}-slug", uid),
        "description": format!("all about {}", title.to_lowercase()),
        "content": "<p>body</p>",
        "cover_img": format!("covers/{}.jpg", uid),
        "tags": [{"name": "guide"}],
        "categories": [{"name": category}]
    })
}

macro_rules! ingest {
    ($app:expr, $items:expr $(,)?) => {{
        let items: Vec<Value> = $items;
        let req = test::TestRequest::post()
            .uri("/api/v1/system/article/article_data/batch_add")
            .insert_header(("Authorization", TOKEN))
            .set_json(json!({ "data": items }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&$app, req).await;
        body
    }};
}

#[actix_web::test]
async fn test_admin_routes_hidden_without_token() {
    let fx = fixture();
    let app = app!(fx);

    let req = test::TestRequest::post()
        .uri("/api/v1/system/article/article_data/batch_add")
        .set_json(json!({"data": [article("a1", "One", "Car")]}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::get()
        .uri("/api/v1/system/article/article_data")
        .insert_header(("Authorization", "wrong"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_batch_add_reports_each_item() {
    let fx = fixture();
    let app = app!(fx);

    let body = ingest!(
        app,
        vec![
            article("a1", "One", "Car"),
            json!({"uid": "way-too-long-uid", "title": "Bad"}),
            article("a3", "Three", "Car"),
        ],
    );

    assert_eq!(body["code"], 200);
    assert_eq!(body["data"]["create_success_uid_list"], json!(["a1", "a3"]));
    assert_eq!(body["data"]["create_error_uid_list"], json!(["way-too-long-uid"]));
}

#[actix_web::test]
async fn test_index_page_sections() {
    let fx = fixture();
    let app = app!(fx);
    let items = (1..=5)
        .map(|i| article(&format!("a{}", i), &format!("Title {}", i), "Car"))
        .collect();
    ingest!(app, items);

    let req = test::TestRequest::get()
        .uri("/api/v1/article/page/index")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["msg"], "ok");
    let data = &body["data"];
    assert_eq!(data["swiper_article_list"].as_array().unwrap().len(), 4);
    assert_eq!(data["trending_article_list"].as_array().unwrap().len(), 1);
    assert_eq!(data["latest_article_list"], json!([]));
    assert_eq!(data["editors_article_list"], json!([]));

    let first = &data["swiper_article_list"][0];
    assert!(first.get("content").is_none());
    assert_eq!(first["category"]["slug"], "car");
    assert!(first["cover_img"]
        .as_str()
        .unwrap()
        .starts_with("https://img.test/"));
}

#[actix_web::test]
async fn test_category_page_and_curation() {
    let fx = fixture();
    let app = app!(fx);
    ingest!(
        app,
        vec![
            article("a1", "One", "Car"),
            article("a2", "Two", "Car"),
            article("a3", "Three", "Home"),
        ],
    );

    let req = test::TestRequest::get()
        .uri("/api/v1/article/page/c/car")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["top_article"], Value::Null);
    assert_eq!(body["count"], 2);

    let req = test::TestRequest::post()
        .uri("/api/v1/system/article/article_data/update_category_rank")
        .insert_header(("Authorization", TOKEN))
        .set_json(json!({"name": "Car", "rank": ["a2", "missing"]}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["slug"], "car");

    // the rank update clears cached pages, so the new curation shows at once
    let req = test::TestRequest::get()
        .uri("/api/v1/article/page/c/car")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["top_article"]["uid"], "a2");
    assert_eq!(body["data"]["trending_article_list"], json!([]));
    let recent: Vec<&str> = body["data"]["recent_article_list"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["uid"].as_str().unwrap())
        .collect();
    assert_eq!(recent, vec!["a1"]);
}

#[actix_web::test]
async fn test_unknown_pages_are_not_found() {
    let fx = fixture();
    let app = app!(fx);

    for uri in [
        "/api/v1/article/page/c/nowhere",
        "/api/v1/article/page/article/none",
        "/api/v1/article/page/content/s1/none",
    ] {
        let req = test::TestRequest::get().uri(uri).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{}", uri);
    }
}

#[actix_web::test]
async fn test_invalid_page_is_bad_request() {
    let fx = fixture();
    let app = app!(fx);
    ingest!(app, vec![article("a1", "One", "Car")]);

    for uri in [
        "/api/v1/article/page/q?q=one&page=abc",
        "/api/v1/article/page/q?q=one&page=0",
        "/api/v1/article/page/q/data?q=one&page=2",
    ] {
        let req = test::TestRequest::get().uri(uri).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{}", uri);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], 400);
    }

    let req = test::TestRequest::get()
        .uri("/api/v1/article/page/q/data?q=one&page=last")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["page"], 1);
}

#[actix_web::test]
async fn test_search_puts_title_matches_first() {
    let fx = fixture();
    let app = app!(fx);
    ingest!(
        app,
        vec![
            article("a1", "Home Guide", "Home"),
            article("a2", "Car Tips", "Car"),
            json!({"uid": "a3", "title": "Roofing", "description": "the car port roof"}),
        ],
    );

    let req = test::TestRequest::get()
        .uri("/api/v1/article/page/q?q=car&size=2")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    let uids: Vec<&str> = body["data"]["search_article_list"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["uid"].as_str().unwrap())
        .collect();
    assert_eq!(uids, vec!["a2", "a3"]);
    assert_eq!(body["count"], 3);
    assert_eq!(body["has_next"], true);
    assert_eq!(body["data"]["is_own"], false);
    assert_eq!(body["data"]["tag_list"].as_array().unwrap().len(), 4);
}

#[actix_web::test]
async fn test_pages_are_cached_until_ingestion() {
    let fx = fixture();
    let app = app!(fx);
    ingest!(app, vec![article("a1", "One", "Car")]);

    let req = test::TestRequest::get()
        .uri("/api/v1/system/page/sitemap")
        .to_request();
    let _: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(fx.cache.len().await, 1);

    ingest!(app, vec![article("a2", "Two", "Car")]);
    assert_eq!(fx.cache.len().await, 0);

    let req = test::TestRequest::get()
        .uri("/api/v1/system/page/sitemap")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let urls: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["url"].as_str().unwrap())
        .collect();
    assert_eq!(urls, vec!["/", "/q", "/c/car", "/article/a1", "/article/a2"]);
}

#[actix_web::test]
async fn test_admin_listing_filters_and_paginates() {
    let fx = fixture();
    let app = app!(fx);
    ingest!(
        app,
        vec![
            article("a1", "Car Tips", "Car"),
            article("a2", "Home Guide", "Home"),
            article("a3", "Car Wash", "Car"),
        ],
    );

    let req = test::TestRequest::get()
        .uri("/api/v1/system/article/article_data?uids=a3,a1&size=1")
        .insert_header(("Authorization", TOKEN))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["count"], 2);
    assert_eq!(body["data"][0]["uid"], "a3");
    assert_eq!(body["data"][0]["categories"], json!([{"name": "Car"}]));
    assert_eq!(body["data"][0]["content"], "<p>body</p>");
}

#[actix_web::test]
async fn test_search_keeps_query_whitespace() {
    let fx = fixture();
    let app = app!(fx);
    ingest!(
        app,
        vec![article("a1", "Tipsy Home", "Home"), article("a2", "Car Tips", "Car")],
    );

    let req = test::TestRequest::get()
        .uri("/api/v1/article/page/q/data?q=%20tips")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let uids: Vec<&str> = body["data"]["search_article_list"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["uid"].as_str().unwrap())
        .collect();
    assert_eq!(uids, vec!["a2", "a1"]);
}

#[actix_web::test]
async fn test_admin_article_record_lifecycle() {
    let fx = fixture();
    let app = app!(fx);
    ingest!(app, vec![article("a1", "One", "Car")]);

    let req = test::TestRequest::get()
        .uri("/api/v1/system/article/article_data/a1")
        .insert_header(("Authorization", TOKEN))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["title"], "One");
    assert_eq!(body["data"]["tags"], json!([{"name": "guide"}]));

    let req = test::TestRequest::patch()
        .uri("/api/v1/system/article/article_data/a1")
        .insert_header(("Authorization", TOKEN))
        .set_json(json!({"title": "One, revised", "rank": 2}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["title"], "One, revised");
    assert_eq!(body["data"]["rank"], 2);
    assert_eq!(body["data"]["categories"], json!([{"name": "Car"}]));

    let req = test::TestRequest::put()
        .uri("/api/v1/system/article/article_data/a1")
        .insert_header(("Authorization", TOKEN))
        .set_json(json!({"title": "Replaced", "categories": [{"name": "Home"}]}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["uid"], "a1");
    assert_eq!(body["data"]["tags"], json!([]));
    assert_eq!(body["data"]["categories"], json!([{"name": "Home"}]));

    let req = test::TestRequest::put()
        .uri("/api/v1/system/article/article_data/a1")
        .insert_header(("Authorization", TOKEN))
        .set_json(json!({"title": "x".repeat(251)}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri("/api/v1/system/article/article_data")
        .insert_header(("Authorization", TOKEN))
        .set_json(article("a2", "Two", "Car"))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["uid"], "a2");

    let req = test::TestRequest::post()
        .uri("/api/v1/system/article/article_data")
        .insert_header(("Authorization", TOKEN))
        .set_json(article("a2", "Two again", "Car"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_admin_delete_clears_cached_pages() {
    let fx = fixture();
    let app = app!(fx);
    ingest!(app, vec![article("a1", "One", "Car"), article("a2", "Two", "Car")]);

    let req = test::TestRequest::get()
        .uri("/api/v1/article/page/article/a1")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(fx.cache.len().await, 1);

    let req = test::TestRequest::delete()
        .uri("/api/v1/system/article/article_data/a1")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(fx.cache.len().await, 1);

    let req = test::TestRequest::delete()
        .uri("/api/v1/system/article/article_data/a1")
        .insert_header(("Authorization", TOKEN))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert_eq!(fx.cache.len().await, 0);

    for (method, status) in [
        (test::TestRequest::delete(), StatusCode::NOT_FOUND),
        (test::TestRequest::get(), StatusCode::NOT_FOUND),
    ] {
        let req = method
            .uri("/api/v1/system/article/article_data/a1")
            .insert_header(("Authorization", TOKEN))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), status);
    }

    let req = test::TestRequest::get()
        .uri("/api/v1/article/page/article/a1")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_admin_search_ad_records() {
    let fx = fixture();
    let app = app!(fx);

    let req = test::TestRequest::post()
        .uri("/api/v1/system/article/search_ad_info_data/batch_add")
        .insert_header(("Authorization", TOKEN))
        .set_json(json!({"data": [
            {"uid": "s2", "terms": "suv", "channel_id": "c2"},
            {"uid": "s1", "terms": "car,van", "channel_id": "c1"},
        ]}))
        .to_request();
    let _: Value = test::call_and_read_body_json(&app, req).await;

    let req = test::TestRequest::get()
        .uri("/api/v1/system/article/search_ad_info_data?size=1")
        .insert_header(("Authorization", TOKEN))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["count"], 2);
    assert_eq!(body["has_next"], true);
    assert_eq!(
        body["data"],
        json!([{"uid": "s1", "terms": "car,van", "channel_id": "c1"}])
    );

    let req = test::TestRequest::get()
        .uri("/api/v1/system/article/search_ad_info_data/s2")
        .insert_header(("Authorization", TOKEN))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["channel_id"], "c2");

    for uri in [
        "/api/v1/system/article/search_ad_info_data/s9",
        "/api/v1/system/article/search_ad_info_data",
    ] {
        let mut req = test::TestRequest::get().uri(uri);
        if uri.ends_with("s9") {
            req = req.insert_header(("Authorization", TOKEN));
        }
        let resp = test::call_service(&app, req.to_request()).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{}", uri);
    }
}

#[actix_web::test]
async fn test_overlong_rank_slug_is_bad_request() {
    let fx = fixture();
    let app = app!(fx);

    let req = test::TestRequest::post()
        .uri("/api/v1/system/article/article_data/update_category_rank")
        .insert_header(("Authorization", TOKEN))
        .set_json(json!({"slug": "s".repeat(51), "rank": ["a1"]}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let long_name = "Category ".repeat(6);
    let body = ingest!(app, vec![article("a1", "One", &long_name)]);
    assert_eq!(body["data"]["create_error_uid_list"], json!(["a1"]));
}

use actix_cors::Cors;
use actix_web::{web, App, HttpResponse, HttpServer};
use anyhow::Context;
use article_service::cache::{NoopPageCache, PageCache, RedisPageCache};
use article_service::db::{pool, ArticleStore, PgArticleStore};
use article_service::handlers;
use article_service::imgproxy::ImgProxy;
use article_service::middleware::RequestMetrics;
use article_service::services::{Projector, ThreadRngSampler};
use article_service::{AppState, Config};
use serde::Serialize;
use sqlx::PgPool;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Backends the health routes look at. Redis is absent when the page
/// cache is disabled.
struct HealthState {
    db_pool: PgPool,
    redis: Option<RedisPageCache>,
}

#[derive(Serialize)]
struct CheckResult {
    ok: bool,
    latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl CheckResult {
    async fn run<F, E>(check: F) -> Self
    where
        F: Future<Output = Result<(), E>>,
        E: std::fmt::Display,
    {
        let start = Instant::now();
        let result = check.await;
        Self {
            ok: result.is_ok(),
            latency_ms: start.elapsed().as_millis() as u64,
            error: result.err().map(|e| e.to_string()),
        }
    }
}

#[derive(Serialize)]
struct Readiness {
    ready: bool,
    postgresql: CheckResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    redis: Option<CheckResult>,
}

async fn ping_postgres(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await.map(|_| ())
}

async fn health_summary(state: web::Data<HealthState>) -> HttpResponse {
    let postgresql = CheckResult::run(ping_postgres(&state.db_pool)).await;
    let body = serde_json::json!({
        "service": "article-service",
        "version": env!("CARGO_PKG_VERSION"),
        "status": if postgresql.ok { "ok" } else { "unhealthy" },
    });

    if postgresql.ok {
        HttpResponse::Ok().json(body)
    } else {
        HttpResponse::ServiceUnavailable().json(body)
    }
}

/// Ready once PostgreSQL answers and, with caching on, Redis does too
async fn readiness_summary(state: web::Data<HealthState>) -> HttpResponse {
    let postgresql = CheckResult::run(ping_postgres(&state.db_pool)).await;
    let redis = match &state.redis {
        Some(cache) => Some(CheckResult::run(cache.ping()).await),
        None => None,
    };

    let ready = postgresql.ok && redis.as_ref().map_or(true, |r| r.ok);
    let body = Readiness {
        ready,
        postgresql,
        redis,
    };

    if ready {
        HttpResponse::Ok().json(body)
    } else {
        HttpResponse::ServiceUnavailable().json(body)
    }
}

async fn liveness_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({"alive": true}))
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = terminate.recv() => {},
                }
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

fn init_tracing() {
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=info,sqlx=warn".into()),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();
}

/// Container healthcheck: `article-service healthcheck`
async fn run_healthcheck() -> anyhow::Result<()> {
    let port = std::env::var("ARTICLE_SERVICE_PORT").unwrap_or_else(|_| "8000".to_string());
    let url = format!("http://127.0.0.1:{}/api/v1/health", port);
    let resp = reqwest::Client::new()
        .get(&url)
        .send()
        .await
        .context("healthcheck HTTP error")?;
    anyhow::ensure!(
        resp.status().is_success(),
        "healthcheck HTTP status: {}",
        resp.status()
    );
    Ok(())
}

fn build_cors(allowed_origins: &str) -> Cors {
    let mut cors = Cors::default();
    for origin in allowed_origins.split(',') {
        let origin = origin.trim();
        if origin.is_empty() {
            continue;
        }
        if origin == "*" {
            cors = cors.allow_any_origin();
        } else {
            cors = cors.allowed_origin(origin);
        }
    }
    cors.allow_any_method().allow_any_header().max_age(3600)
}

/// Article Service
///
/// Serves the index, category, search, article detail and sitemap pages of
/// the content site, and the token-gated ingestion API under
/// `/api/v1/system/article`.
///
/// Runs on port 8000 by default (`ARTICLE_SERVICE_PORT`).
#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    if std::env::args().nth(1).as_deref() == Some("healthcheck") {
        return run_healthcheck().await;
    }

    dotenvy::dotenv().ok();
    init_tracing();

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!("Configuration loading failed: {}", e);
            eprintln!("ERROR: Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("Starting article-service v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Environment: {}", config.app.env);
    if config.auth.token.is_empty() {
        tracing::warn!("AUTH_TOKEN is empty; every admin request will be rejected");
    }

    let db_pool = pool::create_pool(&config.database)
        .await
        .context("Failed to create database pool")?;
    if config.database.run_migrations {
        pool::migrate(&db_pool)
            .await
            .context("Failed to run database migrations")?;
    }

    let redis = if config.cache.enabled {
        let cache = RedisPageCache::connect(&config.cache.url)
            .await
            .context("Failed to initialize Redis connection")?;
        tracing::info!("Page cache backed by Redis");
        Some(cache)
    } else {
        tracing::info!("Page cache disabled");
        None
    };
    let page_cache: Arc<dyn PageCache> = match &redis {
        Some(cache) => Arc::new(cache.clone()),
        None => Arc::new(NoopPageCache),
    };

    let signer = ImgProxy::from_config(&config.imgproxy).context("Invalid imgproxy settings")?;
    let store: Arc<dyn ArticleStore> = Arc::new(PgArticleStore::new(db_pool.clone()));

    let app_state = web::Data::new(AppState::new(
        store,
        page_cache,
        Arc::new(ThreadRngSampler),
        Projector::new(signer),
        config.cache.ttl.clone(),
        config.pagination,
    ));
    let health_state = web::Data::new(HealthState {
        db_pool: db_pool.clone(),
        redis,
    });

    let bind_address = format!("{}:{}", config.app.host, config.app.port);
    tracing::info!("Starting HTTP server at {}", bind_address);

    let allowed_origins = config.cors.allowed_origins.clone();
    let admin_token = config.auth.token.clone();

    let server = HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .app_data(health_state.clone())
            .wrap(RequestMetrics)
            .wrap(build_cors(&allowed_origins))
            .wrap(tracing_actix_web::TracingLogger::default())
            .route(
                "/metrics",
                web::get().to(article_service::metrics::serve_metrics),
            )
            .route("/api/v1/health", web::get().to(health_summary))
            .route("/api/v1/health/ready", web::get().to(readiness_summary))
            .route("/api/v1/health/live", web::get().to(liveness_check))
            .configure(|cfg| handlers::configure(cfg, &admin_token))
    })
    .bind(&bind_address)
    .with_context(|| format!("Failed to bind {}", bind_address))?
    .workers(config.app.workers)
    .run();

    let server_handle = server.handle();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    tokio::select! {
        result = server => {
            result.context("HTTP server error")?;
        }
        _ = &mut shutdown => {
            tracing::info!("Shutdown signal received");
            server_handle.stop(true).await;
        }
    }

    db_pool.close().await;
    tracing::info!("Article-service shutting down");
    Ok(())
}

mod error;
mod extractors;
mod progress;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    routing::get,
    Json, Router,
};
use pulse_common::types::ServiceInfo;
use pulse_config::{init_tracing, AppConfig, ProgressSettings};
use pulse_db::activity::pg_repository::PgActivityRepository;
use pulse_db::progress::pg_repository::PgProgressRepository;
use pulse_progress::service::ProgressService;
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub type PgProgressService = ProgressService<PgActivityRepository, PgProgressRepository>;

#[derive(Clone)]
pub struct AppState {
    pub progress: Arc<PgProgressService>,
    pub admin_api_key: Option<String>,
}

impl AppState {
    pub fn new(pool: PgPool, settings: &ProgressSettings, admin_api_key: Option<String>) -> Self {
        Self {
            progress: Arc::new(ProgressService::new(
                PgActivityRepository::new(pool.clone()),
                PgProgressRepository::new(pool),
                settings.week_start,
            )),
            admin_api_key,
        }
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn info() -> Json<ServiceInfo> {
    Json(ServiceInfo::new("pulse-api"))
}

fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
        ])
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-admin-key"),
        ]);

    Router::new()
        .route("/health", get(health))
        .route("/info", get(info))
        .merge(progress::router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[tokio::main]
async fn main() {
    let config = AppConfig::from_env().expect("failed to load config");
    let settings = ProgressSettings::from_env().expect("invalid progress settings");
    init_tracing(&config.log_level);
    tracing::info!(service = "pulse-api", "starting");

    let pool = pulse_db::create_pool(&config.database_url)
        .await
        .expect("failed to create database pool");
    pulse_db::run_migrations(&pool)
        .await
        .expect("failed to run migrations");

    if config.admin_api_key.is_none() {
        tracing::warn!("ADMIN_API_KEY not set; admin routes are disabled");
    }

    let app = build_router(AppState::new(pool, &settings, config.admin_api_key.clone()));
    let addr: SocketAddr = config.bind_addr().parse().expect("invalid bind address");

    tracing::info!(%addr, "listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");
    axum::serve(listener, app).await.expect("server error");
}

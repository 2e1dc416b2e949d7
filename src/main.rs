use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

mod auth;
mod config;
mod dto;
mod error;
mod handlers;
mod models;
mod services;
mod store;

use config::{Config, StorageBackend};
use services::insights::InsightOptions;
use services::journal::Journal;
use services::policy::CallPolicy;
use store::{LogBackend, MemoryStore, PgStore};

#[derive(Clone)]
pub struct AppState {
    pub journal: Journal,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn insight_options(&self) -> InsightOptions {
        InsightOptions {
            duplicates: self.config.insights_duplicates,
        }
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gutlog_api=debug,tower_http=debug".into()),
        )
        .json()
        .init();

    let config = Arc::new(Config::from_env());
    let policy = CallPolicy::from_config(&config);

    let backend: Arc<dyn LogBackend> = match config.storage_backend {
        StorageBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .expect("DATABASE_URL must be set when STORAGE_BACKEND=postgres");
            let store = PgStore::connect(url, policy.timeout)
                .await
                .expect("Failed to connect to database");

            sqlx::migrate!("./migrations")
                .run(store.pool())
                .await
                .expect("Failed to run database migrations");
            tracing::info!("Database migrations applied");

            Arc::new(store)
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory store; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let state = AppState {
        journal: Journal::new(backend, policy),
        config: config.clone(),
    };

    let app = build_router(state);

    let addr = config.listen_addr();
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind listen address");
    axum::serve(listener, app).await.expect("Server error");
}

pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/readyz", get(handlers::health::readyz));

    let api_routes = Router::new()
        // Daily logs
        .route("/api/daily-logs", post(handlers::daily_logs::create_daily_log))
        .route("/api/daily-logs", get(handlers::daily_logs::list_daily_logs))
        .route("/api/daily-logs/today", get(handlers::daily_logs::get_today))
        .route(
            "/api/daily-logs/:date",
            get(handlers::daily_logs::get_daily_log)
                .put(handlers::daily_logs::put_daily_log)
                .patch(handlers::daily_logs::patch_daily_log)
                .delete(handlers::daily_logs::delete_daily_log),
        )
        .route(
            "/api/daily-logs/:date/:collection",
            put(handlers::daily_logs::replace_collection),
        )
        // History & insights
        .route("/api/history/:year/:month", get(handlers::history::get_month))
        .route("/api/insights", get(handlers::insights::get_insights))
        // Data management
        .route("/api/export", get(handlers::data::export))
        .route("/api/data", delete(handlers::data::delete_all))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::middleware::resolve_session,
        ));

    let mut origins = Vec::new();
    match state.config.frontend_url.parse::<HeaderValue>() {
        Ok(origin) => origins.push(origin),
        Err(_) => tracing::warn!(
            frontend_url = %state.config.frontend_url,
            "FRONTEND_URL is not a valid origin; CORS disabled"
        ),
    }
    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600));

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

use std::{net::SocketAddr, path::Path};

use axum::{extract::DefaultBodyLimit, middleware as axum_middleware, routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod db;
mod error;
mod middleware;
mod routes;
mod services;

#[cfg(test)]
mod test_support;

use services::{integrity, storage::UploadStorage};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Pick up a local .env if there is one
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "creatorlink_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::from_env();

    // Ensure upload directory exists
    UploadStorage::new(&config.upload_path).init().await?;

    // Initialize database
    let db = db::Database::connect(&config.database_url).await?;
    db.run_migrations().await?;

    // Repair counters left behind by writes that bypassed the watch engine
    let repaired = integrity::reconcile(&db.pool).await?;
    if repaired > 0 {
        tracing::info!(repaired, "Reconciled drifted watch counters at startup");
    }

    let state = AppState {
        db,
        config: config.clone(),
    };

    let app = build_router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    // Build protected routes (require authentication)
    let protected_routes = Router::new()
        .merge(routes::profile::router())
        .merge(routes::users::router())
        .merge(routes::projects::router())
        .merge(routes::watches::router())
        .merge(routes::chats::router())
        .merge(routes::discover::router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ));

    // Build API router
    let api_router = Router::new()
        .nest("/auth", routes::auth::router())
        .merge(routes::users::public_router())
        .merge(routes::discover::public_router())
        .merge(protected_routes);

    // Unknown paths fall back to the client app
    let static_path = Path::new(&state.config.static_path);
    let spa = ServeDir::new(static_path)
        .fallback(ServeFile::new(static_path.join("index.html")));

    // Leave room for multipart framing around the largest allowed image
    let body_limit = state.config.max_upload_bytes + 64 * 1024;

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_router)
        .nest_service("/uploads", ServeDir::new(&state.config.upload_path))
        .fallback_service(spa)
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

async fn health_check() -> &'static str {
    "OK"
}

#[derive(Clone)]
pub struct AppState {
    pub db: db::Database,
    pub config: config::Config,
}

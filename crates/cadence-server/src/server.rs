use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use cadence_engine::LifecycleController;

use crate::handlers;

/// Server configuration.
pub struct ServerConfig {
    pub port: u16,
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 9280,
            request_timeout_secs: 30,
        }
    }
}

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<LifecycleController>,
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/api/activities",
            post(handlers::create_activity).get(handlers::list_activities),
        )
        .route(
            "/api/activities/{id}",
            get(handlers::get_activity)
                .patch(handlers::patch_activity)
                .delete(handlers::delete_activity),
        )
        .route(
            "/api/activities/{id}/complete",
            post(handlers::complete_activity),
        )
        .route(
            "/api/activities/{id}/checklist",
            post(handlers::update_checklist),
        )
        .route(
            "/api/activities/{id}/attendees",
            post(handlers::update_attendee),
        )
        .route(
            "/api/activities/{id}/escalate",
            post(handlers::escalate_activity),
        )
        .route("/api/activities/{id}/snooze", post(handlers::snooze_activity))
        .route("/api/activities/{id}/rating", post(handlers::rate_activity))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(CorsLayer::permissive())
}

/// Create and start the server. Returns a handle that keeps it alive.
pub async fn start(
    config: ServerConfig,
    controller: Arc<LifecycleController>,
) -> Result<ServerHandle, std::io::Error> {
    let state = AppState { controller };
    let router = build_router(state, Duration::from_secs(config.request_timeout_secs));

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(port = local_addr.port(), "cadence server started");

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async {
                tokio::signal::ctrl_c().await.ok();
            })
            .await
            .ok();
    });

    Ok(ServerHandle {
        port: local_addr.port(),
        _server: server_handle,
    })
}

/// Handle returned by `start()`.
pub struct ServerHandle {
    pub port: u16,
    _server: tokio::task::JoinHandle<()>,
}

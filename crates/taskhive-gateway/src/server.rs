//! HTTP server implementation using Axum, and the process composition root.

use axum::{
    Router, middleware,
    routing::{delete, get, patch, post, put},
};
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use taskhive_core::TaskHiveConfig;
use taskhive_db::Store;
use taskhive_mailer::{Mailer, Notifier, select_transport};
use taskhive_scheduler::{Scheduler, spawn_scheduler, sweeps};

/// Shared state for the gateway server.
pub struct AppState {
    pub store: Arc<Store>,
    pub notifier: Arc<Notifier>,
    pub config: TaskHiveConfig,
    pub start_time: std::time::Instant,
}

/// Build the Axum router with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    // Protected routes — require a valid bearer token
    let protected = Router::new()
        .route("/users", get(super::routes::list_users))
        .route("/users/me", get(super::routes::current_user))
        .route("/users/{id}", get(super::routes::get_user))
        .route("/projects", post(super::routes::create_project))
        .route("/projects", get(super::routes::list_projects))
        .route("/projects/{id}", get(super::routes::get_project))
        .route("/projects/{id}", patch(super::routes::patch_project))
        .route("/projects/{id}", put(super::routes::update_project))
        .route("/projects/{id}", delete(super::routes::delete_project))
        .route("/tasks", post(super::routes::create_task))
        .route("/tasks", get(super::routes::list_tasks))
        .route("/tasks/{id}", get(super::routes::get_task))
        .route("/tasks/{id}", patch(super::routes::patch_task))
        .route("/tasks/{id}", put(super::routes::update_task))
        .route("/tasks/{id}", delete(super::routes::delete_task))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            crate::auth::require_auth,
        ));

    // Public routes — no auth
    let public = Router::new()
        .route("/", get(super::routes::read_root))
        .route("/health", get(super::routes::health_check))
        .route("/users/register", post(super::routes::register_user))
        .route("/users/login", post(super::routes::login_user));

    protected
        .merge(public)
        .layer({
            let cors = CorsLayer::new()
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::PUT,
                    axum::http::Method::PATCH,
                    axum::http::Method::DELETE,
                    axum::http::Method::OPTIONS,
                ])
                .allow_headers(Any);

            // Restrict CORS origins in production via env var
            // Example: TASKHIVE_CORS_ORIGINS=https://app.example.com
            if let Ok(origins_str) = std::env::var("TASKHIVE_CORS_ORIGINS") {
                let origins: Vec<_> = origins_str
                    .split(',')
                    .filter_map(|s| s.trim().parse::<axum::http::HeaderValue>().ok())
                    .collect();
                cors.allow_origin(origins)
            } else {
                cors.allow_origin(Any)
            }
        })
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the backend: open the store, pick the mail transport, start the
/// delivery queue and the scheduler, then serve HTTP.
pub async fn start(config: TaskHiveConfig) -> anyhow::Result<()> {
    let store = Arc::new(Store::open(Path::new(&config.database.path))?);
    tracing::info!("💾 Store opened: {}", config.database.path);

    let transport = select_transport(&config);
    let mailer = Mailer::start(transport);
    let notifier = Arc::new(Notifier::new(store.clone(), mailer.clone()));

    // Register and spawn the periodic sweeps
    let mut scheduler = Scheduler::new();
    sweeps::register_sweeps(
        &mut scheduler,
        &config.scheduler,
        store.clone(),
        notifier.clone(),
    );
    let scheduler = Arc::new(tokio::sync::Mutex::new(scheduler));
    let check_interval = config.scheduler.check_interval_secs;
    tokio::spawn(async move {
        spawn_scheduler(scheduler, check_interval).await;
    });

    let state = Arc::new(AppState {
        store,
        notifier,
        config: config.clone(),
        start_time: std::time::Instant::now(),
    });
    let app = build_router(state);

    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("🌐 Gateway server listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

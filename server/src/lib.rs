//! Items service: create/read/list/update of completable items, with
//! idempotent replay of keyed creates and `If-Match` guarded updates.

use axum::{extract::DefaultBodyLimit, middleware, routing::get, Router};
use tokio::net::TcpListener;

pub mod concurrency;
pub mod config;
pub mod error;
pub mod handlers;
pub mod http;
pub mod idempotency;
pub mod model;
pub mod state;
pub mod store;

pub use config::{AppConfig, Environment, StoreBackend};
pub use error::{AppError, AppResult};
pub use model::Item;
pub use state::AppState;

/// Router over fresh in-memory stores.
pub fn app() -> Router {
    build_router(AppState::in_memory())
}

pub fn build_router(state: AppState) -> Router {
    let environment = state.environment;
    let router = Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/items",
            get(handlers::list_items).post(handlers::create_item),
        )
        .route(
            "/items/{id}",
            get(handlers::get_item).put(handlers::update_item),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            idempotency::intercept,
        ))
        .layer(DefaultBodyLimit::max(state.max_body_bytes))
        .with_state(state);
    http::apply_standard_layers(router, environment)
}

pub async fn run(listener: TcpListener, state: AppState) -> Result<(), std::io::Error> {
    axum::serve(listener, build_router(state)).await
}

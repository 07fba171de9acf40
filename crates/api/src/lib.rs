//! HTTP API server with observability for the storefront backend.
//!
//! Provides REST endpoints for accounts and orders over any store that
//! supports transactions, with structured logging (tracing) and Prometheus
//! metrics.

pub mod config;
pub mod error;
pub mod extract;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, patch, post};
use domain::{
    AccountService, Argon2Hasher, Authenticator, CredentialHasher, HmacTokenIssuer, OrderService,
    TokenIssuer,
};
use metrics_exporter_prometheus::PrometheusHandle;
use store::{Store, TransactionCoordinator};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;

/// Stores the API can run against.
pub trait AppStore: Store + TransactionCoordinator + Clone + 'static {}

impl<T> AppStore for T where T: Store + TransactionCoordinator + Clone + 'static {}

/// Shared application state accessible from all handlers.
pub struct AppState<S> {
    pub orders: OrderService<S>,
    pub accounts: AccountService<S>,
    pub auth: Authenticator<S>,
}

impl<S: AppStore> AppState<S> {
    pub fn new(
        store: S,
        hasher: Arc<dyn CredentialHasher>,
        tokens: Arc<dyn TokenIssuer>,
    ) -> Self {
        Self {
            orders: OrderService::new(store.clone()),
            accounts: AccountService::new(store.clone(), hasher, Arc::clone(&tokens)),
            auth: Authenticator::new(store, tokens),
        }
    }

    /// Builds the state with Argon2 hashing and HMAC tokens configured from `config`.
    pub fn from_config(store: S, config: &Config) -> Self {
        let tokens = HmacTokenIssuer::new(
            config.access_token_secret.clone(),
            config.refresh_token_secret.clone(),
            config.access_token_ttl(),
            config.refresh_token_ttl(),
        );
        Self::new(store, Arc::new(Argon2Hasher::new()), Arc::new(tokens))
    }
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: AppStore>(state: Arc<AppState<S>>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::ops::metrics))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::ops::health))
        .route("/api/users", post(routes::users::register::<S>))
        .route("/api/users/login", post(routes::users::login::<S>))
        .route("/api/users/{id}", delete(routes::users::remove::<S>))
        .route("/api/users/{id}/disable", patch(routes::users::disable::<S>))
        .route("/api/users/{id}/restore", patch(routes::users::restore::<S>))
        .route(
            "/api/orders",
            post(routes::orders::create::<S>).get(routes::orders::list_mine::<S>),
        )
        .route("/api/orders/all", get(routes::orders::list_all::<S>))
        .route("/api/orders/{id}", get(routes::orders::get::<S>))
        .route("/api/orders/{id}/pay", patch(routes::orders::pay::<S>))
        .route(
            "/api/orders/{id}/delivered",
            patch(routes::orders::deliver::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

//! HTTP surface of ShadowAuth.
//!
//! Every route is served both at the root and under `/api/v1`:
//!
//! | Method | Path              | Purpose                                  |
//! |--------|-------------------|------------------------------------------|
//! | POST   | `/login`          | exchange a World ID proof for a session  |
//! | POST   | `/session/verify` | check a session key                      |
//! | POST   | `/session/revoke` | revoke a session key                     |
//! | GET    | `/runtime/status` | latest runtime health snapshot           |
//! | GET    | `/health`         | liveness                                 |
//!
//! Errors are always `{success: false, error}` with status 400, 401 or 500.
#![deny(clippy::all, clippy::pedantic, clippy::nursery)]

use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use shadowauth_core::{health::RuntimeStatus, SessionCoordinator};
use tokio::{sync::watch, task::JoinHandle, time::MissedTickBehavior};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

pub mod cli;
mod error;
mod handlers;

pub use error::ApiError;

/// Request bodies above this size are refused.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Shared state of the request handlers.
#[derive(Clone)]
pub struct AppState {
    coordinator: Arc<SessionCoordinator>,
    runtime_status: watch::Receiver<RuntimeStatus>,
}

impl AppState {
    /// Creates the state from the coordinator and a health monitor subscription.
    #[must_use]
    pub const fn new(
        coordinator: Arc<SessionCoordinator>,
        runtime_status: watch::Receiver<RuntimeStatus>,
    ) -> Self {
        Self {
            coordinator,
            runtime_status,
        }
    }
}

fn routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(handlers::login).get(handlers::login_info))
        .route(
            "/session/verify",
            post(handlers::verify_session).get(handlers::verify_info),
        )
        .route("/session/revoke", post(handlers::revoke_session))
        .route("/runtime/status", get(handlers::runtime_status))
        .route("/health", get(handlers::health))
}

/// Builds the router with tracing and a body size limit.
#[must_use]
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(routes())
        .nest("/api/v1", routes())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves until `shutdown` resolves.
///
/// # Errors
/// I/O errors from the listener.
pub async fn serve(
    listener: tokio::net::TcpListener,
    state: AppState,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<(), std::io::Error> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

/// Periodically removes expired sessions from the fallback cache. The first sweep runs one
/// `interval` after start.
#[must_use]
pub fn spawn_fallback_sweeper(
    coordinator: Arc<SessionCoordinator>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            coordinator.purge_expired_sessions().await;
        }
    })
}

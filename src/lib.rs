//! Documentation of the weekly contest voting and leaderboard engine.
//!
//!
//!
//! # General Infrastructure
//! - User goes to the public endpoint running a reverse proxy
//! - The proxy authenticates the session and forwards identity as `x-user`
//!   and `x-role` headers; this backend never authenticates itself
//! - Image upload/storage lives in its own service; entries carry opaque
//!   image references only
//!
//!
//!
//! # Contest Engine
//!
//! **Goal**: instantaneous-feeling voting that can never drift from server
//! truth, scoped to weekly Sunday-to-Saturday contest windows.
//!
//! - Vote state lives in a sharded in-process ledger, one lock per
//!   (entry, voter) key, so unrelated voters never serialize
//! - Toggling the same button twice cancels the vote; switching up to down
//!   is one atomic transition applied as a single delta
//! - Writes carry a monotonic sequence per key; a stale write is rejected
//!   with a conflict instead of being applied out of order
//! - Per-entry totals are updated in the same critical section as the vote
//!   write, and a full recount is kept around as a consistency oracle
//! - The leaderboard is recomputed on read from the period's entries; it is
//!   a pure projection and never mutates vote state
//! - Moderation (`pending -> approved | rejected`, winner flag) is layered
//!   on the same entries but can never touch vote tallies
//!
//! ## Client Reconciliation
//!
//! The [`client`] module carries the client-side half: a pure
//! (state, action) reducer applies vote intents optimistically, and the
//! reconciler replaces local state wholesale with server truth on every
//! confirmation, rolling back to the last confirmed snapshot on failure.
//! A request that times out is an unknown outcome; the next authoritative
//! re-fetch decides what actually happened.
//!
//!
//!
//! # Notes
//!
//! ## Periods
//! A contest period is derived from the query instant, never persisted:
//! most recent Sunday 00:00:00 UTC through Saturday 23:59:59.999 UTC.
//! Entries and votes from different periods never mix in one leaderboard.
//!
//! ## Eventual consistency
//! Leaderboard and total reads may land just before or just after an
//! in-flight write, but never observe a torn delta. That tradeoff keeps
//! reads lock-cheap while same-pair writes stay linearizable.

use std::time::Duration;

use axum::{
    http::{header::CONTENT_TYPE, HeaderName, Method},
    routing::{get, post, put},
    Router,
};

use signal::{
    ctrl_c,
    unix::{signal, SignalKind},
};
use tokio::{net::TcpListener, signal};
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod leaderboard;
pub mod ledger;
pub mod model;
pub mod moderation;
pub mod period;
pub mod retry;
pub mod routes;
pub mod state;
pub mod store;

use routes::{
    entries_handler, leaderboard_handler, moderate_handler, submit_handler, votes_handler,
};
use state::AppState;

pub async fn start_server() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = AppState::new();

    info!("Starting server...");

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([
            CONTENT_TYPE,
            HeaderName::from_static("x-user"),
            HeaderName::from_static("x-role"),
        ])
        .max_age(Duration::from_secs(60 * 60));

    let app = Router::new()
        .route("/votes", post(votes_handler))
        .route("/entries", get(entries_handler).post(submit_handler))
        .route("/entries/{id}/moderation", put(moderate_handler))
        .route("/leaderboard", get(leaderboard_handler))
        .layer(cors)
        .with_state(state.clone());

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await.unwrap();
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    println!("Server shutting down...");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        ctrl_c().await.expect("Failed to install Ctrl+C handler");

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal(SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

//! Dashboard — Axum web surface over the engine.
//!
//! A thin presentation collaborator: it translates HTTP to engine commands
//! and renders engine state as JSON. CORS enabled for local development.

pub mod routes;

use anyhow::Result;
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tracing::info;

use routes::AppState;

/// Start the dashboard web server.
///
/// This spawns a background task — it doesn't block.
pub fn spawn_dashboard(state: AppState, port: u16) -> Result<()> {
    let app = build_router(state);

    tokio::spawn(async move {
        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
        info!(port, "Dashboard server starting on http://localhost:{port}");

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .expect("Failed to bind dashboard port");

        axum::serve(listener, app)
            .await
            .expect("Dashboard server error");
    });

    Ok(())
}

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin("*".parse::<HeaderValue>().unwrap())
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        // Reads
        .route("/api/bets", get(routes::list_bets).post(routes::create_bet))
        .route("/api/bets/:id", get(routes::get_bet))
        .route("/api/bets/:id/projection", get(routes::projection))
        .route("/api/bets/:id/positions/:user", get(routes::get_position))
        .route("/api/users/:user/summary", get(routes::user_summary))
        .route("/api/treasury", get(routes::treasury))
        // Commands
        .route("/api/bets/:id/stakes", post(routes::place_stake))
        .route("/api/bets/:id/close", post(routes::close_bet))
        .route("/api/bets/:id/cancel", post(routes::cancel_bet))
        .route("/api/bets/:id/resolve", post(routes::resolve_bet))
        .route("/api/bets/:id/withdraw", post(routes::withdraw))
        .route("/api/treasury/withdraw", post(routes::owner_withdraw))
        .route("/health", get(routes::health))
        .layer(cors)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::BettingEngine;
    use crate::ledger::memory::InMemoryLedger;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use tower::ServiceExt;

    const OWNER: &str = "0xowner";

    fn test_state() -> AppState {
        Arc::new(
            BettingEngine::new(Arc::new(InMemoryLedger::new(OWNER)), OWNER, dec!(10)).unwrap(),
        )
    }

    fn json_post(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = build_router(test_state());
        let resp = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_list_bets_empty() {
        let app = build_router(test_state());
        let resp = app
            .oneshot(Request::builder().uri("/api/bets").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        let json: Vec<serde_json::Value> = serde_json::from_slice(&body).unwrap();
        assert!(json.is_empty());
    }

    #[tokio::test]
    async fn test_create_then_fetch_over_http() {
        let state = test_state();

        let resp = build_router(state.clone())
            .oneshot(json_post(
                "/api/bets",
                r#"{"title": "Wired", "description": "over http", "caller": "0xalice"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);

        let resp = build_router(state)
            .oneshot(Request::builder().uri("/api/bets/0").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["title"], "Wired");
        assert_eq!(json["status"], "Open");
    }

    #[tokio::test]
    async fn test_unknown_bet_is_404() {
        let app = build_router(test_state());
        let resp = app
            .oneshot(Request::builder().uri("/api/bets/7").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let body = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "not_found");
    }

    #[tokio::test]
    async fn test_stake_and_summary_over_http() {
        let state = test_state();
        build_router(state.clone())
            .oneshot(json_post(
                "/api/bets",
                r#"{"title": "Staked", "description": "d", "caller": "0xalice"}"#,
            ))
            .await
            .unwrap();

        let resp = build_router(state.clone())
            .oneshot(json_post(
                "/api/bets/0/stakes",
                r#"{"caller": "0xa", "side": "for", "amount": 2.0}"#,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = build_router(state)
            .oneshot(
                Request::builder()
                    .uri("/api/users/0xa/summary")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["bets_staked"], 1);
        assert_eq!(json["active"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unauthorized_resolve_is_403() {
        let state = test_state();
        build_router(state.clone())
            .oneshot(json_post(
                "/api/bets",
                r#"{"title": "Guarded", "description": "d", "caller": "0xalice"}"#,
            ))
            .await
            .unwrap();

        let resp = build_router(state)
            .oneshot(json_post(
                "/api/bets/0/resolve",
                r#"{"caller": "0xmallory", "for_won": true}"#,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_treasury_endpoint() {
        let app = build_router(test_state());
        let resp = app
            .oneshot(Request::builder().uri("/api/treasury").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["owner_balance"], 0.0);
    }
}

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, Method},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod error;
pub mod extract;
pub mod state;
pub mod middleware;
pub mod catalog;
pub mod carts;
pub mod orders;
pub mod merchant;
pub mod engagement;
pub mod notifications;
pub mod worker;

pub use state::AppState;

use crate::error::AppError;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::USER_AGENT]);

    Router::new()
        .route("/health", get(health))
        .merge(catalog::routes())
        .merge(carts::routes(state.clone()))
        .merge(orders::routes(state.clone()))
        .merge(merchant::routes(state.clone()))
        .merge(engagement::routes(state.clone()))
        .merge(notifications::routes(state.clone()))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn_with_state(state.clone(), rate_limit_middleware))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "service": "mercato-api" }))
}

/// Per-IP fixed window backed by Redis. Fails open when Redis is unreachable
/// or not configured.
async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let (Some(limit), Some(ConnectInfo(addr))) =
        (state.rate_limit.as_ref(), req.extensions().get::<ConnectInfo<SocketAddr>>().copied())
    else {
        return next.run(req).await;
    };

    let client = addr.ip().to_string();
    match limit.redis.check_rate_limit(&client, limit.requests, limit.window_seconds).await {
        Ok(false) => AppError::TooManyRequests("Rate limit exceeded".to_string()).into_response(),
        Ok(true) => next.run(req).await,
        Err(e) => {
            tracing::warn!("Rate limiter unavailable: {}", e);
            next.run(req).await
        }
    }
}

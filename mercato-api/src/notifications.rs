use axum::{
    extract::{Path, Query, State},
    middleware,
    routing::{get, post},
    Extension, Router,
};
use mercato_core::notify::{Notification, NotificationPreferences, PreferencesUpdate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::AppError,
    extract::Json,
    middleware::{customer_auth_middleware, Claims},
    state::AppState,
};

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/v1/notifications", get(list_notifications))
        .route("/v1/notifications/{id}/read", post(mark_read))
        .route("/v1/notifications/preferences", get(get_preferences).put(update_preferences))
        .route_layer(middleware::from_fn_with_state(state, customer_auth_middleware))
}

#[derive(Debug, Default, Deserialize)]
pub struct NotificationFilter {
    #[serde(default)]
    pub unread_only: bool,
}

#[derive(Debug, Serialize)]
pub struct MarkedRead {
    pub id: Uuid,
    pub is_read: bool,
}

/// GET /v1/notifications
/// In-app notifications for the caller, newest first
async fn list_notifications(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(filter): Query<NotificationFilter>,
) -> Result<Json<Vec<Notification>>, AppError> {
    Ok(Json(state.notifications.list(claims.sub, filter.unread_only).await?))
}

async fn mark_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(notification_id): Path<Uuid>,
) -> Result<Json<MarkedRead>, AppError> {
    state.notifications.mark_read(claims.sub, notification_id).await?;
    Ok(Json(MarkedRead { id: notification_id, is_read: true }))
}

async fn get_preferences(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<NotificationPreferences>, AppError> {
    Ok(Json(state.notifications.preferences(claims.sub).await?))
}

/// PUT /v1/notifications/preferences
/// Omitted channels keep their current setting
async fn update_preferences(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(update): Json<PreferencesUpdate>,
) -> Result<Json<NotificationPreferences>, AppError> {
    Ok(Json(state.notifications.update_preferences(claims.sub, update).await?))
}

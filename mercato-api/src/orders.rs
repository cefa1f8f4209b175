use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
    Extension, Router,
};
use mercato_core::{CheckoutReceipt, MerchantActor};
use mercato_order::{CheckoutRequest, FulfillmentAction, OrderDetail, ShipmentDetails, TransitionOutcome};
use uuid::Uuid;

use crate::{
    error::AppError,
    extract::Json,
    middleware::{customer_auth_middleware, merchant_auth_middleware, Claims},
    state::AppState,
};

pub fn routes(state: AppState) -> Router<AppState> {
    let customer = Router::new()
        .route("/v1/orders", post(create_order).get(list_orders))
        .route("/v1/orders/{id}", get(get_order))
        .route_layer(middleware::from_fn_with_state(state.clone(), customer_auth_middleware));

    let merchant = Router::new()
        .route("/v1/orders/{id}/accept", post(accept_sub_order))
        .route("/v1/orders/{id}/reject", post(reject_sub_order))
        .route("/v1/orders/{id}/ship", post(ship_sub_order))
        .route("/v1/orders/{id}/deliver", post(deliver_sub_order))
        .route_layer(middleware::from_fn_with_state(state, merchant_auth_middleware));

    customer.merge(merchant)
}

// ============================================================================
// Customer Handlers
// ============================================================================

/// POST /v1/orders
/// Check out the caller's cart
async fn create_order(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<CheckoutReceipt>), AppError> {
    let receipt = state.checkout.checkout(claims.sub, req).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

async fn list_orders(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<OrderDetail>>, AppError> {
    Ok(Json(state.checkout.list_orders(claims.sub).await?))
}

async fn get_order(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderDetail>, AppError> {
    Ok(Json(state.checkout.get_order(claims.sub, order_id).await?))
}

// ============================================================================
// Merchant Fulfillment Handlers (path id is the sub-order id)
// ============================================================================

async fn transition(
    state: &AppState,
    actor: MerchantActor,
    sub_order_id: Uuid,
    action: FulfillmentAction,
    shipment: ShipmentDetails,
) -> Result<(StatusCode, Json<TransitionOutcome>), AppError> {
    let outcome = state.fulfillment.transition(actor, sub_order_id, action, shipment).await?;
    let status = if outcome.is_applied() { StatusCode::OK } else { StatusCode::CONFLICT };
    Ok((status, Json(outcome)))
}

async fn accept_sub_order(
    State(state): State<AppState>,
    Extension(actor): Extension<MerchantActor>,
    Path(sub_order_id): Path<Uuid>,
) -> Result<(StatusCode, Json<TransitionOutcome>), AppError> {
    transition(&state, actor, sub_order_id, FulfillmentAction::Accept, ShipmentDetails::default()).await
}

async fn reject_sub_order(
    State(state): State<AppState>,
    Extension(actor): Extension<MerchantActor>,
    Path(sub_order_id): Path<Uuid>,
) -> Result<(StatusCode, Json<TransitionOutcome>), AppError> {
    transition(&state, actor, sub_order_id, FulfillmentAction::Reject, ShipmentDetails::default()).await
}

/// POST /v1/orders/:id/ship
/// Body is optional: {tracking_number?, carrier?, estimated_delivery?}
async fn ship_sub_order(
    State(state): State<AppState>,
    Extension(actor): Extension<MerchantActor>,
    Path(sub_order_id): Path<Uuid>,
    body: Bytes,
) -> Result<(StatusCode, Json<TransitionOutcome>), AppError> {
    let shipment = if body.iter().all(u8::is_ascii_whitespace) {
        ShipmentDetails::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::ValidationError(format!("Invalid shipment details: {}", e)))?
    };
    transition(&state, actor, sub_order_id, FulfillmentAction::Ship, shipment).await
}

async fn deliver_sub_order(
    State(state): State<AppState>,
    Extension(actor): Extension<MerchantActor>,
    Path(sub_order_id): Path<Uuid>,
) -> Result<(StatusCode, Json<TransitionOutcome>), AppError> {
    transition(&state, actor, sub_order_id, FulfillmentAction::Deliver, ShipmentDetails::default()).await
}

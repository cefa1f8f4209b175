use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    routing::{delete, get, patch, post},
    Extension, Router,
};
use mercato_catalog::{
    InventoryRecord, InventoryUpdate, Merchant, Product, ProductDraft, ProductFeature, ProductImage,
    ProductSpecification, ProductUpdate, StoreProfileUpdate,
};
use mercato_core::catalog::{NewFeature, NewImage, NewSpecification, ProductListing};
use mercato_core::engagement::MerchantDashboard;
use mercato_core::MerchantActor;
use mercato_order::MerchantSubOrder;
use serde::Deserialize;
use uuid::Uuid;

use crate::{error::AppError, extract::Json, middleware::merchant_auth_middleware, state::AppState};

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/v1/merchant/orders", get(list_sub_orders))
        .route("/v1/merchant/orders/{id}", get(get_sub_order))
        .route("/v1/merchant/dashboard", get(dashboard))
        .route("/v1/merchant/profile", patch(update_profile))
        .route("/v1/merchant/products", get(list_products).post(create_product))
        .route("/v1/merchant/products/{id}", patch(update_product).delete(deactivate_product))
        .route("/v1/merchant/products/{id}/images", post(add_image))
        .route("/v1/merchant/products/{id}/images/{image_id}/set-primary", post(set_primary_image))
        .route("/v1/merchant/products/{id}/images/{image_id}", delete(remove_image))
        .route("/v1/merchant/products/{id}/specifications", post(add_specification))
        .route("/v1/merchant/products/{id}/specifications/{spec_id}", delete(remove_specification))
        .route("/v1/merchant/products/{id}/features", post(add_feature))
        .route("/v1/merchant/products/{id}/features/{feature_id}", delete(remove_feature))
        .route("/v1/merchant/products/{id}/inventory", patch(update_inventory))
        .route_layer(middleware::from_fn_with_state(state, merchant_auth_middleware))
}

#[derive(Debug, Default, Deserialize)]
pub struct SubOrderFilter {
    #[serde(default)]
    pub paid_only: bool,
}

// ============================================================================
// Orders & Dashboard
// ============================================================================

/// GET /v1/merchant/orders
/// Sub-orders addressed to the caller's store, newest first
async fn list_sub_orders(
    State(state): State<AppState>,
    Extension(actor): Extension<MerchantActor>,
    Query(filter): Query<SubOrderFilter>,
) -> Result<Json<Vec<MerchantSubOrder>>, AppError> {
    Ok(Json(state.fulfillment.list_for_merchant(actor, filter.paid_only).await?))
}

async fn get_sub_order(
    State(state): State<AppState>,
    Extension(actor): Extension<MerchantActor>,
    Path(sub_order_id): Path<Uuid>,
) -> Result<Json<MerchantSubOrder>, AppError> {
    Ok(Json(state.fulfillment.get_for_merchant(actor, sub_order_id).await?))
}

async fn dashboard(
    State(state): State<AppState>,
    Extension(actor): Extension<MerchantActor>,
) -> Result<Json<MerchantDashboard>, AppError> {
    Ok(Json(state.engagement.dashboard(actor).await?))
}

async fn update_profile(
    State(state): State<AppState>,
    Extension(actor): Extension<MerchantActor>,
    Json(update): Json<StoreProfileUpdate>,
) -> Result<Json<Merchant>, AppError> {
    Ok(Json(state.engagement.update_store_profile(actor, update).await?))
}

// ============================================================================
// Product Management
// ============================================================================

async fn list_products(
    State(state): State<AppState>,
    Extension(actor): Extension<MerchantActor>,
) -> Result<Json<Vec<ProductListing>>, AppError> {
    Ok(Json(state.catalog.merchant_products(actor).await?))
}

async fn create_product(
    State(state): State<AppState>,
    Extension(actor): Extension<MerchantActor>,
    Json(draft): Json<ProductDraft>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    let product = state.catalog.create_product(actor, draft).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

async fn update_product(
    State(state): State<AppState>,
    Extension(actor): Extension<MerchantActor>,
    Path(product_id): Path<Uuid>,
    Json(update): Json<ProductUpdate>,
) -> Result<Json<Product>, AppError> {
    Ok(Json(state.catalog.update_product(actor, product_id, update).await?))
}

/// DELETE /v1/merchant/products/:id
/// Soft delete: the product is deactivated so past order items keep their link
async fn deactivate_product(
    State(state): State<AppState>,
    Extension(actor): Extension<MerchantActor>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<Product>, AppError> {
    Ok(Json(state.catalog.deactivate_product(actor, product_id).await?))
}

async fn add_image(
    State(state): State<AppState>,
    Extension(actor): Extension<MerchantActor>,
    Path(product_id): Path<Uuid>,
    Json(image): Json<NewImage>,
) -> Result<(StatusCode, Json<ProductImage>), AppError> {
    let image = state.catalog.add_image(actor, product_id, image).await?;
    Ok((StatusCode::CREATED, Json(image)))
}

async fn set_primary_image(
    State(state): State<AppState>,
    Extension(actor): Extension<MerchantActor>,
    Path((product_id, image_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Vec<ProductImage>>, AppError> {
    Ok(Json(state.catalog.set_primary_image(actor, product_id, image_id).await?))
}

async fn remove_image(
    State(state): State<AppState>,
    Extension(actor): Extension<MerchantActor>,
    Path((product_id, image_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Vec<ProductImage>>, AppError> {
    Ok(Json(state.catalog.remove_image(actor, product_id, image_id).await?))
}

async fn add_specification(
    State(state): State<AppState>,
    Extension(actor): Extension<MerchantActor>,
    Path(product_id): Path<Uuid>,
    Json(spec): Json<NewSpecification>,
) -> Result<(StatusCode, Json<ProductSpecification>), AppError> {
    let spec = state.catalog.add_specification(actor, product_id, spec).await?;
    Ok((StatusCode::CREATED, Json(spec)))
}

async fn remove_specification(
    State(state): State<AppState>,
    Extension(actor): Extension<MerchantActor>,
    Path((product_id, spec_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    state.catalog.remove_specification(actor, product_id, spec_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_feature(
    State(state): State<AppState>,
    Extension(actor): Extension<MerchantActor>,
    Path(product_id): Path<Uuid>,
    Json(feature): Json<NewFeature>,
) -> Result<(StatusCode, Json<ProductFeature>), AppError> {
    let feature = state.catalog.add_feature(actor, product_id, feature).await?;
    Ok((StatusCode::CREATED, Json(feature)))
}

async fn remove_feature(
    State(state): State<AppState>,
    Extension(actor): Extension<MerchantActor>,
    Path((product_id, feature_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    state.catalog.remove_feature(actor, product_id, feature_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn update_inventory(
    State(state): State<AppState>,
    Extension(actor): Extension<MerchantActor>,
    Path(product_id): Path<Uuid>,
    Json(update): Json<InventoryUpdate>,
) -> Result<Json<InventoryRecord>, AppError> {
    Ok(Json(state.catalog.update_inventory(actor, product_id, update).await?))
}

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Router,
};
use mercato_catalog::{Category, Merchant, ProductDetail, ProductQuery, Storefront};
use mercato_core::catalog::ProductListing;
use uuid::Uuid;

use crate::{error::AppError, extract::Json, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/products", get(list_products))
        .route("/v1/products/{id}", get(get_product))
        .route("/v1/categories", get(list_categories))
        .route("/v1/categories/{id}/products", get(category_products))
        .route("/v1/merchants", get(list_merchants))
        .route("/v1/merchants/{id}", get(get_storefront))
}

/// GET /v1/products
/// Active products, newest first. Filters: category_id, merchant_id, search,
/// on_sale, featured, page, per_page.
async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Vec<ProductListing>>, AppError> {
    Ok(Json(state.catalog.browse(&query).await?))
}

async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<ProductDetail>, AppError> {
    Ok(Json(state.catalog.detail(product_id).await?))
}

async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>, AppError> {
    Ok(Json(state.catalog.categories().await?))
}

async fn category_products(
    State(state): State<AppState>,
    Path(category_id): Path<Uuid>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Vec<ProductListing>>, AppError> {
    Ok(Json(state.catalog.category_products(category_id, query).await?))
}

async fn list_merchants(State(state): State<AppState>) -> Result<Json<Vec<Merchant>>, AppError> {
    Ok(Json(state.engagement.merchants().await?))
}

/// GET /v1/merchants/:id
/// Storefront: profile, active products and rating
async fn get_storefront(
    State(state): State<AppState>,
    Path(merchant_id): Path<Uuid>,
) -> Result<Json<Storefront>, AppError> {
    Ok(Json(state.engagement.storefront(merchant_id).await?))
}

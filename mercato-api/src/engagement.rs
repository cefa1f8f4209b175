use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
    Extension, Router,
};
use mercato_catalog::{MerchantReview, Product, ProductReview, WishlistToggle};
use mercato_core::engagement::{NewReview, ReviewPage};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    error::AppError,
    extract::Json,
    middleware::{customer_auth_middleware, Claims},
    state::AppState,
};

pub fn routes(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/v1/products/{id}/reviews", get(product_reviews))
        .route("/v1/merchants/{id}/reviews", get(merchant_reviews));

    let customer = Router::new()
        .route("/v1/products/{id}/reviews", post(add_product_review))
        .route("/v1/merchants/{id}/reviews", post(add_merchant_review))
        .route("/v1/products/{id}/wishlist", get(wishlist_status).post(toggle_wishlist))
        .route("/v1/wishlist", get(wishlist))
        .route_layer(middleware::from_fn_with_state(state, customer_auth_middleware));

    public.merge(customer)
}

#[derive(Debug, Serialize)]
pub struct WishlistStatus {
    pub product_id: Uuid,
    pub wishlisted: bool,
}

// ============================================================================
// Reviews
// ============================================================================

/// GET /v1/products/:id/reviews
/// Reviews newest first, with the average rating and count
async fn product_reviews(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<ReviewPage<ProductReview>>, AppError> {
    Ok(Json(state.engagement.product_reviews(product_id).await?))
}

/// POST /v1/products/:id/reviews
/// One review per user and product; a second attempt is a conflict
async fn add_product_review(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(product_id): Path<Uuid>,
    Json(review): Json<NewReview>,
) -> Result<(StatusCode, Json<ProductReview>), AppError> {
    let review = state.engagement.add_product_review(claims.sub, product_id, review).await?;
    Ok((StatusCode::CREATED, Json(review)))
}

async fn merchant_reviews(
    State(state): State<AppState>,
    Path(merchant_id): Path<Uuid>,
) -> Result<Json<ReviewPage<MerchantReview>>, AppError> {
    Ok(Json(state.engagement.merchant_reviews(merchant_id).await?))
}

async fn add_merchant_review(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(merchant_id): Path<Uuid>,
    Json(review): Json<NewReview>,
) -> Result<(StatusCode, Json<MerchantReview>), AppError> {
    let review = state.engagement.add_merchant_review(claims.sub, merchant_id, review).await?;
    Ok((StatusCode::CREATED, Json(review)))
}

// ============================================================================
// Wishlist
// ============================================================================

async fn wishlist_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<WishlistStatus>, AppError> {
    let wishlisted = state.engagement.is_wishlisted(claims.sub, product_id).await?;
    Ok(Json(WishlistStatus { product_id, wishlisted }))
}

/// POST /v1/products/:id/wishlist
/// Adds the product if absent, removes it otherwise. The product's
/// likes_count moves with it.
async fn toggle_wishlist(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<WishlistToggle>, AppError> {
    Ok(Json(state.engagement.toggle_wishlist(claims.sub, product_id).await?))
}

async fn wishlist(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<Product>>, AppError> {
    Ok(Json(state.engagement.wishlist(claims.sub).await?))
}

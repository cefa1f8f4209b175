use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    routing::{delete, get, patch, post},
    Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use mercato_order::{Cart, CartLine, CartView};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::AppError,
    extract::Json,
    middleware::{optional_auth_middleware, MaybeUser},
    state::AppState,
};

/// Cookie carrying the anonymous cart token.
pub const CART_COOKIE: &str = "cart_id";

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/v1/cart", get(get_cart))
        .route("/v1/cart/add_item", post(add_item))
        .route("/v1/cart/update_item/{id}", patch(update_item))
        .route("/v1/cart/remove_item/{id}", delete(remove_item))
        .route("/v1/cart/clear", delete(clear_cart))
        .route_layer(middleware::from_fn_with_state(state, optional_auth_middleware))
}

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: Uuid,
    pub quantity: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub quantity: i32,
}

#[derive(Debug, Serialize)]
pub struct ClearCartResponse {
    pub removed: u64,
}

/// Resolve the caller's cart: the user's own when signed in, otherwise the
/// anonymous cart named by the cookie. A newly issued token is set on the jar.
async fn current_cart(state: &AppState, user: MaybeUser, jar: CookieJar) -> Result<(Cart, CookieJar), AppError> {
    let token = jar.get(CART_COOKIE).map(|c| c.value().to_string());
    let resolved = state.carts.resolve(user.0, token.as_deref()).await?;

    let jar = match resolved.issued_token {
        Some(token) => jar.add(
            Cookie::build((CART_COOKIE, token))
                .path("/")
                .http_only(true)
                .same_site(SameSite::Lax),
        ),
        None => jar,
    };
    Ok((resolved.cart, jar))
}

/// GET /v1/cart
async fn get_cart(
    State(state): State<AppState>,
    user: MaybeUser,
    jar: CookieJar,
) -> Result<(CookieJar, Json<CartView>), AppError> {
    let (cart, jar) = current_cart(&state, user, jar).await?;
    let view = state.carts.view(cart).await?;
    Ok((jar, Json(view)))
}

/// POST /v1/cart/add_item
/// 201 when a new line was created, 200 when merged into an existing one
async fn add_item(
    State(state): State<AppState>,
    user: MaybeUser,
    jar: CookieJar,
    Json(req): Json<AddItemRequest>,
) -> Result<(StatusCode, CookieJar, Json<CartLine>), AppError> {
    let (cart, jar) = current_cart(&state, user, jar).await?;
    let (line, created) = state.carts.add_item(&cart, req.product_id, req.quantity).await?;
    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, jar, Json(line)))
}

async fn update_item(
    State(state): State<AppState>,
    user: MaybeUser,
    jar: CookieJar,
    Path(line_id): Path<Uuid>,
    Json(req): Json<UpdateItemRequest>,
) -> Result<(CookieJar, Json<CartLine>), AppError> {
    let (cart, jar) = current_cart(&state, user, jar).await?;
    let line = state.carts.update_item(&cart, line_id, req.quantity).await?;
    Ok((jar, Json(line)))
}

async fn remove_item(
    State(state): State<AppState>,
    user: MaybeUser,
    jar: CookieJar,
    Path(line_id): Path<Uuid>,
) -> Result<(CookieJar, Json<CartView>), AppError> {
    let (cart, jar) = current_cart(&state, user, jar).await?;
    state.carts.remove_item(&cart, line_id).await?;
    let view = state.carts.view(cart).await?;
    Ok((jar, Json(view)))
}

async fn clear_cart(
    State(state): State<AppState>,
    user: MaybeUser,
    jar: CookieJar,
) -> Result<(CookieJar, Json<ClearCartResponse>), AppError> {
    let (cart, jar) = current_cart(&state, user, jar).await?;
    let removed = state.carts.clear(&cart).await?;
    Ok((jar, Json(ClearCartResponse { removed })))
}

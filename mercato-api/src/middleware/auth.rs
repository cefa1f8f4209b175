use axum::{
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use jsonwebtoken::{decode, DecodingKey, Validation};
use mercato_core::MerchantActor;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use uuid::Uuid;

use crate::state::AppState;

pub const ROLE_CUSTOMER: &str = "CUSTOMER";
pub const ROLE_MERCHANT: &str = "MERCHANT";

// ============================================================================
// JWT Claims
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub role: String,
    /// Present on merchant tokens.
    #[serde(default)]
    pub merchant_id: Option<Uuid>,
    pub exp: usize,
}

impl Claims {
    pub fn merchant(&self) -> Option<MerchantActor> {
        if self.role != ROLE_MERCHANT {
            return None;
        }
        self.merchant_id.map(|merchant_id| MerchantActor { merchant_id, user_id: self.sub })
    }
}

fn decode_claims(state: &AppState, headers: &HeaderMap) -> Result<Claims, StatusCode> {
    let bearer = headers
        .typed_get::<Authorization<Bearer>>()
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token_data = decode::<Claims>(
        bearer.token(),
        &DecodingKey::from_secret(state.auth.secret.as_bytes()),
        &Validation::default(),
    ).map_err(|_| StatusCode::UNAUTHORIZED)?;

    Ok(token_data.claims)
}

// ============================================================================
// Customer Authentication Middleware
// ============================================================================

/// Any signed-in shopper. Merchants can shop too.
pub async fn customer_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let claims = decode_claims(&state, req.headers())?;

    if claims.role != ROLE_CUSTOMER && claims.role != ROLE_MERCHANT {
        return Err(StatusCode::FORBIDDEN);
    }

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

// ============================================================================
// Merchant Authentication Middleware
// ============================================================================

pub async fn merchant_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let claims = decode_claims(&state, req.headers())?;

    let actor = claims.merchant().ok_or(StatusCode::FORBIDDEN)?;

    req.extensions_mut().insert(actor);
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

// ============================================================================
// Optional Authentication (cart endpoints)
// ============================================================================

/// Attaches claims when a bearer token is sent. A malformed or expired token
/// is rejected rather than silently treated as anonymous.
pub async fn optional_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if req.headers().contains_key(axum::http::header::AUTHORIZATION) {
        let claims = decode_claims(&state, req.headers())?;
        req.extensions_mut().insert(claims);
    }
    Ok(next.run(req).await)
}

/// The signed-in user's id, if the request carried valid credentials.
#[derive(Debug, Clone, Copy)]
pub struct MaybeUser(pub Option<Uuid>);

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(parts.extensions.get::<Claims>().map(|c| c.sub)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(role: &str, merchant_id: Option<Uuid>) -> Claims {
        Claims {
            sub: Uuid::new_v4(),
            email: "seller@example.com".to_string(),
            role: role.to_string(),
            merchant_id,
            exp: 0,
        }
    }

    #[test]
    fn test_merchant_actor_requires_role_and_id() {
        let merchant_id = Uuid::new_v4();
        let c = claims(ROLE_MERCHANT, Some(merchant_id));
        assert_eq!(c.merchant().map(|a| a.merchant_id), Some(merchant_id));
        assert!(claims(ROLE_MERCHANT, None).merchant().is_none());
        assert!(claims(ROLE_CUSTOMER, Some(merchant_id)).merchant().is_none());
    }

    #[test]
    fn test_claims_without_merchant_id_deserialize() {
        let json = format!(
            r#"{{"sub":"{}","email":"a@b.c","role":"CUSTOMER","exp":1}}"#,
            Uuid::new_v4()
        );
        let c: Claims = serde_json::from_str(&json).unwrap();
        assert!(c.merchant_id.is_none());
    }
}

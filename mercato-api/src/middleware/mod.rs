pub mod auth;

pub use auth::{
    customer_auth_middleware, merchant_auth_middleware, optional_auth_middleware, Claims, MaybeUser, ROLE_CUSTOMER,
    ROLE_MERCHANT,
};

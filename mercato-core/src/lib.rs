pub mod repository;
pub mod memory;
pub mod notify;
pub mod checkout;
pub mod fulfillment;
pub mod carts;
pub mod catalog;
pub mod engagement;

#[cfg(test)]
mod testing;

use mercato_catalog::{MerchantError, ProductError, ReviewError};
use mercato_order::{CartError, CheckoutError};
use uuid::Uuid;

pub use carts::{CartService, ResolvedCart};
pub use catalog::CatalogService;
pub use checkout::{CheckoutReceipt, CheckoutService};
pub use engagement::EngagementService;
pub use fulfillment::FulfillmentService;
pub use memory::InMemoryStore;
pub use notify::{LogNotificationSink, NotificationService, NotificationSink};

/// A merchant acting on their own store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MerchantActor {
    pub merchant_id: Uuid,
    pub user_id: Uuid,
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Cart not found")]
    CartNotFound,
    #[error("Cart is empty")]
    EmptyCart,
    #[error("Shipping address is required")]
    MissingShippingAddress,
    #[error("{0} not found")]
    NotFound(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Storage error: {0}")]
    Storage(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl From<Box<dyn std::error::Error + Send + Sync>> for CoreError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        CoreError::Storage(err.to_string())
    }
}

impl From<CheckoutError> for CoreError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::EmptyCart => CoreError::EmptyCart,
            CheckoutError::MissingShippingAddress => CoreError::MissingShippingAddress,
            CheckoutError::InvalidAddress(msg) => CoreError::Validation(msg),
            CheckoutError::Pricing(_) => CoreError::Validation(err.to_string()),
        }
    }
}

impl From<CartError> for CoreError {
    fn from(err: CartError) -> Self {
        match err {
            CartError::InvalidQuantity(_) | CartError::QuantityLimit(_) | CartError::Pricing(_) => {
                CoreError::Validation(err.to_string())
            }
            CartError::ProductUnavailable(id) => CoreError::NotFound(format!("Product {}", id)),
            CartError::LineNotFound(id) => CoreError::NotFound(format!("Cart item {}", id)),
        }
    }
}

impl From<ProductError> for CoreError {
    fn from(err: ProductError) -> Self {
        match err {
            ProductError::NotFound(what) => CoreError::NotFound(what),
            ProductError::Invalid(msg) => CoreError::Validation(msg),
        }
    }
}

impl From<ReviewError> for CoreError {
    fn from(err: ReviewError) -> Self {
        CoreError::Validation(err.to_string())
    }
}

impl From<MerchantError> for CoreError {
    fn from(err: MerchantError) -> Self {
        match err {
            MerchantError::NotFound(what) => CoreError::NotFound(what),
            MerchantError::UnknownStatus(_) | MerchantError::Invalid(_) => CoreError::Validation(err.to_string()),
        }
    }
}

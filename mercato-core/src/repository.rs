use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mercato_catalog::{
    Category, InventoryRecord, Merchant, MerchantReview, Product, ProductFeature, ProductImage, ProductQuery,
    ProductReview, ProductSpecification, RatingSummary, WishlistEntry, WishlistToggle,
};
use mercato_order::{Cart, CartLine, CheckoutPlan, MerchantSubOrder, OrderDetail, SubOrder, SubOrderStatus, SubOrderTransition};
use rust_decimal::Decimal;
use std::collections::HashMap;
use uuid::Uuid;

use crate::notify::{Notification, NotificationPreferences};

pub type RepoResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Repository trait for products, their media and categories
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Active products matching the query, newest first.
    async fn list_products(&self, query: &ProductQuery) -> RepoResult<Vec<Product>>;

    /// Every product of a merchant, active or not.
    async fn list_merchant_products(&self, merchant_id: Uuid) -> RepoResult<Vec<Product>>;

    async fn get_product(&self, id: Uuid) -> RepoResult<Option<Product>>;

    /// Products in the order of `ids`; unknown ids are skipped.
    async fn get_products(&self, ids: &[Uuid]) -> RepoResult<Vec<Product>>;

    async fn insert_product(&self, product: &Product) -> RepoResult<()>;

    async fn update_product(&self, product: &Product) -> RepoResult<()>;

    async fn list_images(&self, product_id: Uuid) -> RepoResult<Vec<ProductImage>>;

    /// Replace the whole image set of a product.
    async fn save_images(&self, product_id: Uuid, images: &[ProductImage]) -> RepoResult<()>;

    /// Primary image URL per product, for products that have one.
    async fn primary_images(&self, product_ids: &[Uuid]) -> RepoResult<HashMap<Uuid, String>>;

    async fn list_specifications(&self, product_id: Uuid) -> RepoResult<Vec<ProductSpecification>>;

    async fn insert_specification(&self, spec: &ProductSpecification) -> RepoResult<()>;

    async fn delete_specification(&self, product_id: Uuid, spec_id: Uuid) -> RepoResult<bool>;

    async fn list_features(&self, product_id: Uuid) -> RepoResult<Vec<ProductFeature>>;

    async fn insert_feature(&self, feature: &ProductFeature) -> RepoResult<()>;

    async fn delete_feature(&self, product_id: Uuid, feature_id: Uuid) -> RepoResult<bool>;

    async fn get_inventory(&self, product_id: Uuid) -> RepoResult<Option<InventoryRecord>>;

    async fn get_inventories(&self, product_ids: &[Uuid]) -> RepoResult<HashMap<Uuid, InventoryRecord>>;

    async fn upsert_inventory(&self, record: &InventoryRecord) -> RepoResult<()>;

    async fn list_categories(&self) -> RepoResult<Vec<Category>>;

    async fn get_category(&self, id: Uuid) -> RepoResult<Option<Category>>;
}

/// Repository trait for merchant profiles
#[async_trait]
pub trait MerchantRepository: Send + Sync {
    async fn get_merchant(&self, id: Uuid) -> RepoResult<Option<Merchant>>;

    async fn list_merchants(&self) -> RepoResult<Vec<Merchant>>;

    async fn update_merchant(&self, merchant: &Merchant) -> RepoResult<()>;
}

/// Repository trait for reviews and wishlists
#[async_trait]
pub trait EngagementRepository: Send + Sync {
    async fn find_product_review(&self, product_id: Uuid, user_id: Uuid) -> RepoResult<Option<ProductReview>>;

    async fn insert_product_review(&self, review: &ProductReview) -> RepoResult<()>;

    async fn list_product_reviews(&self, product_id: Uuid) -> RepoResult<Vec<ProductReview>>;

    async fn product_rating(&self, product_id: Uuid) -> RepoResult<RatingSummary>;

    async fn insert_merchant_review(&self, review: &MerchantReview) -> RepoResult<()>;

    async fn list_merchant_reviews(&self, merchant_id: Uuid) -> RepoResult<Vec<MerchantReview>>;

    async fn merchant_rating(&self, merchant_id: Uuid) -> RepoResult<RatingSummary>;

    async fn is_wishlisted(&self, user_id: Uuid, product_id: Uuid) -> RepoResult<bool>;

    /// Add or remove the entry and adjust the product's likes count, atomically.
    async fn toggle_wishlist(&self, user_id: Uuid, product_id: Uuid) -> RepoResult<WishlistToggle>;

    async fn list_wishlist(&self, user_id: Uuid) -> RepoResult<Vec<WishlistEntry>>;
}

/// Repository trait for shopping carts
#[async_trait]
pub trait CartRepository: Send + Sync {
    async fn find_user_cart(&self, user_id: Uuid) -> RepoResult<Option<Cart>>;

    async fn find_anonymous_cart(&self, token: &str) -> RepoResult<Option<Cart>>;

    async fn insert_cart(&self, cart: &Cart) -> RepoResult<()>;

    async fn touch_cart(&self, cart_id: Uuid, updated_at: DateTime<Utc>, expires_at: Option<DateTime<Utc>>) -> RepoResult<()>;

    async fn list_lines(&self, cart_id: Uuid) -> RepoResult<Vec<CartLine>>;

    /// Insert a line or add `quantity` to the existing line for the product.
    /// Returns the resulting line and whether it was newly created, or `None`
    /// (leaving the line untouched) when the merged quantity would exceed
    /// `MAX_LINE_QUANTITY`.
    async fn add_line(&self, line: &CartLine) -> RepoResult<Option<(CartLine, bool)>>;

    async fn set_line_quantity(&self, cart_id: Uuid, line_id: Uuid, quantity: i32) -> RepoResult<Option<CartLine>>;

    async fn remove_line(&self, cart_id: Uuid, line_id: Uuid) -> RepoResult<bool>;

    async fn clear_lines(&self, cart_id: Uuid) -> RepoResult<u64>;

    /// Delete anonymous carts (and their lines) that expired before `now`.
    async fn delete_expired_carts(&self, now: DateTime<Utc>) -> RepoResult<u64>;
}

/// Per-status sub-order count and subtotal sum for one merchant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusTally {
    pub status: SubOrderStatus,
    pub count: i64,
    pub subtotal: Decimal,
}

/// Repository trait for order data access
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Write the whole plan and delete the planned cart lines in one unit of
    /// work. Fails without writing anything if any step fails, including when
    /// a planned cart line no longer exists.
    async fn commit_checkout(&self, cart_id: Uuid, plan: &CheckoutPlan) -> RepoResult<()>;

    async fn get_order(&self, id: Uuid) -> RepoResult<Option<OrderDetail>>;

    async fn list_orders(&self, customer_id: Uuid) -> RepoResult<Vec<OrderDetail>>;

    async fn get_sub_order(&self, id: Uuid) -> RepoResult<Option<SubOrder>>;

    async fn get_merchant_sub_order(&self, id: Uuid) -> RepoResult<Option<MerchantSubOrder>>;

    async fn list_merchant_sub_orders(&self, merchant_id: Uuid, paid_only: bool) -> RepoResult<Vec<MerchantSubOrder>>;

    /// Conditional status write. Returns false when the sub-order was not in
    /// `transition.from` any more.
    async fn apply_transition(&self, transition: &SubOrderTransition) -> RepoResult<bool>;

    async fn has_purchased(&self, user_id: Uuid, product_id: Uuid) -> RepoResult<bool>;

    async fn sub_order_tallies(&self, merchant_id: Uuid) -> RepoResult<Vec<StatusTally>>;
}

/// Repository trait for in-app notifications and channel preferences
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn get_preferences(&self, user_id: Uuid) -> RepoResult<Option<NotificationPreferences>>;

    async fn upsert_preferences(&self, preferences: &NotificationPreferences) -> RepoResult<()>;

    async fn insert_notification(&self, notification: &Notification) -> RepoResult<()>;

    async fn mark_sent(&self, id: Uuid) -> RepoResult<()>;

    async fn list_notifications(&self, user_id: Uuid, unread_only: bool) -> RepoResult<Vec<Notification>>;

    async fn mark_read(&self, user_id: Uuid, id: Uuid) -> RepoResult<bool>;
}

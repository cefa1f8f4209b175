use mercato_catalog::{
    Merchant, MerchantReview, MerchantStatus, Product, ProductQuery, ProductReview, RatingSummary, StoreProfileUpdate,
    Storefront, WishlistToggle,
};
use mercato_order::SubOrderStatus;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::repository::{CatalogRepository, EngagementRepository, MerchantRepository, OrderRepository};
use crate::{CoreError, CoreResult, MerchantActor};

#[derive(Debug, Clone, Deserialize)]
pub struct NewReview {
    pub rating: i16,
    pub comment: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewPage<R> {
    pub reviews: Vec<R>,
    pub rating: RatingSummary,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MerchantDashboard {
    pub total_products: usize,
    pub active_products: usize,
    pub inactive_products: usize,
    pub total_orders: i64,
    pub orders_by_status: BTreeMap<String, i64>,
    /// Sum of subtotals of sub-orders that were not cancelled.
    pub revenue: Decimal,
}

/// Reviews, wishlists, storefronts and the merchant dashboard.
#[derive(Clone)]
pub struct EngagementService {
    catalog: Arc<dyn CatalogRepository>,
    merchants: Arc<dyn MerchantRepository>,
    engagement: Arc<dyn EngagementRepository>,
    orders: Arc<dyn OrderRepository>,
}

impl EngagementService {
    pub fn new(
        catalog: Arc<dyn CatalogRepository>,
        merchants: Arc<dyn MerchantRepository>,
        engagement: Arc<dyn EngagementRepository>,
        orders: Arc<dyn OrderRepository>,
    ) -> Self {
        Self { catalog, merchants, engagement, orders }
    }

    async fn product(&self, product_id: Uuid) -> CoreResult<Product> {
        self.catalog
            .get_product(product_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Product {}", product_id)))
    }

    async fn merchant(&self, merchant_id: Uuid) -> CoreResult<Merchant> {
        self.merchants
            .get_merchant(merchant_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Merchant {}", merchant_id)))
    }

    pub async fn product_reviews(&self, product_id: Uuid) -> CoreResult<ReviewPage<ProductReview>> {
        self.product(product_id).await?;
        Ok(ReviewPage {
            reviews: self.engagement.list_product_reviews(product_id).await?,
            rating: self.engagement.product_rating(product_id).await?,
        })
    }

    /// One review per user and product. Flagged as a verified purchase when
    /// the user has ordered the product.
    pub async fn add_product_review(&self, user_id: Uuid, product_id: Uuid, review: NewReview) -> CoreResult<ProductReview> {
        self.product(product_id).await?;
        if self.engagement.find_product_review(product_id, user_id).await?.is_some() {
            return Err(CoreError::Conflict("you have already reviewed this product".to_string()));
        }
        let verified = self.orders.has_purchased(user_id, product_id).await?;
        let review = ProductReview::new(product_id, user_id, review.rating, review.comment, verified)?;
        self.engagement.insert_product_review(&review).await?;
        tracing::info!(%product_id, %user_id, rating = review.rating, verified, "Product review added");
        Ok(review)
    }

    pub async fn merchant_reviews(&self, merchant_id: Uuid) -> CoreResult<ReviewPage<MerchantReview>> {
        self.merchant(merchant_id).await?;
        Ok(ReviewPage {
            reviews: self.engagement.list_merchant_reviews(merchant_id).await?,
            rating: self.engagement.merchant_rating(merchant_id).await?,
        })
    }

    pub async fn add_merchant_review(&self, user_id: Uuid, merchant_id: Uuid, review: NewReview) -> CoreResult<MerchantReview> {
        self.merchant(merchant_id).await?;
        let review = MerchantReview::new(merchant_id, user_id, review.rating, review.comment)?;
        self.engagement.insert_merchant_review(&review).await?;
        tracing::info!(%merchant_id, %user_id, rating = review.rating, "Merchant review added");
        Ok(review)
    }

    pub async fn is_wishlisted(&self, user_id: Uuid, product_id: Uuid) -> CoreResult<bool> {
        self.product(product_id).await?;
        Ok(self.engagement.is_wishlisted(user_id, product_id).await?)
    }

    pub async fn toggle_wishlist(&self, user_id: Uuid, product_id: Uuid) -> CoreResult<WishlistToggle> {
        self.product(product_id).await?;
        let toggle = self.engagement.toggle_wishlist(user_id, product_id).await?;
        tracing::debug!(%product_id, %user_id, added = toggle.is_added(), "Wishlist toggled");
        Ok(toggle)
    }

    /// Wishlisted products that still exist, newest entry first.
    pub async fn wishlist(&self, user_id: Uuid) -> CoreResult<Vec<Product>> {
        let entries = self.engagement.list_wishlist(user_id).await?;
        let ids: Vec<Uuid> = entries.iter().map(|e| e.product_id).collect();
        Ok(self.catalog.get_products(&ids).await?)
    }

    pub async fn merchants(&self) -> CoreResult<Vec<Merchant>> {
        Ok(self
            .merchants
            .list_merchants()
            .await?
            .into_iter()
            .filter(|m| m.active_status == MerchantStatus::Active)
            .collect())
    }

    pub async fn storefront(&self, merchant_id: Uuid) -> CoreResult<Storefront> {
        let merchant = self.merchant(merchant_id).await?;
        if merchant.active_status != MerchantStatus::Active {
            return Err(CoreError::NotFound(format!("Merchant {}", merchant_id)));
        }
        let products = self
            .catalog
            .list_products(&ProductQuery {
                merchant_id: Some(merchant_id),
                per_page: Some(ProductQuery::MAX_PER_PAGE),
                ..Default::default()
            })
            .await?;
        let rating = self.engagement.merchant_rating(merchant_id).await?;
        Ok(Storefront { merchant, products, rating })
    }

    pub async fn update_store_profile(&self, actor: MerchantActor, update: StoreProfileUpdate) -> CoreResult<Merchant> {
        let mut merchant = self.merchant(actor.merchant_id).await?;
        merchant.apply(update)?;
        self.merchants.update_merchant(&merchant).await?;
        tracing::info!(merchant_id = %merchant.id, "Store profile updated");
        Ok(merchant)
    }

    pub async fn dashboard(&self, actor: MerchantActor) -> CoreResult<MerchantDashboard> {
        let products = self.catalog.list_merchant_products(actor.merchant_id).await?;
        let active_products = products.iter().filter(|p| p.is_active).count();
        let tallies = self.orders.sub_order_tallies(actor.merchant_id).await?;

        let mut orders_by_status: BTreeMap<String, i64> =
            SubOrderStatus::ALL.iter().map(|s| (s.as_str().to_string(), 0)).collect();
        let mut revenue = Decimal::ZERO;
        for tally in &tallies {
            orders_by_status.insert(tally.status.as_str().to_string(), tally.count);
            if tally.status != SubOrderStatus::Cancelled {
                revenue += tally.subtotal;
            }
        }

        Ok(MerchantDashboard {
            total_products: products.len(),
            active_products,
            inactive_products: products.len() - active_products,
            total_orders: tallies.iter().map(|t| t.count).sum(),
            orders_by_status,
            revenue: mercato_catalog::round_money(revenue),
        })
    }
}

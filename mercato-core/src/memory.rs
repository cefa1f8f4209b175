//! In-process implementation of every repository trait.
//!
//! All state sits behind one async mutex, so each repository call is
//! serialized. Checkout commits are staged on a copy of the state and swapped
//! in only when every step succeeds.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mercato_catalog::{
    gallery, Category, InventoryRecord, Merchant, MerchantReview, Product, ProductFeature, ProductImage, ProductQuery,
    ProductReview, ProductSpecification, RatingSummary, WishlistEntry, WishlistToggle,
};
use mercato_order::cart::MAX_LINE_QUANTITY;
use mercato_order::{
    Address, Cart, CartLine, CheckoutPlan, MerchantSubOrder, Order, OrderDetail, OrderItem, PaymentInfo, PaymentStatus,
    SubOrder, SubOrderDetail, SubOrderTransition,
};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::notify::{Notification, NotificationPreferences};
use crate::repository::{
    CartRepository, CatalogRepository, EngagementRepository, MerchantRepository, NotificationRepository,
    OrderRepository, RepoResult, StatusTally,
};

#[derive(Debug, Clone, Default)]
struct State {
    products: HashMap<Uuid, Product>,
    images: HashMap<Uuid, Vec<ProductImage>>,
    specifications: Vec<ProductSpecification>,
    features: Vec<ProductFeature>,
    inventory: HashMap<Uuid, InventoryRecord>,
    categories: HashMap<Uuid, Category>,
    merchants: HashMap<Uuid, Merchant>,
    product_reviews: Vec<ProductReview>,
    merchant_reviews: Vec<MerchantReview>,
    wishlist: Vec<WishlistEntry>,
    carts: HashMap<Uuid, Cart>,
    cart_lines: Vec<CartLine>,
    addresses: HashMap<Uuid, Address>,
    payments: HashMap<Uuid, PaymentInfo>,
    orders: Vec<Order>,
    sub_orders: Vec<SubOrder>,
    order_items: Vec<OrderItem>,
    preferences: HashMap<Uuid, NotificationPreferences>,
    notifications: Vec<Notification>,
}

impl State {
    fn items_of(&self, sub_order_id: Uuid) -> Vec<OrderItem> {
        self.order_items
            .iter()
            .filter(|i| i.sub_order_id == sub_order_id)
            .cloned()
            .collect()
    }

    fn order_detail(&self, order: &Order) -> OrderDetail {
        let sub_orders = self
            .sub_orders
            .iter()
            .filter(|s| s.order_id == order.id)
            .map(|s| SubOrderDetail { sub_order: s.clone(), items: self.items_of(s.id) })
            .collect();
        OrderDetail {
            order: order.clone(),
            shipping_address: self.addresses.get(&order.shipping_address_id).cloned(),
            payment: self.payments.get(&order.payment_id).cloned(),
            sub_orders,
        }
    }

    fn merchant_view(&self, sub_order: &SubOrder) -> Option<MerchantSubOrder> {
        let order = self.orders.iter().find(|o| o.id == sub_order.order_id)?;
        let payment_status = self
            .payments
            .get(&order.payment_id)
            .map(|p| p.status)
            .unwrap_or(PaymentStatus::Pending);
        Some(MerchantSubOrder {
            sub_order: sub_order.clone(),
            order_number: order.order_number.clone(),
            customer_id: order.customer_id,
            payment_status,
            shipping_address: self.addresses.get(&order.shipping_address_id).cloned(),
            items: self.items_of(sub_order.id),
        })
    }

    fn rating_of<I>(ratings: I) -> RatingSummary
    where
        I: Iterator<Item = i16>,
    {
        RatingSummary::from_ratings(ratings)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_category(&self, category: Category) {
        self.state.lock().await.categories.insert(category.id, category);
    }

    pub async fn insert_merchant(&self, merchant: Merchant) {
        self.state.lock().await.merchants.insert(merchant.id, merchant);
    }

    /// Payment status is set by an external provider; this stands in for it.
    pub async fn set_payment_status(&self, order_id: Uuid, status: PaymentStatus) -> bool {
        let mut state = self.state.lock().await;
        let Some(payment_id) = state.orders.iter().find(|o| o.id == order_id).map(|o| o.payment_id) else {
            return false;
        };
        match state.payments.get_mut(&payment_id) {
            Some(payment) => {
                payment.status = status;
                payment.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }

    pub async fn order_count(&self) -> usize {
        self.state.lock().await.orders.len()
    }
}

#[async_trait]
impl CatalogRepository for InMemoryStore {
    async fn list_products(&self, query: &ProductQuery) -> RepoResult<Vec<Product>> {
        let state = self.state.lock().await;
        let mut products: Vec<Product> = state.products.values().filter(|p| query.matches(p)).cloned().collect();
        products.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(products
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.limit() as usize)
            .collect())
    }

    async fn list_merchant_products(&self, merchant_id: Uuid) -> RepoResult<Vec<Product>> {
        let state = self.state.lock().await;
        let mut products: Vec<Product> = state
            .products
            .values()
            .filter(|p| p.merchant_id == merchant_id)
            .cloned()
            .collect();
        products.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(products)
    }

    async fn get_product(&self, id: Uuid) -> RepoResult<Option<Product>> {
        Ok(self.state.lock().await.products.get(&id).cloned())
    }

    async fn get_products(&self, ids: &[Uuid]) -> RepoResult<Vec<Product>> {
        let state = self.state.lock().await;
        Ok(ids.iter().filter_map(|id| state.products.get(id).cloned()).collect())
    }

    async fn insert_product(&self, product: &Product) -> RepoResult<()> {
        let mut state = self.state.lock().await;
        if state.products.contains_key(&product.id) {
            return Err(format!("duplicate product id {}", product.id).into());
        }
        state.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn update_product(&self, product: &Product) -> RepoResult<()> {
        let mut state = self.state.lock().await;
        match state.products.get_mut(&product.id) {
            Some(existing) => {
                *existing = product.clone();
                Ok(())
            }
            None => Err(format!("product {} does not exist", product.id).into()),
        }
    }

    async fn list_images(&self, product_id: Uuid) -> RepoResult<Vec<ProductImage>> {
        let state = self.state.lock().await;
        let mut images = state.images.get(&product_id).cloned().unwrap_or_default();
        gallery::arrange(&mut images);
        Ok(images)
    }

    async fn save_images(&self, product_id: Uuid, images: &[ProductImage]) -> RepoResult<()> {
        self.state.lock().await.images.insert(product_id, images.to_vec());
        Ok(())
    }

    async fn primary_images(&self, product_ids: &[Uuid]) -> RepoResult<HashMap<Uuid, String>> {
        let state = self.state.lock().await;
        Ok(product_ids
            .iter()
            .filter_map(|id| {
                let images = state.images.get(id)?;
                gallery::primary_url(images).map(|url| (*id, url.to_string()))
            })
            .collect())
    }

    async fn list_specifications(&self, product_id: Uuid) -> RepoResult<Vec<ProductSpecification>> {
        let state = self.state.lock().await;
        Ok(state.specifications.iter().filter(|s| s.product_id == product_id).cloned().collect())
    }

    async fn insert_specification(&self, spec: &ProductSpecification) -> RepoResult<()> {
        self.state.lock().await.specifications.push(spec.clone());
        Ok(())
    }

    async fn delete_specification(&self, product_id: Uuid, spec_id: Uuid) -> RepoResult<bool> {
        let mut state = self.state.lock().await;
        let before = state.specifications.len();
        state.specifications.retain(|s| !(s.id == spec_id && s.product_id == product_id));
        Ok(state.specifications.len() != before)
    }

    async fn list_features(&self, product_id: Uuid) -> RepoResult<Vec<ProductFeature>> {
        let state = self.state.lock().await;
        Ok(state.features.iter().filter(|f| f.product_id == product_id).cloned().collect())
    }

    async fn insert_feature(&self, feature: &ProductFeature) -> RepoResult<()> {
        self.state.lock().await.features.push(feature.clone());
        Ok(())
    }

    async fn delete_feature(&self, product_id: Uuid, feature_id: Uuid) -> RepoResult<bool> {
        let mut state = self.state.lock().await;
        let before = state.features.len();
        state.features.retain(|f| !(f.id == feature_id && f.product_id == product_id));
        Ok(state.features.len() != before)
    }

    async fn get_inventory(&self, product_id: Uuid) -> RepoResult<Option<InventoryRecord>> {
        Ok(self.state.lock().await.inventory.get(&product_id).cloned())
    }

    async fn get_inventories(&self, product_ids: &[Uuid]) -> RepoResult<HashMap<Uuid, InventoryRecord>> {
        let state = self.state.lock().await;
        Ok(product_ids
            .iter()
            .filter_map(|id| state.inventory.get(id).map(|r| (*id, r.clone())))
            .collect())
    }

    async fn upsert_inventory(&self, record: &InventoryRecord) -> RepoResult<()> {
        self.state.lock().await.inventory.insert(record.product_id, record.clone());
        Ok(())
    }

    async fn list_categories(&self) -> RepoResult<Vec<Category>> {
        let state = self.state.lock().await;
        let mut categories: Vec<Category> = state.categories.values().cloned().collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn get_category(&self, id: Uuid) -> RepoResult<Option<Category>> {
        Ok(self.state.lock().await.categories.get(&id).cloned())
    }
}

#[async_trait]
impl MerchantRepository for InMemoryStore {
    async fn get_merchant(&self, id: Uuid) -> RepoResult<Option<Merchant>> {
        Ok(self.state.lock().await.merchants.get(&id).cloned())
    }

    async fn list_merchants(&self) -> RepoResult<Vec<Merchant>> {
        let state = self.state.lock().await;
        let mut merchants: Vec<Merchant> = state.merchants.values().cloned().collect();
        merchants.sort_by(|a, b| a.store_name.cmp(&b.store_name));
        Ok(merchants)
    }

    async fn update_merchant(&self, merchant: &Merchant) -> RepoResult<()> {
        let mut state = self.state.lock().await;
        match state.merchants.get_mut(&merchant.id) {
            Some(existing) => {
                *existing = merchant.clone();
                Ok(())
            }
            None => Err(format!("merchant {} does not exist", merchant.id).into()),
        }
    }
}

#[async_trait]
impl EngagementRepository for InMemoryStore {
    async fn find_product_review(&self, product_id: Uuid, user_id: Uuid) -> RepoResult<Option<ProductReview>> {
        let state = self.state.lock().await;
        Ok(state
            .product_reviews
            .iter()
            .find(|r| r.product_id == product_id && r.user_id == user_id)
            .cloned())
    }

    async fn insert_product_review(&self, review: &ProductReview) -> RepoResult<()> {
        let mut state = self.state.lock().await;
        if state
            .product_reviews
            .iter()
            .any(|r| r.product_id == review.product_id && r.user_id == review.user_id)
        {
            return Err("duplicate product review".into());
        }
        state.product_reviews.push(review.clone());
        Ok(())
    }

    async fn list_product_reviews(&self, product_id: Uuid) -> RepoResult<Vec<ProductReview>> {
        let state = self.state.lock().await;
        let mut reviews: Vec<ProductReview> = state
            .product_reviews
            .iter()
            .filter(|r| r.product_id == product_id)
            .cloned()
            .collect();
        reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(reviews)
    }

    async fn product_rating(&self, product_id: Uuid) -> RepoResult<RatingSummary> {
        let state = self.state.lock().await;
        Ok(State::rating_of(
            state.product_reviews.iter().filter(|r| r.product_id == product_id).map(|r| r.rating),
        ))
    }

    async fn insert_merchant_review(&self, review: &MerchantReview) -> RepoResult<()> {
        self.state.lock().await.merchant_reviews.push(review.clone());
        Ok(())
    }

    async fn list_merchant_reviews(&self, merchant_id: Uuid) -> RepoResult<Vec<MerchantReview>> {
        let state = self.state.lock().await;
        let mut reviews: Vec<MerchantReview> = state
            .merchant_reviews
            .iter()
            .filter(|r| r.merchant_id == merchant_id)
            .cloned()
            .collect();
        reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(reviews)
    }

    async fn merchant_rating(&self, merchant_id: Uuid) -> RepoResult<RatingSummary> {
        let state = self.state.lock().await;
        Ok(State::rating_of(
            state.merchant_reviews.iter().filter(|r| r.merchant_id == merchant_id).map(|r| r.rating),
        ))
    }

    async fn is_wishlisted(&self, user_id: Uuid, product_id: Uuid) -> RepoResult<bool> {
        let state = self.state.lock().await;
        Ok(state.wishlist.iter().any(|w| w.user_id == user_id && w.product_id == product_id))
    }

    async fn toggle_wishlist(&self, user_id: Uuid, product_id: Uuid) -> RepoResult<WishlistToggle> {
        let mut state = self.state.lock().await;
        if !state.products.contains_key(&product_id) {
            return Err(format!("product {} does not exist", product_id).into());
        }
        let existing = state
            .wishlist
            .iter()
            .position(|w| w.user_id == user_id && w.product_id == product_id);
        let added = match existing {
            Some(index) => {
                state.wishlist.remove(index);
                false
            }
            None => {
                state.wishlist.push(WishlistEntry::new(user_id, product_id));
                true
            }
        };

        let product = state
            .products
            .get_mut(&product_id)
            .ok_or_else(|| format!("product {} does not exist", product_id))?;
        product.likes_count = if added { product.likes_count + 1 } else { (product.likes_count - 1).max(0) };
        let likes_count = product.likes_count;

        Ok(if added { WishlistToggle::Added { likes_count } } else { WishlistToggle::Removed { likes_count } })
    }

    async fn list_wishlist(&self, user_id: Uuid) -> RepoResult<Vec<WishlistEntry>> {
        let state = self.state.lock().await;
        let mut entries: Vec<WishlistEntry> = state.wishlist.iter().filter(|w| w.user_id == user_id).cloned().collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(entries)
    }
}

#[async_trait]
impl CartRepository for InMemoryStore {
    async fn find_user_cart(&self, user_id: Uuid) -> RepoResult<Option<Cart>> {
        let state = self.state.lock().await;
        Ok(state.carts.values().find(|c| c.user_id == Some(user_id)).cloned())
    }

    async fn find_anonymous_cart(&self, token: &str) -> RepoResult<Option<Cart>> {
        let state = self.state.lock().await;
        Ok(state
            .carts
            .values()
            .find(|c| c.user_id.is_none() && c.anonymous_token.as_deref() == Some(token))
            .cloned())
    }

    async fn insert_cart(&self, cart: &Cart) -> RepoResult<()> {
        let mut state = self.state.lock().await;
        if let Some(user_id) = cart.user_id {
            if state.carts.values().any(|c| c.user_id == Some(user_id)) {
                return Err(format!("user {} already has a cart", user_id).into());
            }
        }
        state.carts.insert(cart.id, cart.clone());
        Ok(())
    }

    async fn touch_cart(&self, cart_id: Uuid, updated_at: DateTime<Utc>, expires_at: Option<DateTime<Utc>>) -> RepoResult<()> {
        let mut state = self.state.lock().await;
        if let Some(cart) = state.carts.get_mut(&cart_id) {
            cart.updated_at = updated_at;
            cart.expires_at = expires_at;
        }
        Ok(())
    }

    async fn list_lines(&self, cart_id: Uuid) -> RepoResult<Vec<CartLine>> {
        let state = self.state.lock().await;
        Ok(state.cart_lines.iter().filter(|l| l.cart_id == cart_id).cloned().collect())
    }

    async fn add_line(&self, line: &CartLine) -> RepoResult<Option<(CartLine, bool)>> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state
            .cart_lines
            .iter_mut()
            .find(|l| l.cart_id == line.cart_id && l.product_id == line.product_id)
        {
            let merged = match existing.quantity.checked_add(line.quantity) {
                Some(quantity) if quantity <= MAX_LINE_QUANTITY => quantity,
                _ => return Ok(None),
            };
            existing.quantity = merged;
            existing.updated_at = line.updated_at;
            return Ok(Some((existing.clone(), false)));
        }
        state.cart_lines.push(line.clone());
        Ok(Some((line.clone(), true)))
    }

    async fn set_line_quantity(&self, cart_id: Uuid, line_id: Uuid, quantity: i32) -> RepoResult<Option<CartLine>> {
        let mut state = self.state.lock().await;
        Ok(state
            .cart_lines
            .iter_mut()
            .find(|l| l.id == line_id && l.cart_id == cart_id)
            .map(|line| {
                line.quantity = quantity;
                line.updated_at = Utc::now();
                line.clone()
            }))
    }

    async fn remove_line(&self, cart_id: Uuid, line_id: Uuid) -> RepoResult<bool> {
        let mut state = self.state.lock().await;
        let before = state.cart_lines.len();
        state.cart_lines.retain(|l| !(l.id == line_id && l.cart_id == cart_id));
        Ok(state.cart_lines.len() != before)
    }

    async fn clear_lines(&self, cart_id: Uuid) -> RepoResult<u64> {
        let mut state = self.state.lock().await;
        let before = state.cart_lines.len();
        state.cart_lines.retain(|l| l.cart_id != cart_id);
        Ok((before - state.cart_lines.len()) as u64)
    }

    async fn delete_expired_carts(&self, now: DateTime<Utc>) -> RepoResult<u64> {
        let mut state = self.state.lock().await;
        let expired: Vec<Uuid> = state
            .carts
            .values()
            .filter(|c| c.user_id.is_none() && c.is_expired(now))
            .map(|c| c.id)
            .collect();
        for id in &expired {
            state.carts.remove(id);
        }
        state.cart_lines.retain(|l| !expired.contains(&l.cart_id));
        Ok(expired.len() as u64)
    }
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn commit_checkout(&self, cart_id: Uuid, plan: &CheckoutPlan) -> RepoResult<()> {
        let mut state = self.state.lock().await;
        let mut staged = state.clone();

        for consumed in &plan.cart_lines {
            let index = staged
                .cart_lines
                .iter()
                .position(|l| l.id == consumed.line_id && l.cart_id == cart_id && l.quantity == consumed.quantity)
                .ok_or_else(|| format!("cart line {} changed during checkout", consumed.line_id))?;
            staged.cart_lines.remove(index);
        }

        if staged.orders.iter().any(|o| o.order_number == plan.order.order_number) {
            return Err(format!("duplicate order number {}", plan.order.order_number).into());
        }
        staged.addresses.insert(plan.address.id, plan.address.clone());
        staged.payments.insert(plan.payment.id, plan.payment.clone());
        staged.orders.push(plan.order.clone());

        for planned in &plan.sub_orders {
            let number = &planned.sub_order.sub_order_number;
            if staged.sub_orders.iter().any(|s| &s.sub_order_number == number) {
                return Err(format!("duplicate sub-order number {}", number).into());
            }
            staged.sub_orders.push(planned.sub_order.clone());
            staged.order_items.extend(planned.items.iter().cloned());
        }

        *state = staged;
        Ok(())
    }

    async fn get_order(&self, id: Uuid) -> RepoResult<Option<OrderDetail>> {
        let state = self.state.lock().await;
        Ok(state.orders.iter().find(|o| o.id == id).map(|o| state.order_detail(o)))
    }

    async fn list_orders(&self, customer_id: Uuid) -> RepoResult<Vec<OrderDetail>> {
        let state = self.state.lock().await;
        let mut orders: Vec<OrderDetail> = state
            .orders
            .iter()
            .filter(|o| o.customer_id == customer_id)
            .map(|o| state.order_detail(o))
            .collect();
        orders.sort_by(|a, b| b.order.created_at.cmp(&a.order.created_at));
        Ok(orders)
    }

    async fn get_sub_order(&self, id: Uuid) -> RepoResult<Option<SubOrder>> {
        let state = self.state.lock().await;
        Ok(state.sub_orders.iter().find(|s| s.id == id).cloned())
    }

    async fn get_merchant_sub_order(&self, id: Uuid) -> RepoResult<Option<MerchantSubOrder>> {
        let state = self.state.lock().await;
        Ok(state
            .sub_orders
            .iter()
            .find(|s| s.id == id)
            .and_then(|s| state.merchant_view(s)))
    }

    async fn list_merchant_sub_orders(&self, merchant_id: Uuid, paid_only: bool) -> RepoResult<Vec<MerchantSubOrder>> {
        let state = self.state.lock().await;
        let mut views: Vec<MerchantSubOrder> = state
            .sub_orders
            .iter()
            .filter(|s| s.merchant_id == merchant_id)
            .filter_map(|s| state.merchant_view(s))
            .filter(|v| !paid_only || v.payment_status == PaymentStatus::Paid)
            .collect();
        views.sort_by(|a, b| b.sub_order.created_at.cmp(&a.sub_order.created_at));
        Ok(views)
    }

    async fn apply_transition(&self, transition: &SubOrderTransition) -> RepoResult<bool> {
        let mut state = self.state.lock().await;
        Ok(state
            .sub_orders
            .iter_mut()
            .find(|s| s.id == transition.sub_order_id)
            .is_some_and(|s| transition.apply_to(s)))
    }

    async fn has_purchased(&self, user_id: Uuid, product_id: Uuid) -> RepoResult<bool> {
        let state = self.state.lock().await;
        Ok(state
            .order_items
            .iter()
            .filter(|i| i.product_id == Some(product_id))
            .filter_map(|i| state.sub_orders.iter().find(|s| s.id == i.sub_order_id))
            .filter_map(|s| state.orders.iter().find(|o| o.id == s.order_id))
            .any(|o| o.customer_id == user_id))
    }

    async fn sub_order_tallies(&self, merchant_id: Uuid) -> RepoResult<Vec<StatusTally>> {
        let state = self.state.lock().await;
        let mut tallies: Vec<StatusTally> = Vec::new();
        for sub_order in state.sub_orders.iter().filter(|s| s.merchant_id == merchant_id) {
            match tallies.iter_mut().find(|t| t.status == sub_order.status) {
                Some(tally) => {
                    tally.count += 1;
                    tally.subtotal += sub_order.subtotal;
                }
                None => tallies.push(StatusTally { status: sub_order.status, count: 1, subtotal: sub_order.subtotal }),
            }
        }
        Ok(tallies)
    }
}

#[async_trait]
impl NotificationRepository for InMemoryStore {
    async fn get_preferences(&self, user_id: Uuid) -> RepoResult<Option<NotificationPreferences>> {
        Ok(self.state.lock().await.preferences.get(&user_id).copied())
    }

    async fn upsert_preferences(&self, preferences: &NotificationPreferences) -> RepoResult<()> {
        self.state.lock().await.preferences.insert(preferences.user_id, *preferences);
        Ok(())
    }

    async fn insert_notification(&self, notification: &Notification) -> RepoResult<()> {
        self.state.lock().await.notifications.push(notification.clone());
        Ok(())
    }

    async fn mark_sent(&self, id: Uuid) -> RepoResult<()> {
        let mut state = self.state.lock().await;
        if let Some(n) = state.notifications.iter_mut().find(|n| n.id == id) {
            n.is_sent = true;
        }
        Ok(())
    }

    async fn list_notifications(&self, user_id: Uuid, unread_only: bool) -> RepoResult<Vec<Notification>> {
        let state = self.state.lock().await;
        let mut notifications: Vec<Notification> = state
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id && (!unread_only || !n.is_read))
            .cloned()
            .collect();
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(notifications)
    }

    async fn mark_read(&self, user_id: Uuid, id: Uuid) -> RepoResult<bool> {
        let mut state = self.state.lock().await;
        match state.notifications.iter_mut().find(|n| n.id == id && n.user_id == user_id) {
            Some(n) => {
                n.is_read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mercato_catalog::ProductDraft;

    fn product(merchant_id: Uuid) -> Product {
        Product::new(
            merchant_id,
            ProductDraft {
                name: "Linen Shirt".to_string(),
                description: String::new(),
                category_id: Uuid::new_v4(),
                stock: 3,
                original_price: Decimal::new(4500, 2),
                sale_price: None,
                is_on_sale: false,
                is_featured: false,
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_add_line_merges_quantities() {
        let store = InMemoryStore::new();
        let cart = Cart::for_user(Uuid::new_v4(), Utc::now());
        store.insert_cart(&cart).await.unwrap();
        let product_id = Uuid::new_v4();

        let (first, created) = store.add_line(&CartLine::new(cart.id, product_id, 2, Utc::now()).unwrap()).await.unwrap().unwrap();
        assert!(created);
        let (merged, created) = store.add_line(&CartLine::new(cart.id, product_id, 3, Utc::now()).unwrap()).await.unwrap().unwrap();
        assert!(!created);
        assert_eq!(merged.id, first.id);
        assert_eq!(merged.quantity, 5);
        assert_eq!(store.list_lines(cart.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_add_line_refuses_merge_past_limit() {
        let store = InMemoryStore::new();
        let cart = Cart::for_user(Uuid::new_v4(), Utc::now());
        store.insert_cart(&cart).await.unwrap();
        let product_id = Uuid::new_v4();

        let full = CartLine::new(cart.id, product_id, MAX_LINE_QUANTITY, Utc::now()).unwrap();
        store.add_line(&full).await.unwrap().unwrap();
        let extra = CartLine::new(cart.id, product_id, 1, Utc::now()).unwrap();
        assert!(store.add_line(&extra).await.unwrap().is_none());

        let lines = store.list_lines(cart.id).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].quantity, MAX_LINE_QUANTITY);
    }

    #[tokio::test]
    async fn test_second_user_cart_rejected() {
        let store = InMemoryStore::new();
        let user_id = Uuid::new_v4();
        store.insert_cart(&Cart::for_user(user_id, Utc::now())).await.unwrap();
        assert!(store.insert_cart(&Cart::for_user(user_id, Utc::now())).await.is_err());
    }

    #[tokio::test]
    async fn test_wishlist_toggle_adjusts_likes() {
        let store = InMemoryStore::new();
        let product = product(Uuid::new_v4());
        store.insert_product(&product).await.unwrap();
        let user_id = Uuid::new_v4();

        assert_eq!(store.toggle_wishlist(user_id, product.id).await.unwrap(), WishlistToggle::Added { likes_count: 1 });
        assert!(store.is_wishlisted(user_id, product.id).await.unwrap());
        assert_eq!(store.toggle_wishlist(user_id, product.id).await.unwrap(), WishlistToggle::Removed { likes_count: 0 });
        assert!(!store.is_wishlisted(user_id, product.id).await.unwrap());
        assert!(store.toggle_wishlist(user_id, Uuid::new_v4()).await.is_err());
    }

    #[tokio::test]
    async fn test_products_listed_newest_first_and_paginated() {
        let store = InMemoryStore::new();
        let merchant_id = Uuid::new_v4();
        let mut ids = Vec::new();
        for offset in 0..3 {
            let mut p = product(merchant_id);
            p.created_at = p.created_at + chrono::Duration::seconds(offset);
            ids.push(p.id);
            store.insert_product(&p).await.unwrap();
        }

        let first_page = store
            .list_products(&ProductQuery { per_page: Some(2), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(first_page.iter().map(|p| p.id).collect::<Vec<_>>(), vec![ids[2], ids[1]]);

        let second_page = store
            .list_products(&ProductQuery { per_page: Some(2), page: Some(2), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(second_page.len(), 1);
    }
}

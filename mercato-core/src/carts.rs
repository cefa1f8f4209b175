use chrono::{Duration, Utc};
use mercato_order::cart::{validate_quantity, MAX_LINE_QUANTITY};
use mercato_order::{Cart, CartError, CartLine, CartView};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::repository::{CartRepository, CatalogRepository};
use crate::{CoreError, CoreResult};

/// Default lifetime of an anonymous cart between visits.
pub const DEFAULT_ANONYMOUS_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;

/// The cart a request acts on, plus the token to hand back when a new
/// anonymous cart was created.
#[derive(Debug, Clone)]
pub struct ResolvedCart {
    pub cart: Cart,
    pub issued_token: Option<String>,
}

#[derive(Clone)]
pub struct CartService {
    carts: Arc<dyn CartRepository>,
    catalog: Arc<dyn CatalogRepository>,
    anonymous_ttl: Duration,
}

impl CartService {
    pub fn new(carts: Arc<dyn CartRepository>, catalog: Arc<dyn CatalogRepository>, anonymous_ttl: Duration) -> Self {
        Self { carts, catalog, anonymous_ttl }
    }

    /// Find or lazily create the cart for a user, or for an anonymous visitor
    /// holding `token`. Unknown or expired tokens get a fresh cart.
    pub async fn resolve(&self, user_id: Option<Uuid>, token: Option<&str>) -> CoreResult<ResolvedCart> {
        match user_id {
            Some(user_id) => self.resolve_user(user_id).await,
            None => self.resolve_anonymous(token).await,
        }
    }

    async fn resolve_user(&self, user_id: Uuid) -> CoreResult<ResolvedCart> {
        if let Some(cart) = self.carts.find_user_cart(user_id).await? {
            return Ok(ResolvedCart { cart, issued_token: None });
        }

        let cart = Cart::for_user(user_id, Utc::now());
        if let Err(e) = self.carts.insert_cart(&cart).await {
            // A concurrent request may have created it first.
            return match self.carts.find_user_cart(user_id).await? {
                Some(existing) => Ok(ResolvedCart { cart: existing, issued_token: None }),
                None => Err(CoreError::Storage(e.to_string())),
            };
        }
        tracing::debug!(%user_id, cart_id = %cart.id, "Created user cart");
        Ok(ResolvedCart { cart, issued_token: None })
    }

    async fn resolve_anonymous(&self, token: Option<&str>) -> CoreResult<ResolvedCart> {
        let now = Utc::now();
        if let Some(token) = token {
            if let Some(mut cart) = self.carts.find_anonymous_cart(token).await? {
                if !cart.is_expired(now) {
                    cart.touch(self.anonymous_ttl, now);
                    self.carts.touch_cart(cart.id, cart.updated_at, cart.expires_at).await?;
                    return Ok(ResolvedCart { cart, issued_token: None });
                }
                tracing::debug!(cart_id = %cart.id, "Anonymous cart expired, issuing a new one");
            }
        }

        let cart = Cart::anonymous(self.anonymous_ttl, now);
        self.carts.insert_cart(&cart).await?;
        tracing::debug!(cart_id = %cart.id, "Created anonymous cart");
        Ok(ResolvedCart { issued_token: cart.anonymous_token.clone(), cart })
    }

    pub async fn view(&self, cart: Cart) -> CoreResult<CartView> {
        let lines = self.carts.list_lines(cart.id).await?;
        let product_ids: Vec<Uuid> = lines.iter().map(|l| l.product_id).collect();
        let mut products: HashMap<Uuid, _> = self
            .catalog
            .get_products(&product_ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();
        let mut images = self.catalog.primary_images(&product_ids).await?;

        let priced = lines.into_iter().map(|line| {
            let product = products.remove(&line.product_id);
            let image = images.remove(&line.product_id);
            (line, product, image)
        });
        Ok(CartView::build(cart, priced)?)
    }

    /// Add a product, merging into an existing line. Returns the line and
    /// whether it was newly created.
    pub async fn add_item(&self, cart: &Cart, product_id: Uuid, quantity: Option<i32>) -> CoreResult<(CartLine, bool)> {
        let quantity = quantity.unwrap_or(1);
        validate_quantity(quantity)?;

        match self.catalog.get_product(product_id).await? {
            Some(product) if product.is_active => {}
            Some(_) => return Err(CartError::ProductUnavailable(product_id).into()),
            None => return Err(CoreError::NotFound(format!("Product {}", product_id))),
        }

        let line = CartLine::new(cart.id, product_id, quantity, Utc::now())?;
        let (line, created) = self
            .carts
            .add_line(&line)
            .await?
            .ok_or(CartError::QuantityLimit(MAX_LINE_QUANTITY))?;
        tracing::debug!(cart_id = %cart.id, %product_id, quantity = line.quantity, created, "Cart item added");
        Ok((line, created))
    }

    pub async fn update_item(&self, cart: &Cart, line_id: Uuid, quantity: i32) -> CoreResult<CartLine> {
        validate_quantity(quantity)?;
        self.carts
            .set_line_quantity(cart.id, line_id, quantity)
            .await?
            .ok_or_else(|| CartError::LineNotFound(line_id).into())
    }

    pub async fn remove_item(&self, cart: &Cart, line_id: Uuid) -> CoreResult<()> {
        if !self.carts.remove_line(cart.id, line_id).await? {
            return Err(CartError::LineNotFound(line_id).into());
        }
        Ok(())
    }

    pub async fn clear(&self, cart: &Cart) -> CoreResult<u64> {
        Ok(self.carts.clear_lines(cart.id).await?)
    }

    /// Delete anonymous carts whose expiry has passed.
    pub async fn sweep_expired(&self) -> CoreResult<u64> {
        let removed = self.carts.delete_expired_carts(Utc::now()).await?;
        if removed > 0 {
            tracing::info!(removed, "Swept expired anonymous carts");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use crate::repository::CatalogRepository;
    use crate::testing;
    use rust_decimal::Decimal;

    fn service(store: &Arc<InMemoryStore>, ttl: Duration) -> CartService {
        CartService::new(store.clone(), store.clone(), ttl)
    }

    #[tokio::test]
    async fn test_user_cart_is_created_once() {
        let store = testing::store();
        let svc = service(&store, Duration::days(7));
        let user_id = Uuid::new_v4();

        let first = svc.resolve(Some(user_id), None).await.unwrap();
        let second = svc.resolve(Some(user_id), Some("ignored")).await.unwrap();
        assert_eq!(first.cart.id, second.cart.id);
        assert!(first.issued_token.is_none());
    }

    #[tokio::test]
    async fn test_anonymous_token_round_trip() {
        let store = testing::store();
        let svc = service(&store, Duration::days(7));

        let fresh = svc.resolve(None, None).await.unwrap();
        let token = fresh.issued_token.clone().unwrap();
        let again = svc.resolve(None, Some(&token)).await.unwrap();
        assert_eq!(again.cart.id, fresh.cart.id);
        assert!(again.issued_token.is_none());

        let unknown = svc.resolve(None, Some("not-a-real-token")).await.unwrap();
        assert_ne!(unknown.cart.id, fresh.cart.id);
        assert!(unknown.issued_token.is_some());
    }

    #[tokio::test]
    async fn test_expired_token_yields_fresh_cart_and_sweeper_removes_it() {
        let store = testing::store();
        let svc = service(&store, Duration::seconds(-1));

        let stale = svc.resolve(None, None).await.unwrap();
        let token = stale.issued_token.clone().unwrap();
        let replacement = svc.resolve(None, Some(&token)).await.unwrap();
        assert_ne!(replacement.cart.id, stale.cart.id);

        assert_eq!(svc.sweep_expired().await.unwrap(), 2);
        assert!(store.find_anonymous_cart(&token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_add_update_remove_and_view() {
        let store = testing::store();
        let svc = service(&store, Duration::days(7));
        let merchant = testing::merchant(&store, "North Loom").await;
        let a = testing::product(&store, merchant.merchant_id, "A", 1000).await;
        let b = testing::product(&store, merchant.merchant_id, "B", 250).await;
        let cart = svc.resolve(Some(Uuid::new_v4()), None).await.unwrap().cart;

        let (line, created) = svc.add_item(&cart, a.id, None).await.unwrap();
        assert!(created);
        let (merged, created) = svc.add_item(&cart, a.id, Some(2)).await.unwrap();
        assert!(!created);
        assert_eq!(merged.id, line.id);
        assert_eq!(merged.quantity, 3);

        let (line_b, _) = svc.add_item(&cart, b.id, Some(4)).await.unwrap();
        svc.update_item(&cart, line_b.id, 2).await.unwrap();

        let view = svc.view(cart.clone()).await.unwrap();
        assert_eq!(view.total_quantity, 5);
        assert_eq!(view.cart_total, Decimal::new(3500, 2));

        svc.remove_item(&cart, line.id).await.unwrap();
        assert!(matches!(svc.remove_item(&cart, line.id).await, Err(CoreError::NotFound(_))));
        assert_eq!(svc.clear(&cart).await.unwrap(), 1);
        assert!(svc.view(cart).await.unwrap().items.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_items_rejected() {
        let store = testing::store();
        let svc = service(&store, Duration::days(7));
        let merchant = testing::merchant(&store, "North Loom").await;
        let mut retired = testing::product(&store, merchant.merchant_id, "Retired", 1000).await;
        retired.deactivate();
        store.update_product(&retired).await.unwrap();
        let cart = svc.resolve(Some(Uuid::new_v4()), None).await.unwrap().cart;

        assert!(matches!(svc.add_item(&cart, Uuid::new_v4(), None).await, Err(CoreError::NotFound(_))));
        assert!(matches!(svc.add_item(&cart, retired.id, None).await, Err(CoreError::NotFound(_))));
        assert!(matches!(svc.add_item(&cart, retired.id, Some(0)).await, Err(CoreError::Validation(_))));
        assert!(matches!(svc.update_item(&cart, Uuid::new_v4(), 0).await, Err(CoreError::Validation(_))));
        assert!(matches!(svc.update_item(&cart, Uuid::new_v4(), 1).await, Err(CoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_merged_quantity_is_capped() {
        let store = testing::store();
        let svc = service(&store, Duration::days(7));
        let merchant = testing::merchant(&store, "North Loom").await;
        let a = testing::product(&store, merchant.merchant_id, "A", 100).await;
        let cart = svc.resolve(Some(Uuid::new_v4()), None).await.unwrap().cart;

        let (line, _) = svc.add_item(&cart, a.id, Some(MAX_LINE_QUANTITY - 1)).await.unwrap();
        assert!(matches!(svc.add_item(&cart, a.id, Some(2)).await, Err(CoreError::Validation(_))));
        assert!(matches!(svc.add_item(&cart, a.id, Some(i32::MAX)).await, Err(CoreError::Validation(_))));
        assert_eq!(store.list_lines(cart.id).await.unwrap()[0].quantity, MAX_LINE_QUANTITY - 1);

        let (merged, _) = svc.add_item(&cart, a.id, Some(1)).await.unwrap();
        assert_eq!(merged.id, line.id);
        assert_eq!(merged.quantity, MAX_LINE_QUANTITY);
        assert!(matches!(svc.update_item(&cart, line.id, MAX_LINE_QUANTITY + 1).await, Err(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_view_rejects_total_beyond_money_range() {
        let store = testing::store();
        let svc = service(&store, Duration::days(7));
        let merchant = testing::merchant(&store, "North Loom").await;
        let costly = testing::product(&store, merchant.merchant_id, "Yacht", 9_999_999_999).await;
        let cart = svc.resolve(Some(Uuid::new_v4()), None).await.unwrap().cart;

        svc.add_item(&cart, costly.id, Some(2)).await.unwrap();
        assert!(matches!(svc.view(cart).await, Err(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_lines_are_scoped_to_their_cart() {
        let store = testing::store();
        let svc = service(&store, Duration::days(7));
        let merchant = testing::merchant(&store, "North Loom").await;
        let a = testing::product(&store, merchant.merchant_id, "A", 1000).await;
        let mine = svc.resolve(Some(Uuid::new_v4()), None).await.unwrap().cart;
        let theirs = svc.resolve(Some(Uuid::new_v4()), None).await.unwrap().cart;

        let (line, _) = svc.add_item(&theirs, a.id, None).await.unwrap();
        assert!(svc.update_item(&mine, line.id, 5).await.is_err());
        assert!(svc.remove_item(&mine, line.id).await.is_err());
    }
}

use chrono::{DateTime, Duration, Utc};
use mercato_catalog::{pricing, PricingError, Product};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

/// Who a cart belongs to. Anonymous carts are addressed by an opaque token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartOwner {
    User(Uuid),
    Anonymous(String),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Cart {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    #[serde(skip)]
    pub anonymous_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Only anonymous carts expire.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Cart {
    pub fn for_user(user_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: Some(user_id),
            anonymous_token: None,
            created_at: now,
            updated_at: now,
            expires_at: None,
        }
    }

    /// New anonymous cart with a freshly minted token.
    pub fn anonymous(ttl: Duration, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: None,
            anonymous_token: Some(new_token()),
            created_at: now,
            updated_at: now,
            expires_at: Some(now + ttl),
        }
    }

    pub fn owner(&self) -> Option<CartOwner> {
        match (self.user_id, &self.anonymous_token) {
            (Some(user_id), _) => Some(CartOwner::User(user_id)),
            (None, Some(token)) => Some(CartOwner::Anonymous(token.clone())),
            (None, None) => None,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Slide the expiry of an anonymous cart forward.
    pub fn touch(&mut self, ttl: Duration, now: DateTime<Utc>) {
        if self.expires_at.is_some() {
            self.expires_at = Some(now + ttl);
        }
        self.updated_at = now;
    }
}

pub fn new_token() -> String {
    Uuid::new_v4().simple().to_string()
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CartLine {
    pub id: Uuid,
    pub cart_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CartLine {
    pub fn new(cart_id: Uuid, product_id: Uuid, quantity: i32, now: DateTime<Utc>) -> Result<Self, CartError> {
        validate_quantity(quantity)?;
        Ok(Self {
            id: Uuid::new_v4(),
            cart_id,
            product_id,
            quantity,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Upper bound on the quantity of a single cart line, merged or not.
pub const MAX_LINE_QUANTITY: i32 = 10_000;

pub fn validate_quantity(quantity: i32) -> Result<(), CartError> {
    if quantity < 1 {
        return Err(CartError::InvalidQuantity(quantity));
    }
    if quantity > MAX_LINE_QUANTITY {
        return Err(CartError::QuantityLimit(MAX_LINE_QUANTITY));
    }
    Ok(())
}

/// A cart line priced at the product's current effective price.
#[derive(Debug, Clone, Serialize)]
pub struct PricedCartLine {
    #[serde(flatten)]
    pub line: CartLine,
    pub product_name: String,
    pub merchant_id: Uuid,
    pub unit_price: Decimal,
    pub item_total: Decimal,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    #[serde(flatten)]
    pub cart: Cart,
    pub items: Vec<PricedCartLine>,
    pub total_quantity: i64,
    pub cart_total: Decimal,
}

impl CartView {
    /// Price each line. Lines whose product is gone are left out.
    pub fn build<I>(cart: Cart, lines: I) -> Result<Self, CartError>
    where
        I: IntoIterator<Item = (CartLine, Option<Product>, Option<String>)>,
    {
        let mut items = Vec::new();
        for (line, product, image_url) in lines {
            let Some(product) = product else { continue };
            let unit_price = product.effective_price();
            items.push(PricedCartLine {
                item_total: pricing::line_total(unit_price, line.quantity)?,
                product_name: product.name,
                merchant_id: product.merchant_id,
                unit_price,
                image_url,
                line,
            });
        }

        let total_quantity = items.iter().map(|i| i64::from(i.line.quantity)).sum();
        let cart_total = pricing::sum_amounts(items.iter().map(|i| i.item_total))?;
        Ok(Self { cart, items, total_quantity, cart_total })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CartError {
    #[error("Quantity must be a positive integer, got {0}")]
    InvalidQuantity(i32),

    #[error("Quantity of a cart item cannot exceed {0}")]
    QuantityLimit(i32),

    #[error(transparent)]
    Pricing(#[from] PricingError),

    #[error("Product {0} is not available")]
    ProductUnavailable(Uuid),

    #[error("Cart item not found: {0}")]
    LineNotFound(Uuid),
}

#[cfg(test)]
mod tests {
    use super::*;
    use mercato_catalog::ProductDraft;

    fn product(price_cents: i64) -> Product {
        Product::new(
            Uuid::new_v4(),
            ProductDraft {
                name: "Ceramic Mug".to_string(),
                description: String::new(),
                category_id: Uuid::new_v4(),
                stock: 10,
                original_price: Decimal::new(price_cents, 2),
                sale_price: None,
                is_on_sale: false,
                is_featured: false,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_quantity_must_be_positive() {
        let now = Utc::now();
        assert!(CartLine::new(Uuid::new_v4(), Uuid::new_v4(), 0, now).is_err());
        assert!(CartLine::new(Uuid::new_v4(), Uuid::new_v4(), -3, now).is_err());
        assert!(CartLine::new(Uuid::new_v4(), Uuid::new_v4(), 1, now).is_ok());
    }

    #[test]
    fn test_quantity_is_capped() {
        let now = Utc::now();
        assert!(CartLine::new(Uuid::new_v4(), Uuid::new_v4(), MAX_LINE_QUANTITY, now).is_ok());
        assert!(matches!(
            CartLine::new(Uuid::new_v4(), Uuid::new_v4(), MAX_LINE_QUANTITY + 1, now),
            Err(CartError::QuantityLimit(MAX_LINE_QUANTITY))
        ));
        assert!(matches!(validate_quantity(i32::MAX), Err(CartError::QuantityLimit(_))));
    }

    #[test]
    fn test_anonymous_cart_expiry_slides() {
        let now = Utc::now();
        let ttl = Duration::seconds(60);
        let mut cart = Cart::anonymous(ttl, now);
        assert!(matches!(cart.owner(), Some(CartOwner::Anonymous(_))));
        assert!(!cart.is_expired(now));
        assert!(cart.is_expired(now + Duration::seconds(61)));

        cart.touch(ttl, now + Duration::seconds(50));
        assert!(!cart.is_expired(now + Duration::seconds(61)));
    }

    #[test]
    fn test_user_cart_never_expires() {
        let now = Utc::now();
        let mut cart = Cart::for_user(Uuid::new_v4(), now);
        cart.touch(Duration::seconds(1), now);
        assert_eq!(cart.expires_at, None);
        assert!(!cart.is_expired(now + Duration::days(365)));
    }

    #[test]
    fn test_view_totals() {
        let now = Utc::now();
        let cart = Cart::for_user(Uuid::new_v4(), now);
        let a = product(1000);
        let b = product(500);
        let line_a = CartLine::new(cart.id, a.id, 2, now).unwrap();
        let line_b = CartLine::new(cart.id, b.id, 3, now).unwrap();
        let orphan = CartLine::new(cart.id, Uuid::new_v4(), 7, now).unwrap();

        let view = CartView::build(cart, vec![(line_a, Some(a), None), (line_b, Some(b), None), (orphan, None, None)]).unwrap();
        assert_eq!(view.items.len(), 2);
        assert_eq!(view.total_quantity, 5);
        assert_eq!(view.cart_total, Decimal::new(3500, 2));
    }

    #[test]
    fn test_view_total_out_of_range_is_an_error() {
        let now = Utc::now();
        let cart = Cart::for_user(Uuid::new_v4(), now);
        let costly = product(9_999_999_999);
        let line = CartLine::new(cart.id, costly.id, 3, now).unwrap();

        let result = CartView::build(cart, vec![(line, Some(costly), None)]);
        assert!(matches!(result, Err(CartError::Pricing(PricingError::AmountOutOfRange))));
    }
}

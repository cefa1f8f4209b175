use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::inventory::{InventoryRecord, StockStatus};
use crate::pricing;
use crate::review::RatingSummary;

const MAX_NAME_LEN: usize = 100;
const MAX_DESCRIPTION_LEN: usize = 255;

/// A product listed by a single merchant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: Uuid,
    pub merchant_id: Uuid,
    pub category_id: Uuid,
    pub name: String,
    pub description: String,
    pub stock: i32,
    pub is_on_sale: bool,
    pub sale_price: Option<Decimal>,
    pub original_price: Decimal,
    pub likes_count: i32,
    pub is_active: bool,
    pub is_featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn new(merchant_id: Uuid, draft: ProductDraft) -> Result<Self, ProductError> {
        draft.validate()?;
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            merchant_id,
            category_id: draft.category_id,
            name: draft.name.trim().to_string(),
            description: draft.description.trim().to_string(),
            stock: draft.stock,
            is_on_sale: draft.is_on_sale,
            sale_price: draft.sale_price.map(pricing::round_money),
            original_price: pricing::round_money(draft.original_price),
            likes_count: 0,
            is_active: true,
            is_featured: draft.is_featured,
            created_at: now,
            updated_at: now,
        })
    }

    /// Price the customer pays today.
    pub fn effective_price(&self) -> Decimal {
        pricing::effective_price(self.original_price, self.sale_price, self.is_on_sale)
    }

    /// Apply a partial update, re-validating the resulting product.
    pub fn apply(&mut self, update: ProductUpdate) -> Result<(), ProductError> {
        let mut draft = ProductDraft {
            name: self.name.clone(),
            description: self.description.clone(),
            category_id: self.category_id,
            stock: self.stock,
            original_price: self.original_price,
            sale_price: self.sale_price,
            is_on_sale: self.is_on_sale,
            is_featured: self.is_featured,
        };

        if let Some(name) = update.name {
            draft.name = name;
        }
        if let Some(description) = update.description {
            draft.description = description;
        }
        if let Some(category_id) = update.category_id {
            draft.category_id = category_id;
        }
        if let Some(stock) = update.stock {
            draft.stock = stock;
        }
        if let Some(price) = update.original_price {
            draft.original_price = price;
        }
        if let Some(sale_price) = update.sale_price {
            draft.sale_price = sale_price;
        }
        if let Some(on_sale) = update.is_on_sale {
            draft.is_on_sale = on_sale;
        }
        if let Some(featured) = update.is_featured {
            draft.is_featured = featured;
        }
        draft.validate()?;

        self.name = draft.name.trim().to_string();
        self.description = draft.description.trim().to_string();
        self.category_id = draft.category_id;
        self.stock = draft.stock;
        self.original_price = pricing::round_money(draft.original_price);
        self.sale_price = draft.sale_price.map(pricing::round_money);
        self.is_on_sale = draft.is_on_sale;
        self.is_featured = draft.is_featured;
        if let Some(active) = update.is_active {
            self.is_active = active;
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn deactivate(&mut self) {
        self.is_active = false;
        self.updated_at = Utc::now();
    }
}

/// Fields a merchant supplies when listing a product.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductDraft {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category_id: Uuid,
    #[serde(default)]
    pub stock: i32,
    pub original_price: Decimal,
    pub sale_price: Option<Decimal>,
    #[serde(default)]
    pub is_on_sale: bool,
    #[serde(default)]
    pub is_featured: bool,
}

impl ProductDraft {
    pub fn validate(&self) -> Result<(), ProductError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ProductError::Invalid("name is required".to_string()));
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(ProductError::Invalid(format!("name must be at most {} characters", MAX_NAME_LEN)));
        }
        if self.description.trim().chars().count() > MAX_DESCRIPTION_LEN {
            return Err(ProductError::Invalid(format!(
                "description must be at most {} characters",
                MAX_DESCRIPTION_LEN
            )));
        }
        if self.stock < 0 {
            return Err(ProductError::Invalid("stock cannot be negative".to_string()));
        }
        if self.original_price.is_sign_negative() {
            return Err(ProductError::Invalid("original_price cannot be negative".to_string()));
        }
        if pricing::round_money(self.original_price) > pricing::MAX_AMOUNT {
            return Err(ProductError::Invalid(format!("original_price cannot exceed {}", pricing::MAX_AMOUNT)));
        }
        if let Some(sale) = self.sale_price {
            if sale.is_sign_negative() {
                return Err(ProductError::Invalid("sale_price cannot be negative".to_string()));
            }
            if sale > self.original_price {
                return Err(ProductError::Invalid("sale_price cannot exceed original_price".to_string()));
            }
        }
        Ok(())
    }
}

/// Partial product update. `sale_price: Some(None)` clears the sale price.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    pub stock: Option<i32>,
    pub original_price: Option<Decimal>,
    #[serde(default, with = "double_option")]
    pub sale_price: Option<Option<Decimal>>,
    pub is_on_sale: Option<bool>,
    pub is_featured: Option<bool>,
    pub is_active: Option<bool>,
}

mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductImage {
    pub id: Uuid,
    pub product_id: Uuid,
    pub url: String,
    pub alt_text: String,
    pub is_primary: bool,
    pub position: i32,
    pub created_at: DateTime<Utc>,
}

impl ProductImage {
    pub fn new(product_id: Uuid, url: String, alt_text: String, is_primary: bool, position: i32) -> Result<Self, ProductError> {
        if url.trim().is_empty() {
            return Err(ProductError::Invalid("image url is required".to_string()));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            product_id,
            url,
            alt_text,
            is_primary,
            position,
            created_at: Utc::now(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductSpecification {
    pub id: Uuid,
    pub product_id: Uuid,
    pub title: String,
    pub body: String,
}

impl ProductSpecification {
    pub fn new(product_id: Uuid, title: String, body: String) -> Result<Self, ProductError> {
        if title.trim().is_empty() || body.trim().is_empty() {
            return Err(ProductError::Invalid("specification title and body are required".to_string()));
        }
        Ok(Self { id: Uuid::new_v4(), product_id, title, body })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductFeature {
    pub id: Uuid,
    pub product_id: Uuid,
    pub name: String,
}

impl ProductFeature {
    pub fn new(product_id: Uuid, name: String) -> Result<Self, ProductError> {
        if name.trim().is_empty() {
            return Err(ProductError::Invalid("feature name is required".to_string()));
        }
        Ok(Self { id: Uuid::new_v4(), product_id, name })
    }
}

/// Everything the product page shows.
#[derive(Debug, Clone, Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,
    pub effective_price: Decimal,
    pub images: Vec<ProductImage>,
    pub specifications: Vec<ProductSpecification>,
    pub features: Vec<ProductFeature>,
    pub inventory: Option<InventoryRecord>,
    pub stock_status: StockStatus,
    pub rating: RatingSummary,
}

/// Browse filters for the public product listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductQuery {
    pub category_id: Option<Uuid>,
    pub merchant_id: Option<Uuid>,
    pub search: Option<String>,
    pub on_sale: Option<bool>,
    pub featured: Option<bool>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl ProductQuery {
    pub const DEFAULT_PER_PAGE: u32 = 20;
    pub const MAX_PER_PAGE: u32 = 100;

    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> u32 {
        self.per_page.unwrap_or(Self::DEFAULT_PER_PAGE).clamp(1, Self::MAX_PER_PAGE)
    }

    pub fn offset(&self) -> u32 {
        (self.page() - 1).saturating_mul(self.limit())
    }

    /// Lower-cased, trimmed search term; `None` when blank.
    pub fn search_term(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }

    /// In-memory equivalent of the SQL filter (active products only).
    pub fn matches(&self, product: &Product) -> bool {
        if !product.is_active {
            return false;
        }
        if self.category_id.is_some_and(|c| c != product.category_id) {
            return false;
        }
        if self.merchant_id.is_some_and(|m| m != product.merchant_id) {
            return false;
        }
        if self.on_sale.is_some_and(|s| s != product.is_on_sale) {
            return false;
        }
        if self.featured.is_some_and(|f| f != product.is_featured) {
            return false;
        }
        if let Some(term) = self.search_term() {
            let haystack = format!("{} {}", product.name, product.description).to_lowercase();
            if !haystack.contains(&term) {
                return false;
            }
        }
        true
    }
}

/// Product-related errors
#[derive(Debug, thiserror::Error)]
pub enum ProductError {
    #[error("Product not found: {0}")]
    NotFound(String),

    #[error("Invalid product: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> ProductDraft {
        ProductDraft {
            name: "Walnut Desk".to_string(),
            description: "Solid walnut writing desk".to_string(),
            category_id: Uuid::new_v4(),
            stock: 4,
            original_price: Decimal::new(25000, 2),
            sale_price: Some(Decimal::new(19999, 2)),
            is_on_sale: false,
            is_featured: false,
        }
    }

    #[test]
    fn test_new_product_is_active_with_listed_price() {
        let product = Product::new(Uuid::new_v4(), draft()).unwrap();
        assert!(product.is_active);
        assert_eq!(product.likes_count, 0);
        assert_eq!(product.effective_price(), Decimal::new(25000, 2));
    }

    #[test]
    fn test_sale_price_cannot_exceed_original() {
        let mut d = draft();
        d.sale_price = Some(Decimal::new(30000, 2));
        assert!(matches!(Product::new(Uuid::new_v4(), d), Err(ProductError::Invalid(_))));
    }

    #[test]
    fn test_blank_name_rejected() {
        let mut d = draft();
        d.name = "   ".to_string();
        assert!(Product::new(Uuid::new_v4(), d).is_err());
    }

    #[test]
    fn test_apply_update_toggles_sale() {
        let mut product = Product::new(Uuid::new_v4(), draft()).unwrap();
        product
            .apply(ProductUpdate { is_on_sale: Some(true), ..Default::default() })
            .unwrap();
        assert_eq!(product.effective_price(), Decimal::new(19999, 2));

        product
            .apply(ProductUpdate { sale_price: Some(None), ..Default::default() })
            .unwrap();
        assert_eq!(product.effective_price(), Decimal::new(25000, 2));
    }

    #[test]
    fn test_rejected_update_leaves_product_unchanged() {
        let mut product = Product::new(Uuid::new_v4(), draft()).unwrap();
        let before = product.clone();
        let result = product.apply(ProductUpdate { original_price: Some(Decimal::new(100, 2)), ..Default::default() });
        assert!(result.is_err());
        assert_eq!(product, before);
    }

    #[test]
    fn test_price_beyond_column_precision_rejected() {
        let mut d = draft();
        d.original_price = Decimal::new(10_000_000_000, 2);
        d.sale_price = None;
        assert!(matches!(Product::new(Uuid::new_v4(), d), Err(ProductError::Invalid(msg)) if msg.contains("original_price")));

        let mut product = Product::new(Uuid::new_v4(), draft()).unwrap();
        let before = product.clone();
        let result = product.apply(ProductUpdate { original_price: Some(Decimal::new(10_000_000_000, 2)), ..Default::default() });
        assert!(result.is_err());
        assert_eq!(product, before);

        let mut d = draft();
        d.original_price = pricing::MAX_AMOUNT;
        assert!(Product::new(Uuid::new_v4(), d).is_ok());
    }

    #[test]
    fn test_update_deserializes_explicit_null_sale_price() {
        let update: ProductUpdate = serde_json::from_str(r#"{"sale_price": null}"#).unwrap();
        assert_eq!(update.sale_price, Some(None));
        let update: ProductUpdate = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(update.sale_price, None);
    }

    #[test]
    fn test_query_pagination_and_matching() {
        let product = Product::new(Uuid::new_v4(), draft()).unwrap();
        let query = ProductQuery { search: Some("  WALNUT ".to_string()), page: Some(3), per_page: Some(500), ..Default::default() };
        assert_eq!(query.limit(), 100);
        assert_eq!(query.offset(), 200);
        assert!(query.matches(&product));

        let other_merchant = ProductQuery { merchant_id: Some(Uuid::new_v4()), ..Default::default() };
        assert!(!other_merchant.matches(&product));

        let mut inactive = product.clone();
        inactive.deactivate();
        assert!(!ProductQuery::default().matches(&inactive));
    }
}

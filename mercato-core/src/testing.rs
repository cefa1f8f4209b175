//! Fixtures shared by the service tests.

use chrono::Utc;
use mercato_catalog::{Category, Merchant, Product, ProductDraft, ProductImage};
use mercato_order::{Cart, CartLine, CheckoutRequest, ShippingAddressInput};
use mercato_shared::pii::Masked;
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::memory::InMemoryStore;
use crate::notify::{LogNotificationSink, NotificationService};
use crate::repository::{CartRepository, CatalogRepository};
use crate::MerchantActor;

pub fn store() -> Arc<InMemoryStore> {
    Arc::new(InMemoryStore::new())
}

pub fn notifications(store: &Arc<InMemoryStore>) -> NotificationService {
    NotificationService::new(store.clone(), Arc::new(LogNotificationSink))
}

pub async fn merchant(store: &InMemoryStore, name: &str) -> MerchantActor {
    let merchant = Merchant::new(Uuid::new_v4(), name);
    let actor = MerchantActor { merchant_id: merchant.id, user_id: merchant.user_id };
    store.insert_merchant(merchant).await;
    actor
}

pub async fn category(store: &InMemoryStore, name: &str) -> Category {
    let category = Category::new(name, None);
    store.insert_category(category.clone()).await;
    category
}

pub fn draft(name: &str, category_id: Uuid, price_cents: i64) -> ProductDraft {
    ProductDraft {
        name: name.to_string(),
        description: format!("{} description", name),
        category_id,
        stock: 10,
        original_price: Decimal::new(price_cents, 2),
        sale_price: None,
        is_on_sale: false,
        is_featured: false,
    }
}

pub async fn product(store: &InMemoryStore, merchant_id: Uuid, name: &str, price_cents: i64) -> Product {
    let product = Product::new(merchant_id, draft(name, Uuid::new_v4(), price_cents)).unwrap();
    store.insert_product(&product).await.unwrap();
    product
}

pub async fn image(store: &InMemoryStore, product_id: Uuid, url: &str) {
    let image = ProductImage::new(product_id, url.to_string(), String::new(), true, 0).unwrap();
    store.save_images(product_id, &[image]).await.unwrap();
}

pub async fn user_cart(store: &InMemoryStore, user_id: Uuid, lines: &[(Uuid, i32)]) -> Cart {
    let cart = Cart::for_user(user_id, Utc::now());
    store.insert_cart(&cart).await.unwrap();
    for (product_id, quantity) in lines {
        store
            .add_line(&CartLine::new(cart.id, *product_id, *quantity, Utc::now()).unwrap())
            .await
            .unwrap();
    }
    cart
}

pub fn checkout_request() -> CheckoutRequest {
    CheckoutRequest {
        shipping_address: Some(ShippingAddressInput {
            full_address: Some("221B Baker Street".to_string()),
            city: Some("London".to_string()),
            state: Some("Greater London".to_string()),
            zip_code: Some("NW1 6XE".to_string()),
            country: Some("United Kingdom".to_string()),
            phone: Some(Masked::new("+442079460000".to_string())),
        }),
        payment_method: Some("card".to_string()),
    }
}

use chrono::Utc;
use mercato_order::{CheckoutLine, CheckoutPlan, CheckoutRequest, OrderDetail, OrderNumbering, RandomNumbering};
use mercato_shared::events::{MarketplaceEvent, OrderPlacedEvent};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::notify::{NotificationRequest, NotificationService};
use crate::repository::{CartRepository, CatalogRepository, MerchantRepository, OrderRepository};
use crate::{CoreError, CoreResult};

/// Returned to the customer after a successful checkout.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CheckoutReceipt {
    pub order_id: Uuid,
    pub order_number: String,
    pub total_amount: Decimal,
}

/// Converts a customer's cart into an order split by merchant, and serves the
/// customer's view of their orders.
#[derive(Clone)]
pub struct CheckoutService {
    carts: Arc<dyn CartRepository>,
    catalog: Arc<dyn CatalogRepository>,
    merchants: Arc<dyn MerchantRepository>,
    orders: Arc<dyn OrderRepository>,
    notifications: NotificationService,
    numbering: Arc<dyn OrderNumbering>,
}

impl CheckoutService {
    pub fn new(
        carts: Arc<dyn CartRepository>,
        catalog: Arc<dyn CatalogRepository>,
        merchants: Arc<dyn MerchantRepository>,
        orders: Arc<dyn OrderRepository>,
        notifications: NotificationService,
    ) -> Self {
        Self {
            carts,
            catalog,
            merchants,
            orders,
            notifications,
            numbering: Arc::new(RandomNumbering),
        }
    }

    pub fn with_numbering(mut self, numbering: Arc<dyn OrderNumbering>) -> Self {
        self.numbering = numbering;
        self
    }

    pub async fn checkout(&self, customer_id: Uuid, request: CheckoutRequest) -> CoreResult<CheckoutReceipt> {
        let cart = self
            .carts
            .find_user_cart(customer_id)
            .await?
            .ok_or(CoreError::CartNotFound)?;

        let lines = self.carts.list_lines(cart.id).await?;
        if lines.is_empty() {
            tracing::warn!(%customer_id, cart_id = %cart.id, "Checkout attempted on empty cart");
            return Err(CoreError::EmptyCart);
        }
        request.validate()?;

        let product_ids: Vec<Uuid> = lines.iter().map(|l| l.product_id).collect();
        let products: HashMap<Uuid, _> = self
            .catalog
            .get_products(&product_ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();
        let mut images = self.catalog.primary_images(&product_ids).await?;
        let mut inventories = self.catalog.get_inventories(&product_ids).await?;

        let checkout_lines = lines
            .into_iter()
            .map(|line| {
                let product = products
                    .get(&line.product_id)
                    .cloned()
                    .ok_or_else(|| CoreError::NotFound(format!("Product {}", line.product_id)))?;
                Ok(CheckoutLine {
                    line_id: line.id,
                    quantity: line.quantity,
                    image_url: images.remove(&product.id),
                    sku: inventories.remove(&product.id).map(|r| r.sku),
                    product,
                })
            })
            .collect::<CoreResult<Vec<_>>>()?;

        let plan = CheckoutPlan::build(customer_id, checkout_lines, &request, self.numbering.as_ref(), Utc::now())?;

        self.orders.commit_checkout(cart.id, &plan).await.map_err(|e| {
            tracing::error!(%customer_id, order_number = %plan.order.order_number, "Checkout commit failed: {}", e);
            CoreError::Storage(e.to_string())
        })?;

        tracing::info!(
            order_id = %plan.order.id,
            order_number = %plan.order.order_number,
            sub_orders = plan.sub_orders.len(),
            total = %plan.order.total_amount,
            "Order placed"
        );

        self.announce(&plan).await;

        Ok(CheckoutReceipt {
            order_id: plan.order.id,
            order_number: plan.order.order_number,
            total_amount: plan.order.total_amount,
        })
    }

    async fn announce(&self, plan: &CheckoutPlan) {
        let order = &plan.order;
        self.notifications
            .publish(MarketplaceEvent::OrderPlaced(OrderPlacedEvent {
                order_id: order.id,
                order_number: order.order_number.clone(),
                customer_id: order.customer_id,
                total_amount: order.total_amount,
                merchant_ids: plan.merchant_ids(),
                timestamp: order.created_at.timestamp(),
            }))
            .await;

        self.notifications
            .notify_quietly(
                NotificationRequest::new(
                    order.customer_id,
                    "Order Confirmed",
                    format!("Your order {} has been placed. Total: {}", order.order_number, order.total_amount),
                    "order",
                )
                .with_action_url(format!("/orders/{}", order.id)),
            )
            .await;

        for planned in &plan.sub_orders {
            let sub_order = &planned.sub_order;
            let merchant = match self.merchants.get_merchant(sub_order.merchant_id).await {
                Ok(Some(merchant)) => merchant,
                Ok(None) => {
                    tracing::warn!(merchant_id = %sub_order.merchant_id, "Merchant missing, order notification skipped");
                    continue;
                }
                Err(e) => {
                    tracing::error!(merchant_id = %sub_order.merchant_id, "Failed to load merchant: {}", e);
                    continue;
                }
            };
            self.notifications
                .notify_quietly(
                    NotificationRequest::new(
                        merchant.user_id,
                        "New Order",
                        format!(
                            "You have a new order {} with {} item(s). Subtotal: {}",
                            sub_order.sub_order_number,
                            planned.items.len(),
                            sub_order.subtotal
                        ),
                        "order",
                    )
                    .with_action_url(format!("/merchant/orders/{}", sub_order.id)),
                )
                .await;
        }
    }

    pub async fn list_orders(&self, customer_id: Uuid) -> CoreResult<Vec<OrderDetail>> {
        Ok(self.orders.list_orders(customer_id).await?)
    }

    /// A customer only sees their own orders; anyone else's is reported missing.
    pub async fn get_order(&self, customer_id: Uuid, order_id: Uuid) -> CoreResult<OrderDetail> {
        self.orders
            .get_order(order_id)
            .await?
            .filter(|o| o.order.customer_id == customer_id)
            .ok_or_else(|| CoreError::NotFound(format!("Order {}", order_id)))
    }
}

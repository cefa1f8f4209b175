//! Checkout planning: turns priced cart lines into the rows an order commit
//! writes. Planning does no I/O; the repository commits a plan together with
//! the cart-line deletion in one unit of work.

use chrono::{DateTime, Utc};
use mercato_catalog::{pricing, PricingError, Product};
use serde::Deserialize;
use uuid::Uuid;

use crate::models::{Address, Order, OrderItem, OrderStatus, PaymentInfo, ShippingAddressInput, SubOrder, SubOrderStatus};
use crate::numbering::OrderNumbering;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckoutRequest {
    pub shipping_address: Option<ShippingAddressInput>,
    pub payment_method: Option<String>,
}

impl CheckoutRequest {
    /// Rejects a missing or incomplete shipping address.
    pub fn validate(&self) -> Result<&ShippingAddressInput, CheckoutError> {
        let address = self
            .shipping_address
            .as_ref()
            .ok_or(CheckoutError::MissingShippingAddress)?;
        if let Some(field) = address.missing_field() {
            return Err(CheckoutError::InvalidAddress(format!("{} is required", field)));
        }
        Ok(address)
    }
}

/// A cart line resolved against the catalog, ready to be snapshotted.
#[derive(Debug, Clone)]
pub struct CheckoutLine {
    pub line_id: Uuid,
    pub product: Product,
    pub quantity: i32,
    pub image_url: Option<String>,
    pub sku: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PlannedSubOrder {
    pub sub_order: SubOrder,
    pub items: Vec<OrderItem>,
}

/// A cart line at the quantity the plan priced it with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumedLine {
    pub line_id: Uuid,
    pub quantity: i32,
}

/// The fully priced and numbered set of rows a checkout writes.
#[derive(Debug, Clone)]
pub struct CheckoutPlan {
    pub order: Order,
    pub address: Address,
    pub payment: PaymentInfo,
    pub sub_orders: Vec<PlannedSubOrder>,
    /// Cart lines consumed by this checkout. The commit deletes exactly these
    /// and fails if any of them is gone or holds a different quantity.
    pub cart_lines: Vec<ConsumedLine>,
}

impl CheckoutPlan {
    pub fn build(
        customer_id: Uuid,
        lines: Vec<CheckoutLine>,
        request: &CheckoutRequest,
        numbering: &dyn OrderNumbering,
        now: DateTime<Utc>,
    ) -> Result<Self, CheckoutError> {
        if lines.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        let address = request.validate()?.to_address(customer_id, now);
        let payment = PaymentInfo::pending(request.payment_method.as_deref(), now);

        let order_id = Uuid::new_v4();
        let cart_lines = lines
            .iter()
            .map(|l| ConsumedLine { line_id: l.line_id, quantity: l.quantity })
            .collect();

        let sub_orders: Vec<PlannedSubOrder> = group_by_merchant(lines)
            .into_iter()
            .map(|(merchant_id, group)| plan_sub_order(order_id, merchant_id, group, numbering, now))
            .collect::<Result<_, _>>()?;

        let total_amount = pricing::sum_amounts(sub_orders.iter().map(|s| s.sub_order.subtotal))?;

        let order = Order {
            id: order_id,
            order_number: numbering.order_number(),
            customer_id,
            total_amount,
            order_status: OrderStatus::PendingPayment,
            shipping_address_id: address.id,
            payment_id: payment.id,
            created_at: now,
            updated_at: now,
            paid_at: None,
        };

        Ok(Self { order, address, payment, sub_orders, cart_lines })
    }

    pub fn merchant_ids(&self) -> Vec<Uuid> {
        self.sub_orders.iter().map(|s| s.sub_order.merchant_id).collect()
    }
}

/// Partition lines by merchant, keeping merchants in order of first appearance.
fn group_by_merchant(lines: Vec<CheckoutLine>) -> Vec<(Uuid, Vec<CheckoutLine>)> {
    let mut groups: Vec<(Uuid, Vec<CheckoutLine>)> = Vec::new();
    for line in lines {
        let merchant_id = line.product.merchant_id;
        match groups.iter_mut().find(|(id, _)| *id == merchant_id) {
            Some((_, group)) => group.push(line),
            None => groups.push((merchant_id, vec![line])),
        }
    }
    groups
}

fn plan_sub_order(
    order_id: Uuid,
    merchant_id: Uuid,
    lines: Vec<CheckoutLine>,
    numbering: &dyn OrderNumbering,
    now: DateTime<Utc>,
) -> Result<PlannedSubOrder, PricingError> {
    let sub_order_id = Uuid::new_v4();
    let items: Vec<OrderItem> = lines
        .into_iter()
        .map(|line| -> Result<OrderItem, PricingError> {
            let price = line.product.effective_price();
            Ok(OrderItem {
                id: Uuid::new_v4(),
                sub_order_id,
                product_id: Some(line.product.id),
                product_name: line.product.name,
                product_description: line.product.description,
                product_image: line.image_url.unwrap_or_default(),
                product_price: price,
                product_sku: line.sku.unwrap_or_default(),
                quantity: line.quantity,
                item_total: pricing::line_total(price, line.quantity)?,
                created_at: now,
            })
        })
        .collect::<Result<_, _>>()?;

    let subtotal = pricing::sum_amounts(items.iter().map(|i| i.item_total))?;

    Ok(PlannedSubOrder {
        sub_order: SubOrder {
            id: sub_order_id,
            order_id,
            merchant_id,
            sub_order_number: numbering.sub_order_number(),
            status: SubOrderStatus::Pending,
            subtotal,
            tracking_number: None,
            carrier: None,
            estimated_delivery: None,
            shipped_at: None,
            delivered_at: None,
            created_at: now,
            updated_at: now,
        },
        items,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    #[error("Cart is empty")]
    EmptyCart,

    #[error("Shipping address is required")]
    MissingShippingAddress,

    #[error("Invalid shipping address: {0}")]
    InvalidAddress(String),

    #[error(transparent)]
    Pricing(#[from] PricingError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numbering::RandomNumbering;
    use mercato_catalog::ProductDraft;
    use mercato_shared::pii::Masked;
    use rust_decimal::Decimal;

    fn product(merchant_id: Uuid, name: &str, price_cents: i64) -> Product {
        Product::new(
            merchant_id,
            ProductDraft {
                name: name.to_string(),
                description: format!("{} description", name),
                category_id: Uuid::new_v4(),
                stock: 100,
                original_price: Decimal::new(price_cents, 2),
                sale_price: None,
                is_on_sale: false,
                is_featured: false,
            },
        )
        .unwrap()
    }

    fn line(product: Product, quantity: i32) -> CheckoutLine {
        CheckoutLine { line_id: Uuid::new_v4(), product, quantity, image_url: None, sku: None }
    }

    fn request() -> CheckoutRequest {
        CheckoutRequest {
            shipping_address: Some(ShippingAddressInput {
                full_address: Some("5 Harbour Street".to_string()),
                city: Some("Accra".to_string()),
                state: Some("Greater Accra".to_string()),
                zip_code: Some("00233".to_string()),
                country: Some("Ghana".to_string()),
                phone: Some(Masked::new("+233201234567".to_string())),
            }),
            payment_method: None,
        }
    }

    #[test]
    fn test_two_merchant_split() {
        let (m1, m2) = (Uuid::new_v4(), Uuid::new_v4());
        let lines = vec![line(product(m1, "A", 1000), 2), line(product(m2, "B", 500), 3)];

        let plan = CheckoutPlan::build(Uuid::new_v4(), lines, &request(), &RandomNumbering, Utc::now()).unwrap();

        assert_eq!(plan.order.total_amount, Decimal::new(3500, 2));
        assert_eq!(plan.order.order_status, OrderStatus::PendingPayment);
        assert_eq!(plan.sub_orders.len(), 2);
        assert_eq!(plan.merchant_ids(), vec![m1, m2]);
        assert_eq!(plan.sub_orders[0].sub_order.subtotal, Decimal::new(2000, 2));
        assert_eq!(plan.sub_orders[1].sub_order.subtotal, Decimal::new(1500, 2));
        assert!(plan.sub_orders.iter().all(|s| s.items.len() == 1));
        assert!(plan.sub_orders.iter().all(|s| s.sub_order.status == SubOrderStatus::Pending));
        assert_eq!(plan.cart_lines.len(), 2);
    }

    #[test]
    fn test_totals_are_consistent() {
        let (m1, m2) = (Uuid::new_v4(), Uuid::new_v4());
        let lines = vec![
            line(product(m1, "A", 1999), 3),
            line(product(m2, "B", 250), 1),
            line(product(m1, "C", 1), 7),
        ];
        let mut expected: Vec<(Uuid, i32)> = lines.iter().map(|l| (l.product.id, l.quantity)).collect();
        let consumed: Vec<ConsumedLine> =
            lines.iter().map(|l| ConsumedLine { line_id: l.line_id, quantity: l.quantity }).collect();

        let plan = CheckoutPlan::build(Uuid::new_v4(), lines, &request(), &RandomNumbering, Utc::now()).unwrap();

        // Every cart line becomes exactly one order item, at the same quantity.
        let mut planned: Vec<(Uuid, i32)> = plan
            .sub_orders
            .iter()
            .flat_map(|s| s.items.iter())
            .map(|i| (i.product_id.unwrap(), i.quantity))
            .collect();
        expected.sort();
        planned.sort();
        assert_eq!(planned, expected);
        assert_eq!(plan.cart_lines, consumed);

        assert_eq!(plan.sub_orders.len(), 2);
        assert_eq!(plan.sub_orders[0].items.len(), 2);
        for planned in &plan.sub_orders {
            let sum: Decimal = planned.items.iter().map(|i| i.item_total).sum();
            assert_eq!(planned.sub_order.subtotal, sum);
            assert!(planned.items.iter().all(|i| i.sub_order_id == planned.sub_order.id));
        }
        let sum: Decimal = plan.sub_orders.iter().map(|s| s.sub_order.subtotal).sum();
        assert_eq!(plan.order.total_amount, sum);
        assert_eq!(plan.order.total_amount, Decimal::new(6504, 2));
    }

    #[test]
    fn test_snapshot_uses_effective_price() {
        let mut on_sale = product(Uuid::new_v4(), "Lamp", 4000);
        on_sale.sale_price = Some(Decimal::new(3000, 2));
        on_sale.is_on_sale = true;
        let mut checkout_line = line(on_sale.clone(), 2);
        checkout_line.image_url = Some("https://cdn.example.com/lamp.jpg".to_string());

        let plan = CheckoutPlan::build(Uuid::new_v4(), vec![checkout_line], &request(), &RandomNumbering, Utc::now()).unwrap();
        let item = &plan.sub_orders[0].items[0];

        assert_eq!(item.product_price, Decimal::new(3000, 2));
        assert_eq!(item.item_total, Decimal::new(6000, 2));
        assert_eq!(item.product_name, "Lamp");
        assert_eq!(item.product_image, "https://cdn.example.com/lamp.jpg");
        assert_eq!(item.product_sku, "");
        assert_eq!(item.product_id, Some(on_sale.id));
    }

    #[test]
    fn test_order_total_out_of_range_rejected() {
        let (m1, m2) = (Uuid::new_v4(), Uuid::new_v4());
        let lines = vec![line(product(m1, "A", 9_000_000_000), 1), line(product(m2, "B", 2_000_000_000), 1)];

        let result = CheckoutPlan::build(Uuid::new_v4(), lines, &request(), &RandomNumbering, Utc::now());
        assert!(matches!(result, Err(CheckoutError::Pricing(PricingError::AmountOutOfRange))));

        let lines = vec![line(product(m1, "A", 9_999_999_999), 2)];
        let result = CheckoutPlan::build(Uuid::new_v4(), lines, &request(), &RandomNumbering, Utc::now());
        assert!(matches!(result, Err(CheckoutError::Pricing(_))));
    }

    #[test]
    fn test_empty_cart_rejected() {
        let result = CheckoutPlan::build(Uuid::new_v4(), Vec::new(), &request(), &RandomNumbering, Utc::now());
        assert!(matches!(result, Err(CheckoutError::EmptyCart)));
    }

    #[test]
    fn test_missing_or_blank_address_rejected() {
        let lines = || vec![line(product(Uuid::new_v4(), "A", 100), 1)];

        let result = CheckoutPlan::build(Uuid::new_v4(), lines(), &CheckoutRequest::default(), &RandomNumbering, Utc::now());
        assert!(matches!(result, Err(CheckoutError::MissingShippingAddress)));

        let mut req = request();
        if let Some(address) = req.shipping_address.as_mut() {
            address.zip_code = Some(" ".to_string());
        }
        let result = CheckoutPlan::build(Uuid::new_v4(), lines(), &req, &RandomNumbering, Utc::now());
        assert!(matches!(result, Err(CheckoutError::InvalidAddress(msg)) if msg.contains("zip_code")));
    }
}

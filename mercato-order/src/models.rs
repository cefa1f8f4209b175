use chrono::{DateTime, Utc};
use mercato_shared::pii::Masked;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
#[error("Unknown {kind} status: {value}")]
pub struct StatusParseError {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! status_strings {
    ($ty:ident, $kind:literal, { $($variant:ident => $s:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $s),+
                }
            }
        }

        impl FromStr for $ty {
            type Err = StatusParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok($ty::$variant),)+
                    other => Err(StatusParseError { kind: $kind, value: other.to_string() }),
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

/// Order status in the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    PendingPayment,
    Paid,
    Processing,
    PartiallyShipped,
    Shipped,
    Completed,
    Cancelled,
    Refunded,
}

status_strings!(OrderStatus, "order", {
    PendingPayment => "pending_payment",
    Paid => "paid",
    Processing => "processing",
    PartiallyShipped => "partially_shipped",
    Shipped => "shipped",
    Completed => "completed",
    Cancelled => "cancelled",
    Refunded => "refunded",
});

/// Fulfillment status of a single merchant's portion of an order
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SubOrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

status_strings!(SubOrderStatus, "sub-order", {
    Pending => "pending",
    Processing => "processing",
    Shipped => "shipped",
    Delivered => "delivered",
    Cancelled => "cancelled",
});

impl SubOrderStatus {
    pub const ALL: [SubOrderStatus; 5] = [
        SubOrderStatus::Pending,
        SubOrderStatus::Processing,
        SubOrderStatus::Shipped,
        SubOrderStatus::Delivered,
        SubOrderStatus::Cancelled,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(self, SubOrderStatus::Delivered | SubOrderStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Refunded,
}

status_strings!(PaymentStatus, "payment", {
    Pending => "pending",
    Paid => "paid",
    Refunded => "refunded",
});

/// Placeholder payment record. Status changes come from outside the marketplace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentInfo {
    pub id: Uuid,
    pub method: String,
    pub status: PaymentStatus,
    pub transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentInfo {
    pub const DEFAULT_METHOD: &'static str = "not_selected";

    pub fn pending(method: Option<&str>, now: DateTime<Utc>) -> Self {
        let method = method
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(Self::DEFAULT_METHOD);
        Self {
            id: Uuid::new_v4(),
            method: method.to_string(),
            status: PaymentStatus::Pending,
            transaction_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Address {
    pub id: Uuid,
    pub user_id: Uuid,
    pub full_address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
    pub phone_number: Masked<String>,
    pub created_at: DateTime<Utc>,
}

/// Shipping address as submitted at checkout. Every field is required.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShippingAddressInput {
    pub full_address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub country: Option<String>,
    pub phone: Option<Masked<String>>,
}

impl ShippingAddressInput {
    /// Returns the name of the first missing or blank field.
    pub fn missing_field(&self) -> Option<&'static str> {
        fn blank(value: Option<&String>) -> bool {
            value.map_or(true, |v| v.trim().is_empty())
        }

        [
            ("full_address", blank(self.full_address.as_ref())),
            ("city", blank(self.city.as_ref())),
            ("state", blank(self.state.as_ref())),
            ("zip_code", blank(self.zip_code.as_ref())),
            ("country", blank(self.country.as_ref())),
            ("phone", blank(self.phone.as_ref().map(Masked::expose))),
        ]
        .into_iter()
        .find(|(_, missing)| *missing)
        .map(|(name, _)| name)
    }

    /// Builds the persisted address. Call `missing_field` first.
    pub fn to_address(&self, user_id: Uuid, now: DateTime<Utc>) -> Address {
        fn field(value: &Option<String>) -> String {
            value.as_deref().map(str::trim).unwrap_or_default().to_string()
        }

        Address {
            id: Uuid::new_v4(),
            user_id,
            full_address: field(&self.full_address),
            city: field(&self.city),
            state: field(&self.state),
            zip_code: field(&self.zip_code),
            country: field(&self.country),
            phone_number: Masked::new(
                self.phone
                    .as_ref()
                    .map(|p| p.expose().trim().to_string())
                    .unwrap_or_default(),
            ),
            created_at: now,
        }
    }
}

/// The customer-facing record of one checkout
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub customer_id: Uuid,
    pub total_amount: Decimal,
    pub order_status: OrderStatus,
    pub shipping_address_id: Uuid,
    pub payment_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

/// One merchant's share of an order, fulfilled independently
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubOrder {
    pub id: Uuid,
    pub order_id: Uuid,
    pub merchant_id: Uuid,
    pub sub_order_number: String,
    pub status: SubOrderStatus,
    pub subtotal: Decimal,
    pub tracking_number: Option<String>,
    pub carrier: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A purchased product, frozen at checkout time. `product_id` becomes `None`
/// if the product is later deleted; the snapshot fields are kept.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    pub id: Uuid,
    pub sub_order_id: Uuid,
    pub product_id: Option<Uuid>,
    pub product_name: String,
    pub product_description: String,
    pub product_image: String,
    pub product_price: Decimal,
    pub product_sku: String,
    pub quantity: i32,
    pub item_total: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubOrderDetail {
    #[serde(flatten)]
    pub sub_order: SubOrder,
    pub items: Vec<OrderItem>,
}

/// An order with everything the customer sees on the order page.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub shipping_address: Option<Address>,
    pub payment: Option<PaymentInfo>,
    pub sub_orders: Vec<SubOrderDetail>,
}

/// A sub-order as the fulfilling merchant sees it.
#[derive(Debug, Clone, Serialize)]
pub struct MerchantSubOrder {
    #[serde(flatten)]
    pub sub_order: SubOrder,
    pub order_number: String,
    pub customer_id: Uuid,
    pub payment_status: PaymentStatus,
    pub shipping_address: Option<Address>,
    pub items: Vec<OrderItem>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_input() -> ShippingAddressInput {
        ShippingAddressInput {
            full_address: Some("12 Marina Road".to_string()),
            city: Some("Lagos".to_string()),
            state: Some("Lagos".to_string()),
            zip_code: Some("101001".to_string()),
            country: Some("Nigeria".to_string()),
            phone: Some(Masked::new("+2348012345678".to_string())),
        }
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(OrderStatus::PendingPayment.as_str(), "pending_payment");
        assert_eq!("partially_shipped".parse::<OrderStatus>().unwrap(), OrderStatus::PartiallyShipped);
        for status in SubOrderStatus::ALL {
            assert_eq!(status.as_str().parse::<SubOrderStatus>().unwrap(), status);
        }
        assert!("lost".parse::<SubOrderStatus>().is_err());
    }

    #[test]
    fn test_serde_matches_storage_strings() {
        let json = serde_json::to_string(&SubOrderStatus::Processing).unwrap();
        assert_eq!(json, "\"processing\"");
        let json = serde_json::to_string(&OrderStatus::PendingPayment).unwrap();
        assert_eq!(json, "\"pending_payment\"");
    }

    #[test]
    fn test_missing_address_fields() {
        assert_eq!(full_input().missing_field(), None);

        let mut input = full_input();
        input.city = Some("   ".to_string());
        assert_eq!(input.missing_field(), Some("city"));

        let mut input = full_input();
        input.phone = None;
        assert_eq!(input.missing_field(), Some("phone"));
    }

    #[test]
    fn test_address_phone_is_masked_in_debug() {
        let address = full_input().to_address(Uuid::new_v4(), Utc::now());
        assert_eq!(address.phone_number.expose(), "+2348012345678");
        assert!(!format!("{:?}", address).contains("8012345678"));
    }

    #[test]
    fn test_payment_defaults_to_not_selected() {
        let payment = PaymentInfo::pending(None, Utc::now());
        assert_eq!(payment.method, "not_selected");
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(PaymentInfo::pending(Some("  "), Utc::now()).method, "not_selected");
        assert_eq!(PaymentInfo::pending(Some("card"), Utc::now()).method, "card");
    }
}

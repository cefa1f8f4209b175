use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Payload handed to the notification sink for every delivered notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub notification_id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    pub channels: Vec<String>,
    pub category: Option<String>,
    pub action_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPlacedEvent {
    pub order_id: Uuid,
    pub order_number: String,
    pub customer_id: Uuid,
    pub total_amount: Decimal,
    pub merchant_ids: Vec<Uuid>,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubOrderStatusChangedEvent {
    pub sub_order_id: Uuid,
    pub sub_order_number: String,
    pub order_id: Uuid,
    pub merchant_id: Uuid,
    pub from: String,
    pub to: String,
    pub timestamp: i64,
}

/// Envelope published on the notification topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketplaceEvent {
    Notification(NotificationEvent),
    OrderPlaced(OrderPlacedEvent),
    SubOrderStatusChanged(SubOrderStatusChangedEvent),
}

impl MarketplaceEvent {
    /// Partition key used by the sink so events for one aggregate stay ordered.
    pub fn key(&self) -> String {
        match self {
            MarketplaceEvent::Notification(e) => e.user_id.to_string(),
            MarketplaceEvent::OrderPlaced(e) => e.order_id.to_string(),
            MarketplaceEvent::SubOrderStatusChanged(e) => e.order_id.to_string(),
        }
    }
}

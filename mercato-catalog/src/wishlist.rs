use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WishlistEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl WishlistEntry {
    pub fn new(user_id: Uuid, product_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            product_id,
            created_at: Utc::now(),
        }
    }
}

/// Result of toggling a product on a user's wishlist, with the product's
/// updated like counter.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum WishlistToggle {
    Added { likes_count: i32 },
    Removed { likes_count: i32 },
}

impl WishlistToggle {
    pub fn is_added(&self) -> bool {
        matches!(self, WishlistToggle::Added { .. })
    }
}

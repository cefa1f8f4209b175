use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_LOW_STOCK_THRESHOLD: i32 = 5;

/// Inventory settings for a product. The stock count itself lives on the
/// product; this record decides how that count is interpreted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InventoryRecord {
    pub product_id: Uuid,
    pub sku: String,
    pub low_stock_threshold: i32,
    pub track_inventory: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    InStock,
    LowStock,
    OutOfStock,
    Untracked,
}

/// Merchant-supplied inventory settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InventoryUpdate {
    pub sku: Option<String>,
    pub low_stock_threshold: Option<i32>,
    pub track_inventory: Option<bool>,
}

impl InventoryRecord {
    pub fn new(product_id: Uuid) -> Self {
        Self {
            product_id,
            sku: String::new(),
            low_stock_threshold: DEFAULT_LOW_STOCK_THRESHOLD,
            track_inventory: true,
            updated_at: Utc::now(),
        }
    }

    pub fn apply(&mut self, update: InventoryUpdate) -> Result<(), String> {
        if let Some(threshold) = update.low_stock_threshold {
            if threshold < 0 {
                return Err("low_stock_threshold cannot be negative".to_string());
            }
            self.low_stock_threshold = threshold;
        }
        if let Some(sku) = update.sku {
            self.sku = sku.trim().to_string();
        }
        if let Some(track) = update.track_inventory {
            self.track_inventory = track;
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn is_in_stock(&self, stock: i32) -> bool {
        !self.track_inventory || stock > 0
    }

    pub fn is_low_stock(&self, stock: i32) -> bool {
        self.track_inventory && stock > 0 && stock <= self.low_stock_threshold
    }

    pub fn status(&self, stock: i32) -> StockStatus {
        if !self.track_inventory {
            StockStatus::Untracked
        } else if self.is_low_stock(stock) {
            StockStatus::LowStock
        } else if self.is_in_stock(stock) {
            StockStatus::InStock
        } else {
            StockStatus::OutOfStock
        }
    }
}

/// Stock status for a product that may not have an inventory record yet.
pub fn stock_status(record: Option<&InventoryRecord>, stock: i32) -> StockStatus {
    match record {
        Some(record) => record.status(stock),
        None => InventoryRecord::new(Uuid::nil()).status(stock),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_levels() {
        let record = InventoryRecord::new(Uuid::new_v4());
        assert_eq!(record.status(0), StockStatus::OutOfStock);
        assert_eq!(record.status(5), StockStatus::LowStock);
        assert_eq!(record.status(6), StockStatus::InStock);
        assert!(!record.is_in_stock(0));
        assert!(record.is_low_stock(1));
    }

    #[test]
    fn test_untracked_inventory_is_always_in_stock() {
        let mut record = InventoryRecord::new(Uuid::new_v4());
        record
            .apply(InventoryUpdate { track_inventory: Some(false), ..Default::default() })
            .unwrap();
        assert!(record.is_in_stock(0));
        assert!(!record.is_low_stock(1));
        assert_eq!(record.status(0), StockStatus::Untracked);
    }

    #[test]
    fn test_negative_threshold_rejected() {
        let mut record = InventoryRecord::new(Uuid::new_v4());
        let result = record.apply(InventoryUpdate { low_stock_threshold: Some(-1), ..Default::default() });
        assert!(result.is_err());
        assert_eq!(record.low_stock_threshold, DEFAULT_LOW_STOCK_THRESHOLD);
    }

    #[test]
    fn test_missing_record_uses_defaults() {
        assert_eq!(stock_status(None, 3), StockStatus::LowStock);
        assert_eq!(stock_status(None, 0), StockStatus::OutOfStock);
    }
}

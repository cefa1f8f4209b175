use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::product::Product;
use crate::review::RatingSummary;

const MAX_STORE_NAME_LEN: usize = 100;
const MAX_STORE_DESCRIPTION_LEN: usize = 500;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Pending,
    Verified,
    Rejected,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MerchantStatus {
    Active,
    Inactive,
    Suspended,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Pending => "pending",
            VerificationStatus::Verified => "verified",
            VerificationStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for VerificationStatus {
    type Err = MerchantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(VerificationStatus::Pending),
            "verified" => Ok(VerificationStatus::Verified),
            "rejected" => Ok(VerificationStatus::Rejected),
            other => Err(MerchantError::UnknownStatus(other.to_string())),
        }
    }
}

impl MerchantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MerchantStatus::Active => "active",
            MerchantStatus::Inactive => "inactive",
            MerchantStatus::Suspended => "suspended",
        }
    }
}

impl FromStr for MerchantStatus {
    type Err = MerchantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(MerchantStatus::Active),
            "inactive" => Ok(MerchantStatus::Inactive),
            "suspended" => Ok(MerchantStatus::Suspended),
            other => Err(MerchantError::UnknownStatus(other.to_string())),
        }
    }
}

impl fmt::Display for MerchantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A seller on the marketplace, owned by exactly one user account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Merchant {
    pub id: Uuid,
    pub user_id: Uuid,
    pub store_name: String,
    pub store_description: String,
    pub store_email: String,
    pub store_address: String,
    pub store_logo: Option<String>,
    pub store_phone: String,
    pub verification_status: VerificationStatus,
    pub active_status: MerchantStatus,
    pub total_sales: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Merchant {
    pub fn new(user_id: Uuid, store_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            store_name: store_name.into(),
            store_description: String::new(),
            store_email: String::new(),
            store_address: String::new(),
            store_logo: None,
            store_phone: String::new(),
            verification_status: VerificationStatus::Pending,
            active_status: MerchantStatus::Inactive,
            total_sales: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&mut self, update: StoreProfileUpdate) -> Result<(), MerchantError> {
        if let Some(name) = &update.store_name {
            if name.trim().chars().count() > MAX_STORE_NAME_LEN {
                return Err(MerchantError::Invalid(format!("store_name must be at most {} characters", MAX_STORE_NAME_LEN)));
            }
        }
        if let Some(description) = &update.store_description {
            if description.chars().count() > MAX_STORE_DESCRIPTION_LEN {
                return Err(MerchantError::Invalid(format!(
                    "store_description must be at most {} characters",
                    MAX_STORE_DESCRIPTION_LEN
                )));
            }
        }

        if let Some(name) = update.store_name {
            self.store_name = name.trim().to_string();
        }
        if let Some(description) = update.store_description {
            self.store_description = description;
        }
        if let Some(email) = update.store_email {
            self.store_email = email;
        }
        if let Some(address) = update.store_address {
            self.store_address = address;
        }
        if let Some(logo) = update.store_logo {
            self.store_logo = Some(logo);
        }
        if let Some(phone) = update.store_phone {
            self.store_phone = phone;
        }
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreProfileUpdate {
    pub store_name: Option<String>,
    pub store_description: Option<String>,
    pub store_email: Option<String>,
    pub store_address: Option<String>,
    pub store_logo: Option<String>,
    pub store_phone: Option<String>,
}

/// Public storefront: the merchant's profile, active listings and rating.
#[derive(Debug, Clone, Serialize)]
pub struct Storefront {
    pub merchant: Merchant,
    pub products: Vec<Product>,
    pub rating: RatingSummary,
}

#[derive(Debug, thiserror::Error)]
pub enum MerchantError {
    #[error("Merchant not found: {0}")]
    NotFound(String),

    #[error("Unknown merchant status: {0}")]
    UnknownStatus(String),

    #[error("Invalid store profile: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_merchant_defaults() {
        let merchant = Merchant::new(Uuid::new_v4(), "Kente House");
        assert_eq!(merchant.verification_status, VerificationStatus::Pending);
        assert_eq!(merchant.active_status, MerchantStatus::Inactive);
    }

    #[test]
    fn test_profile_update_validates_description() {
        let mut merchant = Merchant::new(Uuid::new_v4(), "Kente House");
        let result = merchant.apply(StoreProfileUpdate {
            store_description: Some("d".repeat(501)),
            store_name: Some("Renamed".into()),
            ..Default::default()
        });
        assert!(result.is_err());
        assert_eq!(merchant.store_name, "Kente House");
    }

    #[test]
    fn test_status_round_trip() {
        for status in [MerchantStatus::Active, MerchantStatus::Inactive, MerchantStatus::Suspended] {
            assert_eq!(status.as_str().parse::<MerchantStatus>().unwrap(), status);
        }
        assert!("closed".parse::<VerificationStatus>().is_err());
    }
}

pub mod product;
pub mod pricing;
pub mod inventory;
pub mod gallery;
pub mod category;
pub mod merchant;
pub mod review;
pub mod wishlist;

pub use product::{Product, ProductDraft, ProductUpdate, ProductQuery, ProductImage, ProductSpecification, ProductFeature, ProductDetail, ProductError};
pub use pricing::{effective_price, line_total, round_money, sum_amounts, PricingError, MAX_AMOUNT};
pub use inventory::{stock_status, InventoryRecord, InventoryUpdate, StockStatus};
pub use category::Category;
pub use merchant::{Merchant, MerchantStatus, VerificationStatus, StoreProfileUpdate, Storefront, MerchantError};
pub use review::{ProductReview, MerchantReview, RatingSummary, ReviewError};
pub use wishlist::{WishlistEntry, WishlistToggle};

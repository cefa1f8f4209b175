pub mod app_config;
pub mod database;
pub mod redis_repo;
pub mod events;
pub mod catalog_repo;
pub mod merchant_repo;
pub mod engagement_repo;
pub mod cart_repo;
pub mod order_repo;
pub mod notification_repo;

pub use database::DbClient;
pub use redis_repo::RedisClient;
#[cfg(feature = "kafka")]
pub use events::KafkaNotificationSink;
pub use catalog_repo::StoreCatalogRepository;
pub use merchant_repo::StoreMerchantRepository;
pub use engagement_repo::StoreEngagementRepository;
pub use cart_repo::StoreCartRepository;
pub use order_repo::StoreOrderRepository;
pub use notification_repo::StoreNotificationRepository;

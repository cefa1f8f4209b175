use std::sync::Arc;
use mercato_core::repository::{
    CartRepository, CatalogRepository, EngagementRepository, MerchantRepository, NotificationRepository,
    OrderRepository,
};
use mercato_core::{
    CartService, CatalogService, CheckoutService, EngagementService, FulfillmentService, InMemoryStore,
    NotificationService, NotificationSink,
};
use mercato_store::{
    RedisClient, StoreCartRepository, StoreCatalogRepository, StoreEngagementRepository, StoreMerchantRepository,
    StoreNotificationRepository, StoreOrderRepository,
};
use sqlx::PgPool;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

#[derive(Clone)]
pub struct RateLimit {
    pub redis: Arc<RedisClient>,
    pub requests: i64,
    pub window_seconds: i64,
}

/// One handle per repository seam; either all Postgres or all in-memory.
#[derive(Clone)]
pub struct Repositories {
    pub catalog: Arc<dyn CatalogRepository>,
    pub merchants: Arc<dyn MerchantRepository>,
    pub engagement: Arc<dyn EngagementRepository>,
    pub carts: Arc<dyn CartRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
}

impl Repositories {
    pub fn memory(store: Arc<InMemoryStore>) -> Self {
        Self {
            catalog: store.clone(),
            merchants: store.clone(),
            engagement: store.clone(),
            carts: store.clone(),
            orders: store.clone(),
            notifications: store,
        }
    }

    pub fn postgres(pool: PgPool) -> Self {
        Self {
            catalog: Arc::new(StoreCatalogRepository::new(pool.clone())),
            merchants: Arc::new(StoreMerchantRepository::new(pool.clone())),
            engagement: Arc::new(StoreEngagementRepository::new(pool.clone())),
            carts: Arc::new(StoreCartRepository::new(pool.clone())),
            orders: Arc::new(StoreOrderRepository::new(pool.clone())),
            notifications: Arc::new(StoreNotificationRepository::new(pool)),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub catalog: CatalogService,
    pub carts: CartService,
    pub checkout: CheckoutService,
    pub fulfillment: FulfillmentService,
    pub engagement: EngagementService,
    pub notifications: NotificationService,
    pub auth: AuthConfig,
    pub rate_limit: Option<RateLimit>,
}

impl AppState {
    pub fn new(
        repos: Repositories,
        sink: Arc<dyn NotificationSink>,
        auth: AuthConfig,
        anonymous_cart_ttl: chrono::Duration,
    ) -> Self {
        let notifications = NotificationService::new(repos.notifications.clone(), sink);

        Self {
            catalog: CatalogService::new(repos.catalog.clone(), repos.engagement.clone()),
            carts: CartService::new(repos.carts.clone(), repos.catalog.clone(), anonymous_cart_ttl),
            checkout: CheckoutService::new(
                repos.carts.clone(),
                repos.catalog.clone(),
                repos.merchants.clone(),
                repos.orders.clone(),
                notifications.clone(),
            ),
            fulfillment: FulfillmentService::new(repos.orders.clone(), notifications.clone()),
            engagement: EngagementService::new(repos.catalog, repos.merchants, repos.engagement, repos.orders),
            notifications,
            auth,
            rate_limit: None,
        }
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimit) -> Self {
        self.rate_limit = Some(rate_limit);
        self
    }
}

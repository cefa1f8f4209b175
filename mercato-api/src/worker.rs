use mercato_core::CartService;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{error, info};

/// Deletes expired anonymous carts on a fixed interval until the runtime shuts down.
pub fn start_cart_sweeper(carts: CartService, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("Cart sweeper started, running every {:?}", every);

        loop {
            ticker.tick().await;
            if let Err(e) = carts.sweep_expired().await {
                error!("Cart sweep failed: {}", e);
            }
        }
    })
}

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use mercato_api::{
    app,
    state::{AppState, AuthConfig, RateLimit, Repositories},
    worker,
};
use mercato_core::{InMemoryStore, LogNotificationSink, NotificationSink};
use mercato_store::app_config::{Config, StorageBackend};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mercato_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Mercato API on port {}", config.server.port);

    let repos = match config.storage.backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on restart");
            Repositories::memory(Arc::new(InMemoryStore::new()))
        }
        StorageBackend::Postgres => {
            let db = mercato_store::DbClient::connect(&config.database)
                .await
                .context("Failed to connect to Postgres")?;
            db.migrate().await.context("Failed to run migrations")?;
            Repositories::postgres(db.pool)
        }
    };

    let sink = notification_sink(&config)?;

    let mut app_state = AppState::new(
        repos,
        sink,
        AuthConfig { secret: config.auth.jwt_secret.clone() },
        chrono::Duration::seconds(config.cart.anonymous_ttl_seconds),
    );

    if let Some(redis) = &config.redis {
        match mercato_store::RedisClient::new(&redis.url).await {
            Ok(client) => {
                app_state = app_state.with_rate_limit(RateLimit {
                    redis: Arc::new(client),
                    requests: config.rate_limit.requests,
                    window_seconds: config.rate_limit.window_seconds,
                });
            }
            // Rate limiting is best effort
            Err(e) => tracing::warn!("Redis unavailable, rate limiting disabled: {}", e),
        }
    }

    worker::start_cart_sweeper(
        app_state.carts.clone(),
        tokio::time::Duration::from_secs(config.cart.sweep_interval_seconds),
    );

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}

#[cfg(feature = "kafka")]
fn notification_sink(config: &Config) -> anyhow::Result<Arc<dyn NotificationSink>> {
    match &config.kafka {
        Some(kafka) => {
            let sink = mercato_store::KafkaNotificationSink::new(&kafka.brokers, kafka.topic.clone())
                .context("Failed to create Kafka producer")?;
            tracing::info!("Publishing marketplace events to {}", kafka.topic);
            Ok(Arc::new(sink))
        }
        None => Ok(Arc::new(LogNotificationSink)),
    }
}

#[cfg(not(feature = "kafka"))]
fn notification_sink(config: &Config) -> anyhow::Result<Arc<dyn NotificationSink>> {
    if config.kafka.is_some() {
        tracing::warn!("Kafka configured but the kafka feature is disabled; logging events instead");
    }
    Ok(Arc::new(LogNotificationSink))
}

use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    pub redis: Option<RedisConfig>,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    pub kafka: Option<KafkaConfig>,
    pub auth: AuthConfig,
    #[serde(default)]
    pub cart: CartConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 { 10 }

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Postgres,
    /// Process-local store; nothing survives a restart.
    Memory,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitConfig {
    pub requests: i64,
    pub window_seconds: i64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { requests: 100, window_seconds: 60 }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
    #[serde(default = "default_topic")]
    pub topic: String,
}

fn default_topic() -> String { "marketplace.events".to_string() }

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CartConfig {
    pub anonymous_ttl_seconds: i64,
    pub sweep_interval_seconds: u64,
}

/// Longest lifetime an anonymous cart may be configured with.
pub const MAX_ANONYMOUS_TTL_SECONDS: i64 = 365 * 24 * 60 * 60;

impl Default for CartConfig {
    fn default() -> Self {
        Self {
            anonymous_ttl_seconds: 7 * 24 * 60 * 60,
            sweep_interval_seconds: 60 * 60,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides are optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Eg. `MERCATO__DATABASE__URL=postgres://...` sets `database.url`
            .add_source(config::Environment::with_prefix("MERCATO").separator("__"))
            .build()?;

        let config: Config = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the runtime cannot start with.
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        let invalid = |msg: String| Err(config::ConfigError::Message(msg));

        if !(1..=MAX_ANONYMOUS_TTL_SECONDS).contains(&self.cart.anonymous_ttl_seconds) {
            return invalid(format!(
                "cart.anonymous_ttl_seconds must be between 1 and {}, got {}",
                MAX_ANONYMOUS_TTL_SECONDS, self.cart.anonymous_ttl_seconds
            ));
        }
        if self.cart.sweep_interval_seconds == 0 {
            return invalid("cart.sweep_interval_seconds must be at least 1".to_string());
        }
        if self.rate_limit.requests < 1 || self.rate_limit.window_seconds < 1 {
            return invalid(format!(
                "rate_limit.requests and rate_limit.window_seconds must be positive, got {} and {}",
                self.rate_limit.requests, self.rate_limit.window_seconds
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml: &str) -> Config {
        config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_minimal_config_fills_defaults() {
        let cfg = parse(
            r#"
            [server]
            port = 8080

            [database]
            url = "postgres://localhost/mercato"

            [auth]
            jwt_secret = "secret"
            "#,
        );

        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.database.max_connections, 10);
        assert_eq!(cfg.storage.backend, StorageBackend::Postgres);
        assert!(cfg.redis.is_none());
        assert!(cfg.kafka.is_none());
        assert_eq!(cfg.rate_limit.requests, 100);
        assert_eq!(cfg.cart.anonymous_ttl_seconds, 604_800);
    }

    #[test]
    fn test_optional_sections() {
        let cfg = parse(
            r#"
            [server]
            port = 3000

            [database]
            url = "postgres://localhost/mercato"
            max_connections = 4

            [storage]
            backend = "memory"

            [redis]
            url = "redis://localhost:6379"

            [kafka]
            brokers = "localhost:9092"

            [auth]
            jwt_secret = "secret"

            [cart]
            anonymous_ttl_seconds = 60
            sweep_interval_seconds = 5
            "#,
        );

        assert_eq!(cfg.storage.backend, StorageBackend::Memory);
        assert_eq!(cfg.redis.unwrap().url, "redis://localhost:6379");
        assert_eq!(cfg.kafka.unwrap().topic, "marketplace.events");
        assert_eq!(cfg.cart.sweep_interval_seconds, 5);
    }

    fn with_cart(cart: &str) -> Config {
        parse(&format!(
            r#"
            [server]
            port = 8080

            [database]
            url = "postgres://localhost/mercato"

            [auth]
            jwt_secret = "secret"

            {}
            "#,
            cart
        ))
    }

    #[test]
    fn test_defaults_pass_validation() {
        assert!(with_cart("").validate().is_ok());
    }

    #[test]
    fn test_runtime_breaking_values_rejected() {
        let zero_sweep = with_cart("[cart]\nanonymous_ttl_seconds = 60\nsweep_interval_seconds = 0");
        assert!(matches!(zero_sweep.validate(), Err(config::ConfigError::Message(msg)) if msg.contains("sweep_interval_seconds")));

        let huge_ttl = with_cart("[cart]\nanonymous_ttl_seconds = 9223372036854775807\nsweep_interval_seconds = 60");
        assert!(matches!(huge_ttl.validate(), Err(config::ConfigError::Message(msg)) if msg.contains("anonymous_ttl_seconds")));

        let negative_ttl = with_cart("[cart]\nanonymous_ttl_seconds = -5\nsweep_interval_seconds = 60");
        assert!(negative_ttl.validate().is_err());

        let no_window = with_cart("[rate_limit]\nrequests = 10\nwindow_seconds = 0");
        assert!(matches!(no_window.validate(), Err(config::ConfigError::Message(msg)) if msg.contains("rate_limit")));
    }
}

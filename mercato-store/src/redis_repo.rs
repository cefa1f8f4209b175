use redis::RedisResult;

#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
}

impl RedisClient {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    /// Fixed-window counter per client (usually the peer IP). Returns true
    /// while the client is within `limit` requests for the current window.
    /// The window starts at the first request: `EXPIRE NX` (Redis 7+) only
    /// sets the TTL on a key that has none.
    pub async fn check_rate_limit(&self, client: &str, limit: i64, window_seconds: i64) -> RedisResult<bool> {
        let key = format!("mercato:ratelimit:{}", client);
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let (count,): (i64,) = redis::pipe()
            .atomic()
            .incr(&key, 1)
            .cmd("EXPIRE")
            .arg(&key)
            .arg(window_seconds)
            .arg("NX")
            .ignore()
            .query_async(&mut conn)
            .await?;

        Ok(count <= limit)
    }
}

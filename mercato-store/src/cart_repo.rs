use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mercato_core::repository::{CartRepository, RepoResult};
use mercato_order::cart::MAX_LINE_QUANTITY;
use mercato_order::{Cart, CartLine};
use sqlx::PgPool;
use uuid::Uuid;

pub struct StoreCartRepository {
    pool: PgPool,
}

impl StoreCartRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct CartRow {
    id: Uuid,
    user_id: Option<Uuid>,
    anonymous_token: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
}

impl From<CartRow> for Cart {
    fn from(row: CartRow) -> Self {
        Cart {
            id: row.id,
            user_id: row.user_id,
            anonymous_token: row.anonymous_token,
            created_at: row.created_at,
            updated_at: row.updated_at,
            expires_at: row.expires_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CartLineRow {
    id: Uuid,
    cart_id: Uuid,
    product_id: Uuid,
    quantity: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CartLineRow> for CartLine {
    fn from(row: CartLineRow) -> Self {
        CartLine {
            id: row.id,
            cart_id: row.cart_id,
            product_id: row.product_id,
            quantity: row.quantity,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl CartRepository for StoreCartRepository {
    async fn find_user_cart(&self, user_id: Uuid) -> RepoResult<Option<Cart>> {
        let row = sqlx::query_as::<_, CartRow>(
            "SELECT id, user_id, anonymous_token, created_at, updated_at, expires_at FROM carts WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Cart::from))
    }

    async fn find_anonymous_cart(&self, token: &str) -> RepoResult<Option<Cart>> {
        let row = sqlx::query_as::<_, CartRow>(
            r#"
            SELECT id, user_id, anonymous_token, created_at, updated_at, expires_at
            FROM carts
            WHERE anonymous_token = $1 AND user_id IS NULL
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Cart::from))
    }

    async fn insert_cart(&self, cart: &Cart) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO carts (id, user_id, anonymous_token, created_at, updated_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(cart.id)
        .bind(cart.user_id)
        .bind(&cart.anonymous_token)
        .bind(cart.created_at)
        .bind(cart.updated_at)
        .bind(cart.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn touch_cart(&self, cart_id: Uuid, updated_at: DateTime<Utc>, expires_at: Option<DateTime<Utc>>) -> RepoResult<()> {
        sqlx::query("UPDATE carts SET updated_at = $2, expires_at = $3 WHERE id = $1")
            .bind(cart_id)
            .bind(updated_at)
            .bind(expires_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_lines(&self, cart_id: Uuid) -> RepoResult<Vec<CartLine>> {
        let rows = sqlx::query_as::<_, CartLineRow>(
            r#"
            SELECT id, cart_id, product_id, quantity, created_at, updated_at
            FROM cart_items
            WHERE cart_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(cart_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(CartLine::from).collect())
    }

    async fn add_line(&self, line: &CartLine) -> RepoResult<Option<(CartLine, bool)>> {
        // xmax is zero only for a freshly inserted tuple. The guarded update
        // returns no row when the merged quantity would pass the limit.
        let row: Option<(Uuid, Uuid, Uuid, i32, DateTime<Utc>, DateTime<Utc>, bool)> = sqlx::query_as(
            r#"
            INSERT INTO cart_items (id, cart_id, product_id, quantity, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (cart_id, product_id) DO UPDATE
            SET quantity = cart_items.quantity + EXCLUDED.quantity,
                updated_at = EXCLUDED.updated_at
            WHERE cart_items.quantity::BIGINT + EXCLUDED.quantity <= $7
            RETURNING id, cart_id, product_id, quantity, created_at, updated_at, (xmax = 0) AS inserted
            "#,
        )
        .bind(line.id)
        .bind(line.cart_id)
        .bind(line.product_id)
        .bind(line.quantity)
        .bind(line.created_at)
        .bind(line.updated_at)
        .bind(i64::from(MAX_LINE_QUANTITY))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id, cart_id, product_id, quantity, created_at, updated_at, inserted)| {
            (CartLine { id, cart_id, product_id, quantity, created_at, updated_at }, inserted)
        }))
    }

    async fn set_line_quantity(&self, cart_id: Uuid, line_id: Uuid, quantity: i32) -> RepoResult<Option<CartLine>> {
        let row = sqlx::query_as::<_, CartLineRow>(
            r#"
            UPDATE cart_items
            SET quantity = $3, updated_at = NOW()
            WHERE id = $2 AND cart_id = $1
            RETURNING id, cart_id, product_id, quantity, created_at, updated_at
            "#,
        )
        .bind(cart_id)
        .bind(line_id)
        .bind(quantity)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(CartLine::from))
    }

    async fn remove_line(&self, cart_id: Uuid, line_id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM cart_items WHERE id = $2 AND cart_id = $1")
            .bind(cart_id)
            .bind(line_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear_lines(&self, cart_id: Uuid) -> RepoResult<u64> {
        let result = sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
            .bind(cart_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_expired_carts(&self, now: DateTime<Utc>) -> RepoResult<u64> {
        // cart_items cascade
        let result = sqlx::query("DELETE FROM carts WHERE user_id IS NULL AND expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mercato_catalog::{MerchantReview, ProductReview, RatingSummary, WishlistEntry, WishlistToggle};
use mercato_core::repository::{EngagementRepository, RepoResult};
use sqlx::PgPool;
use uuid::Uuid;

pub struct StoreEngagementRepository {
    pool: PgPool,
}

impl StoreEngagementRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn rating(&self, sql: &str, id: Uuid) -> RepoResult<RatingSummary> {
        let (sum, count): (Option<i64>, i64) = sqlx::query_as(sql).bind(id).fetch_one(&self.pool).await?;
        Ok(RatingSummary::from_totals(sum.unwrap_or(0), count))
    }
}

#[derive(sqlx::FromRow)]
struct ProductReviewRow {
    id: Uuid,
    product_id: Uuid,
    user_id: Uuid,
    rating: i16,
    comment: String,
    is_verified_purchase: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductReviewRow> for ProductReview {
    fn from(row: ProductReviewRow) -> Self {
        ProductReview {
            id: row.id,
            product_id: row.product_id,
            user_id: row.user_id,
            rating: row.rating,
            comment: row.comment,
            is_verified_purchase: row.is_verified_purchase,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct MerchantReviewRow {
    id: Uuid,
    merchant_id: Uuid,
    user_id: Uuid,
    rating: i16,
    comment: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<MerchantReviewRow> for MerchantReview {
    fn from(row: MerchantReviewRow) -> Self {
        MerchantReview {
            id: row.id,
            merchant_id: row.merchant_id,
            user_id: row.user_id,
            rating: row.rating,
            comment: row.comment,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl EngagementRepository for StoreEngagementRepository {
    async fn find_product_review(&self, product_id: Uuid, user_id: Uuid) -> RepoResult<Option<ProductReview>> {
        let row = sqlx::query_as::<_, ProductReviewRow>(
            r#"
            SELECT id, product_id, user_id, rating, comment, is_verified_purchase, created_at, updated_at
            FROM product_reviews
            WHERE product_id = $1 AND user_id = $2
            "#,
        )
        .bind(product_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(ProductReview::from))
    }

    async fn insert_product_review(&self, review: &ProductReview) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO product_reviews (id, product_id, user_id, rating, comment, is_verified_purchase, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(review.id)
        .bind(review.product_id)
        .bind(review.user_id)
        .bind(review.rating)
        .bind(&review.comment)
        .bind(review.is_verified_purchase)
        .bind(review.created_at)
        .bind(review.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_product_reviews(&self, product_id: Uuid) -> RepoResult<Vec<ProductReview>> {
        let rows = sqlx::query_as::<_, ProductReviewRow>(
            r#"
            SELECT id, product_id, user_id, rating, comment, is_verified_purchase, created_at, updated_at
            FROM product_reviews
            WHERE product_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(ProductReview::from).collect())
    }

    async fn product_rating(&self, product_id: Uuid) -> RepoResult<RatingSummary> {
        self.rating("SELECT SUM(rating)::BIGINT, COUNT(*) FROM product_reviews WHERE product_id = $1", product_id)
            .await
    }

    async fn insert_merchant_review(&self, review: &MerchantReview) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO merchant_reviews (id, merchant_id, user_id, rating, comment, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(review.id)
        .bind(review.merchant_id)
        .bind(review.user_id)
        .bind(review.rating)
        .bind(&review.comment)
        .bind(review.created_at)
        .bind(review.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_merchant_reviews(&self, merchant_id: Uuid) -> RepoResult<Vec<MerchantReview>> {
        let rows = sqlx::query_as::<_, MerchantReviewRow>(
            r#"
            SELECT id, merchant_id, user_id, rating, comment, created_at, updated_at
            FROM merchant_reviews
            WHERE merchant_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(merchant_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(MerchantReview::from).collect())
    }

    async fn merchant_rating(&self, merchant_id: Uuid) -> RepoResult<RatingSummary> {
        self.rating("SELECT SUM(rating)::BIGINT, COUNT(*) FROM merchant_reviews WHERE merchant_id = $1", merchant_id)
            .await
    }

    async fn is_wishlisted(&self, user_id: Uuid, product_id: Uuid) -> RepoResult<bool> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS (SELECT 1 FROM wishlist WHERE user_id = $1 AND product_id = $2)")
                .bind(user_id)
                .bind(product_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn toggle_wishlist(&self, user_id: Uuid, product_id: Uuid) -> RepoResult<WishlistToggle> {
        let mut tx = self.pool.begin().await?;

        // Row lock on the product serializes concurrent toggles of the same item.
        let locked: Option<(i32,)> = sqlx::query_as("SELECT likes_count FROM products WHERE id = $1 FOR UPDATE")
            .bind(product_id)
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            return Err(format!("product {} does not exist", product_id).into());
        }

        let removed = sqlx::query("DELETE FROM wishlist WHERE user_id = $1 AND product_id = $2")
            .bind(user_id)
            .bind(product_id)
            .execute(&mut *tx)
            .await?
            .rows_affected()
            > 0;

        let likes_sql = if removed {
            "UPDATE products SET likes_count = GREATEST(likes_count - 1, 0) WHERE id = $1 RETURNING likes_count"
        } else {
            let entry = WishlistEntry::new(user_id, product_id);
            sqlx::query("INSERT INTO wishlist (id, user_id, product_id, created_at) VALUES ($1, $2, $3, $4)")
                .bind(entry.id)
                .bind(entry.user_id)
                .bind(entry.product_id)
                .bind(entry.created_at)
                .execute(&mut *tx)
                .await?;
            "UPDATE products SET likes_count = likes_count + 1 WHERE id = $1 RETURNING likes_count"
        };

        let (likes_count,): (i32,) = sqlx::query_as(likes_sql).bind(product_id).fetch_one(&mut *tx).await?;
        tx.commit().await?;

        Ok(if removed { WishlistToggle::Removed { likes_count } } else { WishlistToggle::Added { likes_count } })
    }

    async fn list_wishlist(&self, user_id: Uuid) -> RepoResult<Vec<WishlistEntry>> {
        let rows: Vec<(Uuid, Uuid, Uuid, DateTime<Utc>)> = sqlx::query_as(
            "SELECT id, user_id, product_id, created_at FROM wishlist WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(id, user_id, product_id, created_at)| WishlistEntry { id, user_id, product_id, created_at })
            .collect())
    }
}

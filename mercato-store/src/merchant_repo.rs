use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mercato_catalog::Merchant;
use mercato_core::repository::{MerchantRepository, RepoResult};
use sqlx::PgPool;
use uuid::Uuid;

pub struct StoreMerchantRepository {
    pool: PgPool,
}

impl StoreMerchantRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const MERCHANT_COLUMNS: &str = "id, user_id, store_name, store_description, store_email, store_address, \
     store_logo, store_phone, verification_status, active_status, total_sales, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct MerchantRow {
    id: Uuid,
    user_id: Uuid,
    store_name: String,
    store_description: String,
    store_email: String,
    store_address: String,
    store_logo: Option<String>,
    store_phone: String,
    verification_status: String,
    active_status: String,
    total_sales: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<MerchantRow> for Merchant {
    type Error = mercato_catalog::MerchantError;

    fn try_from(row: MerchantRow) -> Result<Self, Self::Error> {
        Ok(Merchant {
            id: row.id,
            user_id: row.user_id,
            store_name: row.store_name,
            store_description: row.store_description,
            store_email: row.store_email,
            store_address: row.store_address,
            store_logo: row.store_logo,
            store_phone: row.store_phone,
            verification_status: row.verification_status.parse()?,
            active_status: row.active_status.parse()?,
            total_sales: row.total_sales,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl MerchantRepository for StoreMerchantRepository {
    async fn get_merchant(&self, id: Uuid) -> RepoResult<Option<Merchant>> {
        let sql = format!("SELECT {} FROM merchants WHERE id = $1", MERCHANT_COLUMNS);
        let row = sqlx::query_as::<_, MerchantRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Merchant::try_from).transpose()?)
    }

    async fn list_merchants(&self) -> RepoResult<Vec<Merchant>> {
        let sql = format!("SELECT {} FROM merchants ORDER BY store_name", MERCHANT_COLUMNS);
        let rows = sqlx::query_as::<_, MerchantRow>(&sql).fetch_all(&self.pool).await?;
        let merchants = rows
            .into_iter()
            .map(Merchant::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(merchants)
    }

    async fn update_merchant(&self, merchant: &Merchant) -> RepoResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE merchants
            SET store_name = $2, store_description = $3, store_email = $4, store_address = $5,
                store_logo = $6, store_phone = $7, verification_status = $8, active_status = $9,
                total_sales = $10, updated_at = $11
            WHERE id = $1
            "#,
        )
        .bind(merchant.id)
        .bind(&merchant.store_name)
        .bind(&merchant.store_description)
        .bind(&merchant.store_email)
        .bind(&merchant.store_address)
        .bind(&merchant.store_logo)
        .bind(&merchant.store_phone)
        .bind(merchant.verification_status.as_str())
        .bind(merchant.active_status.as_str())
        .bind(merchant.total_sales)
        .bind(merchant.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(format!("merchant {} does not exist", merchant.id).into());
        }
        Ok(())
    }
}

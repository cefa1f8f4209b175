use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mercato_catalog::{Category, InventoryRecord, Product, ProductFeature, ProductImage, ProductQuery, ProductSpecification};
use mercato_core::repository::{CatalogRepository, RepoResult};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::collections::HashMap;
use uuid::Uuid;

pub struct StoreCatalogRepository {
    pool: PgPool,
}

impl StoreCatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub(crate) const PRODUCT_COLUMNS: &str = "id, merchant_id, category_id, name, description, stock, is_on_sale, \
     sale_price, original_price, likes_count, is_active, is_featured, created_at, updated_at";

#[derive(sqlx::FromRow)]
pub(crate) struct ProductRow {
    id: Uuid,
    merchant_id: Uuid,
    category_id: Uuid,
    name: String,
    description: String,
    stock: i32,
    is_on_sale: bool,
    sale_price: Option<Decimal>,
    original_price: Decimal,
    likes_count: i32,
    is_active: bool,
    is_featured: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            merchant_id: row.merchant_id,
            category_id: row.category_id,
            name: row.name,
            description: row.description,
            stock: row.stock,
            is_on_sale: row.is_on_sale,
            sale_price: row.sale_price,
            original_price: row.original_price,
            likes_count: row.likes_count,
            is_active: row.is_active,
            is_featured: row.is_featured,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ImageRow {
    id: Uuid,
    product_id: Uuid,
    url: String,
    alt_text: String,
    is_primary: bool,
    position: i32,
    created_at: DateTime<Utc>,
}

impl From<ImageRow> for ProductImage {
    fn from(row: ImageRow) -> Self {
        ProductImage {
            id: row.id,
            product_id: row.product_id,
            url: row.url,
            alt_text: row.alt_text,
            is_primary: row.is_primary,
            position: row.position,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct InventoryRow {
    product_id: Uuid,
    sku: String,
    low_stock_threshold: i32,
    track_inventory: bool,
    updated_at: DateTime<Utc>,
}

impl From<InventoryRow> for InventoryRecord {
    fn from(row: InventoryRow) -> Self {
        InventoryRecord {
            product_id: row.product_id,
            sku: row.sku,
            low_stock_threshold: row.low_stock_threshold,
            track_inventory: row.track_inventory,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CategoryRow {
    id: Uuid,
    name: String,
    image_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Category {
            id: row.id,
            name: row.name,
            image_url: row.image_url,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Appends the WHERE clause equivalent of `ProductQuery::matches`.
fn push_product_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &ProductQuery) {
    builder.push(" WHERE is_active = TRUE");
    if let Some(category_id) = query.category_id {
        builder.push(" AND category_id = ").push_bind(category_id);
    }
    if let Some(merchant_id) = query.merchant_id {
        builder.push(" AND merchant_id = ").push_bind(merchant_id);
    }
    if let Some(on_sale) = query.on_sale {
        builder.push(" AND is_on_sale = ").push_bind(on_sale);
    }
    if let Some(featured) = query.featured {
        builder.push(" AND is_featured = ").push_bind(featured);
    }
    if let Some(term) = query.search_term() {
        builder
            .push(" AND LOWER(name || ' ' || description) LIKE ")
            .push_bind(format!("%{}%", term));
    }
}

#[async_trait]
impl CatalogRepository for StoreCatalogRepository {
    async fn list_products(&self, query: &ProductQuery) -> RepoResult<Vec<Product>> {
        let mut builder = QueryBuilder::new(format!("SELECT {} FROM products", PRODUCT_COLUMNS));
        push_product_filters(&mut builder, query);
        builder
            .push(" ORDER BY created_at DESC, id LIMIT ")
            .push_bind(query.limit() as i64)
            .push(" OFFSET ")
            .push_bind(query.offset() as i64);

        let rows = builder.build_query_as::<ProductRow>().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn list_merchant_products(&self, merchant_id: Uuid) -> RepoResult<Vec<Product>> {
        let sql = format!("SELECT {} FROM products WHERE merchant_id = $1 ORDER BY created_at DESC", PRODUCT_COLUMNS);
        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(merchant_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn get_product(&self, id: Uuid) -> RepoResult<Option<Product>> {
        let sql = format!("SELECT {} FROM products WHERE id = $1", PRODUCT_COLUMNS);
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Product::from))
    }

    async fn get_products(&self, ids: &[Uuid]) -> RepoResult<Vec<Product>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {} FROM products WHERE id = ANY($1) ORDER BY array_position($1::uuid[], id)",
            PRODUCT_COLUMNS
        );
        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn insert_product(&self, product: &Product) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, merchant_id, category_id, name, description, stock, is_on_sale,
                                  sale_price, original_price, likes_count, is_active, is_featured, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(product.id)
        .bind(product.merchant_id)
        .bind(product.category_id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.stock)
        .bind(product.is_on_sale)
        .bind(product.sale_price)
        .bind(product.original_price)
        .bind(product.likes_count)
        .bind(product.is_active)
        .bind(product.is_featured)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_product(&self, product: &Product) -> RepoResult<()> {
        // likes_count is owned by the wishlist toggle and never written here.
        let result = sqlx::query(
            r#"
            UPDATE products
            SET category_id = $2, name = $3, description = $4, stock = $5, is_on_sale = $6,
                sale_price = $7, original_price = $8, is_active = $9, is_featured = $10, updated_at = $11
            WHERE id = $1
            "#,
        )
        .bind(product.id)
        .bind(product.category_id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.stock)
        .bind(product.is_on_sale)
        .bind(product.sale_price)
        .bind(product.original_price)
        .bind(product.is_active)
        .bind(product.is_featured)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(format!("product {} does not exist", product.id).into());
        }
        Ok(())
    }

    async fn list_images(&self, product_id: Uuid) -> RepoResult<Vec<ProductImage>> {
        let rows = sqlx::query_as::<_, ImageRow>(
            r#"
            SELECT id, product_id, url, alt_text, is_primary, position, created_at
            FROM product_images
            WHERE product_id = $1
            ORDER BY is_primary DESC, position, created_at
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(ProductImage::from).collect())
    }

    async fn save_images(&self, product_id: Uuid, images: &[ProductImage]) -> RepoResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM product_images WHERE product_id = $1")
            .bind(product_id)
            .execute(&mut *tx)
            .await?;

        for image in images {
            sqlx::query(
                r#"
                INSERT INTO product_images (id, product_id, url, alt_text, is_primary, position, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(image.id)
            .bind(product_id)
            .bind(&image.url)
            .bind(&image.alt_text)
            .bind(image.is_primary)
            .bind(image.position)
            .bind(image.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn primary_images(&self, product_ids: &[Uuid]) -> RepoResult<HashMap<Uuid, String>> {
        if product_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows: Vec<(Uuid, String)> = sqlx::query_as(
            "SELECT product_id, url FROM product_images WHERE product_id = ANY($1) AND is_primary",
        )
        .bind(product_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().collect())
    }

    async fn list_specifications(&self, product_id: Uuid) -> RepoResult<Vec<ProductSpecification>> {
        let rows: Vec<(Uuid, Uuid, String, String)> = sqlx::query_as(
            "SELECT id, product_id, title, body FROM product_specifications WHERE product_id = $1 ORDER BY title",
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(id, product_id, title, body)| ProductSpecification { id, product_id, title, body })
            .collect())
    }

    async fn insert_specification(&self, spec: &ProductSpecification) -> RepoResult<()> {
        sqlx::query("INSERT INTO product_specifications (id, product_id, title, body) VALUES ($1, $2, $3, $4)")
            .bind(spec.id)
            .bind(spec.product_id)
            .bind(&spec.title)
            .bind(&spec.body)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_specification(&self, product_id: Uuid, spec_id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM product_specifications WHERE id = $1 AND product_id = $2")
            .bind(spec_id)
            .bind(product_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_features(&self, product_id: Uuid) -> RepoResult<Vec<ProductFeature>> {
        let rows: Vec<(Uuid, Uuid, String)> =
            sqlx::query_as("SELECT id, product_id, name FROM product_features WHERE product_id = $1 ORDER BY name")
                .bind(product_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows
            .into_iter()
            .map(|(id, product_id, name)| ProductFeature { id, product_id, name })
            .collect())
    }

    async fn insert_feature(&self, feature: &ProductFeature) -> RepoResult<()> {
        sqlx::query("INSERT INTO product_features (id, product_id, name) VALUES ($1, $2, $3)")
            .bind(feature.id)
            .bind(feature.product_id)
            .bind(&feature.name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_feature(&self, product_id: Uuid, feature_id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM product_features WHERE id = $1 AND product_id = $2")
            .bind(feature_id)
            .bind(product_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_inventory(&self, product_id: Uuid) -> RepoResult<Option<InventoryRecord>> {
        let row = sqlx::query_as::<_, InventoryRow>(
            "SELECT product_id, sku, low_stock_threshold, track_inventory, updated_at FROM inventory WHERE product_id = $1",
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(InventoryRecord::from))
    }

    async fn get_inventories(&self, product_ids: &[Uuid]) -> RepoResult<HashMap<Uuid, InventoryRecord>> {
        if product_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query_as::<_, InventoryRow>(
            "SELECT product_id, sku, low_stock_threshold, track_inventory, updated_at FROM inventory WHERE product_id = ANY($1)",
        )
        .bind(product_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|row| (row.product_id, InventoryRecord::from(row)))
            .collect())
    }

    async fn upsert_inventory(&self, record: &InventoryRecord) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO inventory (product_id, sku, low_stock_threshold, track_inventory, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (product_id) DO UPDATE
            SET sku = EXCLUDED.sku,
                low_stock_threshold = EXCLUDED.low_stock_threshold,
                track_inventory = EXCLUDED.track_inventory,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(record.product_id)
        .bind(&record.sku)
        .bind(record.low_stock_threshold)
        .bind(record.track_inventory)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_categories(&self) -> RepoResult<Vec<Category>> {
        let rows = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, name, image_url, created_at, updated_at FROM categories ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Category::from).collect())
    }

    async fn get_category(&self, id: Uuid) -> RepoResult<Option<Category>> {
        let row = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, name, image_url, created_at, updated_at FROM categories WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Category::from))
    }
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mercato_core::repository::{OrderRepository, RepoResult, StatusTally};
use mercato_order::{
    Address, CheckoutPlan, MerchantSubOrder, Order, OrderDetail, OrderItem, PaymentInfo, SubOrder, SubOrderDetail,
    SubOrderTransition,
};
use mercato_shared::pii::Masked;
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::HashMap;
use uuid::Uuid;

pub struct StoreOrderRepository {
    pool: PgPool,
}

impl StoreOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    order_number: String,
    customer_id: Uuid,
    total_amount: Decimal,
    order_status: String,
    shipping_address_id: Uuid,
    payment_id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    paid_at: Option<DateTime<Utc>>,
}

impl TryFrom<OrderRow> for Order {
    type Error = mercato_order::StatusParseError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(Order {
            id: row.id,
            order_number: row.order_number,
            customer_id: row.customer_id,
            total_amount: row.total_amount,
            order_status: row.order_status.parse()?,
            shipping_address_id: row.shipping_address_id,
            payment_id: row.payment_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
            paid_at: row.paid_at,
        })
    }
}

const SUB_ORDER_COLUMNS: &str = "s.id, s.order_id, s.merchant_id, s.sub_order_number, s.status, s.subtotal, \
     s.tracking_number, s.carrier, s.estimated_delivery, s.shipped_at, s.delivered_at, s.created_at, s.updated_at";

#[derive(sqlx::FromRow)]
struct SubOrderRow {
    id: Uuid,
    order_id: Uuid,
    merchant_id: Uuid,
    sub_order_number: String,
    status: String,
    subtotal: Decimal,
    tracking_number: Option<String>,
    carrier: Option<String>,
    estimated_delivery: Option<DateTime<Utc>>,
    shipped_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SubOrderRow> for SubOrder {
    type Error = mercato_order::StatusParseError;

    fn try_from(row: SubOrderRow) -> Result<Self, Self::Error> {
        Ok(SubOrder {
            id: row.id,
            order_id: row.order_id,
            merchant_id: row.merchant_id,
            sub_order_number: row.sub_order_number,
            status: row.status.parse()?,
            subtotal: row.subtotal,
            tracking_number: row.tracking_number,
            carrier: row.carrier,
            estimated_delivery: row.estimated_delivery,
            shipped_at: row.shipped_at,
            delivered_at: row.delivered_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// A sub-order joined with the order and payment fields a merchant sees.
#[derive(sqlx::FromRow)]
struct MerchantSubOrderRow {
    #[sqlx(flatten)]
    sub_order: SubOrderRow,
    order_number: String,
    customer_id: Uuid,
    shipping_address_id: Uuid,
    payment_status: String,
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    id: Uuid,
    sub_order_id: Uuid,
    product_id: Option<Uuid>,
    product_name: String,
    product_description: String,
    product_image: String,
    product_price: Decimal,
    product_sku: String,
    quantity: i32,
    item_total: Decimal,
    created_at: DateTime<Utc>,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        OrderItem {
            id: row.id,
            sub_order_id: row.sub_order_id,
            product_id: row.product_id,
            product_name: row.product_name,
            product_description: row.product_description,
            product_image: row.product_image,
            product_price: row.product_price,
            product_sku: row.product_sku,
            quantity: row.quantity,
            item_total: row.item_total,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AddressRow {
    id: Uuid,
    user_id: Uuid,
    full_address: String,
    city: String,
    state: String,
    zip_code: String,
    country: String,
    phone_number: String,
    created_at: DateTime<Utc>,
}

impl From<AddressRow> for Address {
    fn from(row: AddressRow) -> Self {
        Address {
            id: row.id,
            user_id: row.user_id,
            full_address: row.full_address,
            city: row.city,
            state: row.state,
            zip_code: row.zip_code,
            country: row.country,
            phone_number: Masked::new(row.phone_number),
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    method: String,
    status: String,
    transaction_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for PaymentInfo {
    type Error = mercato_order::StatusParseError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(PaymentInfo {
            id: row.id,
            method: row.method,
            status: row.status.parse()?,
            transaction_id: row.transaction_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl StoreOrderRepository {
    async fn addresses(&self, ids: &[Uuid]) -> RepoResult<HashMap<Uuid, Address>> {
        let rows = sqlx::query_as::<_, AddressRow>(
            r#"
            SELECT id, user_id, full_address, city, state, zip_code, country, phone_number, created_at
            FROM addresses
            WHERE id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|r| (r.id, Address::from(r))).collect())
    }

    async fn payments(&self, ids: &[Uuid]) -> RepoResult<HashMap<Uuid, PaymentInfo>> {
        let rows = sqlx::query_as::<_, PaymentRow>(
            "SELECT id, method, status, transaction_id, created_at, updated_at FROM payments WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        let mut payments = HashMap::with_capacity(rows.len());
        for row in rows {
            payments.insert(row.id, PaymentInfo::try_from(row)?);
        }
        Ok(payments)
    }

    /// Items grouped by sub-order, in cart order.
    async fn items(&self, sub_order_ids: &[Uuid]) -> RepoResult<HashMap<Uuid, Vec<OrderItem>>> {
        let rows = sqlx::query_as::<_, OrderItemRow>(
            r#"
            SELECT id, sub_order_id, product_id, product_name, product_description, product_image,
                   product_price, product_sku, quantity, item_total, created_at
            FROM order_items
            WHERE sub_order_id = ANY($1)
            ORDER BY sub_order_id, position
            "#,
        )
        .bind(sub_order_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
        for row in rows {
            grouped.entry(row.sub_order_id).or_default().push(OrderItem::from(row));
        }
        Ok(grouped)
    }

    /// Assemble full order views for already-loaded order rows, keeping their order.
    async fn details(&self, orders: Vec<Order>) -> RepoResult<Vec<OrderDetail>> {
        if orders.is_empty() {
            return Ok(Vec::new());
        }
        let order_ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
        let address_ids: Vec<Uuid> = orders.iter().map(|o| o.shipping_address_id).collect();
        let payment_ids: Vec<Uuid> = orders.iter().map(|o| o.payment_id).collect();

        let sql = format!(
            "SELECT {} FROM sub_orders s WHERE s.order_id = ANY($1) ORDER BY s.order_id, s.position",
            SUB_ORDER_COLUMNS
        );
        let sub_orders = sqlx::query_as::<_, SubOrderRow>(&sql)
            .bind(&order_ids)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(SubOrder::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        let sub_order_ids: Vec<Uuid> = sub_orders.iter().map(|s| s.id).collect();
        let mut items = self.items(&sub_order_ids).await?;
        let mut addresses = self.addresses(&address_ids).await?;
        let mut payments = self.payments(&payment_ids).await?;

        let mut by_order: HashMap<Uuid, Vec<SubOrderDetail>> = HashMap::new();
        for sub_order in sub_orders {
            let items = items.remove(&sub_order.id).unwrap_or_default();
            by_order.entry(sub_order.order_id).or_default().push(SubOrderDetail { sub_order, items });
        }

        Ok(orders
            .into_iter()
            .map(|order| OrderDetail {
                shipping_address: addresses.remove(&order.shipping_address_id),
                payment: payments.remove(&order.payment_id),
                sub_orders: by_order.remove(&order.id).unwrap_or_default(),
                order,
            })
            .collect())
    }

    async fn merchant_views(&self, rows: Vec<MerchantSubOrderRow>) -> RepoResult<Vec<MerchantSubOrder>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let sub_order_ids: Vec<Uuid> = rows.iter().map(|r| r.sub_order.id).collect();
        let address_ids: Vec<Uuid> = rows.iter().map(|r| r.shipping_address_id).collect();
        let mut items = self.items(&sub_order_ids).await?;
        let addresses = self.addresses(&address_ids).await?;

        let mut views = Vec::with_capacity(rows.len());
        for row in rows {
            let sub_order = SubOrder::try_from(row.sub_order)?;
            views.push(MerchantSubOrder {
                items: items.remove(&sub_order.id).unwrap_or_default(),
                shipping_address: addresses.get(&row.shipping_address_id).cloned(),
                payment_status: row.payment_status.parse()?,
                order_number: row.order_number,
                customer_id: row.customer_id,
                sub_order,
            });
        }
        Ok(views)
    }

    fn merchant_view_sql(filter: &str) -> String {
        format!(
            r#"
            SELECT {}, o.order_number, o.customer_id, o.shipping_address_id, p.status AS payment_status
            FROM sub_orders s
            JOIN orders o ON o.id = s.order_id
            JOIN payments p ON p.id = o.payment_id
            {}
            "#,
            SUB_ORDER_COLUMNS, filter
        )
    }

    async fn write_plan(tx: &mut Transaction<'_, Postgres>, plan: &CheckoutPlan) -> RepoResult<()> {
        let address = &plan.address;
        sqlx::query(
            r#"
            INSERT INTO addresses (id, user_id, full_address, city, state, zip_code, country, phone_number, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(address.id)
        .bind(address.user_id)
        .bind(&address.full_address)
        .bind(&address.city)
        .bind(&address.state)
        .bind(&address.zip_code)
        .bind(&address.country)
        .bind(address.phone_number.expose())
        .bind(address.created_at)
        .execute(&mut **tx)
        .await?;

        let payment = &plan.payment;
        sqlx::query(
            r#"
            INSERT INTO payments (id, method, status, transaction_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(payment.id)
        .bind(&payment.method)
        .bind(payment.status.as_str())
        .bind(&payment.transaction_id)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(&mut **tx)
        .await?;

        let order = &plan.order;
        sqlx::query(
            r#"
            INSERT INTO orders (id, order_number, customer_id, total_amount, order_status, shipping_address_id,
                                payment_id, created_at, updated_at, paid_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(order.id)
        .bind(&order.order_number)
        .bind(order.customer_id)
        .bind(order.total_amount)
        .bind(order.order_status.as_str())
        .bind(order.shipping_address_id)
        .bind(order.payment_id)
        .bind(order.created_at)
        .bind(order.updated_at)
        .bind(order.paid_at)
        .execute(&mut **tx)
        .await?;

        for (position, planned) in (0_i32..).zip(&plan.sub_orders) {
            let sub_order = &planned.sub_order;
            sqlx::query(
                r#"
                INSERT INTO sub_orders (id, order_id, merchant_id, sub_order_number, status, subtotal,
                                        tracking_number, carrier, estimated_delivery, shipped_at, delivered_at,
                                        created_at, updated_at, position)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
                "#,
            )
            .bind(sub_order.id)
            .bind(sub_order.order_id)
            .bind(sub_order.merchant_id)
            .bind(&sub_order.sub_order_number)
            .bind(sub_order.status.as_str())
            .bind(sub_order.subtotal)
            .bind(&sub_order.tracking_number)
            .bind(&sub_order.carrier)
            .bind(sub_order.estimated_delivery)
            .bind(sub_order.shipped_at)
            .bind(sub_order.delivered_at)
            .bind(sub_order.created_at)
            .bind(sub_order.updated_at)
            .bind(position)
            .execute(&mut **tx)
            .await?;

            for (item_position, item) in (0_i32..).zip(&planned.items) {
                sqlx::query(
                    r#"
                    INSERT INTO order_items (id, sub_order_id, product_id, product_name, product_description,
                                             product_image, product_price, product_sku, quantity, item_total, created_at,
                                             position)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                    "#,
                )
                .bind(item.id)
                .bind(item.sub_order_id)
                .bind(item.product_id)
                .bind(&item.product_name)
                .bind(&item.product_description)
                .bind(&item.product_image)
                .bind(item.product_price)
                .bind(&item.product_sku)
                .bind(item.quantity)
                .bind(item.item_total)
                .bind(item.created_at)
                .bind(item_position)
                .execute(&mut **tx)
                .await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for StoreOrderRepository {
    async fn commit_checkout(&self, cart_id: Uuid, plan: &CheckoutPlan) -> RepoResult<()> {
        let mut tx = self.pool.begin().await?;

        // Claim the cart lines first: a concurrent checkout of the same cart
        // blocks here and then finds nothing left to delete. A line whose
        // quantity moved since planning is not matched and fails the commit.
        let (line_ids, quantities): (Vec<Uuid>, Vec<i32>) =
            plan.cart_lines.iter().map(|l| (l.line_id, l.quantity)).unzip();
        let deleted = sqlx::query(
            r#"
            DELETE FROM cart_items
            WHERE cart_id = $1
              AND (id, quantity) IN (SELECT * FROM UNNEST($2::uuid[], $3::int[]))
            "#,
        )
        .bind(cart_id)
        .bind(&line_ids)
        .bind(&quantities)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if deleted != plan.cart_lines.len() as u64 {
            tx.rollback().await?;
            return Err(format!(
                "cart {} changed during checkout: expected {} lines, matched {}",
                cart_id,
                plan.cart_lines.len(),
                deleted
            )
            .into());
        }

        // Dropping the transaction on error rolls it back.
        Self::write_plan(&mut tx, plan).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_order(&self, id: Uuid) -> RepoResult<Option<OrderDetail>> {
        let row = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT id, order_number, customer_id, total_amount, order_status, shipping_address_id, payment_id,
                   created_at, updated_at, paid_at
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(self.details(vec![Order::try_from(row)?]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list_orders(&self, customer_id: Uuid) -> RepoResult<Vec<OrderDetail>> {
        let orders = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT id, order_number, customer_id, total_amount, order_status, shipping_address_id, payment_id,
                   created_at, updated_at, paid_at
            FROM orders
            WHERE customer_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Order::try_from)
        .collect::<Result<Vec<_>, _>>()?;

        self.details(orders).await
    }

    async fn get_sub_order(&self, id: Uuid) -> RepoResult<Option<SubOrder>> {
        let sql = format!("SELECT {} FROM sub_orders s WHERE s.id = $1", SUB_ORDER_COLUMNS);
        let row = sqlx::query_as::<_, SubOrderRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(SubOrder::try_from).transpose()?)
    }

    async fn get_merchant_sub_order(&self, id: Uuid) -> RepoResult<Option<MerchantSubOrder>> {
        let sql = Self::merchant_view_sql("WHERE s.id = $1");
        let rows = sqlx::query_as::<_, MerchantSubOrderRow>(&sql)
            .bind(id)
            .fetch_all(&self.pool)
            .await?;
        Ok(self.merchant_views(rows).await?.pop())
    }

    async fn list_merchant_sub_orders(&self, merchant_id: Uuid, paid_only: bool) -> RepoResult<Vec<MerchantSubOrder>> {
        let sql = Self::merchant_view_sql(
            "WHERE s.merchant_id = $1 AND ($2 = FALSE OR p.status = 'paid') ORDER BY s.created_at DESC",
        );
        let rows = sqlx::query_as::<_, MerchantSubOrderRow>(&sql)
            .bind(merchant_id)
            .bind(paid_only)
            .fetch_all(&self.pool)
            .await?;
        self.merchant_views(rows).await
    }

    async fn apply_transition(&self, transition: &SubOrderTransition) -> RepoResult<bool> {
        // Shipment details are only recorded on the move to shipped.
        let shipped_at = transition.shipped_at();
        let shipment = shipped_at.map(|_| &transition.shipment);

        let result = sqlx::query(
            r#"
            UPDATE sub_orders
            SET status = $3,
                updated_at = $4,
                shipped_at = COALESCE($5, shipped_at),
                tracking_number = COALESCE($6, tracking_number),
                carrier = COALESCE($7, carrier),
                estimated_delivery = COALESCE($8, estimated_delivery),
                delivered_at = COALESCE($9, delivered_at)
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(transition.sub_order_id)
        .bind(transition.from.as_str())
        .bind(transition.to.as_str())
        .bind(transition.at)
        .bind(shipped_at)
        .bind(shipment.and_then(|s| s.tracking_number.clone()))
        .bind(shipment.and_then(|s| s.carrier.clone()))
        .bind(shipment.and_then(|s| s.estimated_delivery))
        .bind(transition.delivered_at())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn has_purchased(&self, user_id: Uuid, product_id: Uuid) -> RepoResult<bool> {
        let (exists,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM order_items i
                JOIN sub_orders s ON s.id = i.sub_order_id
                JOIN orders o ON o.id = s.order_id
                WHERE o.customer_id = $1 AND i.product_id = $2
            )
            "#,
        )
        .bind(user_id)
        .bind(product_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn sub_order_tallies(&self, merchant_id: Uuid) -> RepoResult<Vec<StatusTally>> {
        let rows: Vec<(String, i64, Decimal)> = sqlx::query_as(
            r#"
            SELECT status, COUNT(*), COALESCE(SUM(subtotal), 0)
            FROM sub_orders
            WHERE merchant_id = $1
            GROUP BY status
            "#,
        )
        .bind(merchant_id)
        .fetch_all(&self.pool)
        .await?;

        let mut tallies = Vec::with_capacity(rows.len());
        for (status, count, subtotal) in rows {
            tallies.push(StatusTally { status: status.parse()?, count, subtotal });
        }
        Ok(tallies)
    }
}

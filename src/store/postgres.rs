use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::FromRow;
use std::collections::HashMap;

use super::{OrderRepository, StoreError};
use crate::config::DatabaseConfig;
use crate::models::{Delivery, Item, Order, Payment};

// ============================================================================
// PostgreSQL Order Repository
// ============================================================================
//
// An order is spread over five tables:
// - deliveries   one row per order, referenced by orders.delivery_id
// - payments     keyed by transaction_id = orders.payment_transaction_id
// - orders       the top-level row
// - items        keyed by chrt_id, first writer's body wins
// - order_items  one row per (order, item) reference
//
// Reads join orders/deliveries/payments in one query and fetch items through
// order_items in a second one.
//
// ============================================================================

const SELECT_ORDER_BY_ID: &str = r#"
    SELECT
        o.order_uid, o.track_number, o.entry, o.locale, o.internal_signature,
        o.customer_id, o.delivery_service, o.shardkey, o.sm_id, o.date_created, o.oof_shard,
        d.name AS delivery_name, d.phone AS delivery_phone, d.zip AS delivery_zip,
        d.city AS delivery_city, d.address AS delivery_address,
        d.region AS delivery_region, d.email AS delivery_email,
        p.transaction_id, p.request_id, p.currency, p.provider, p.amount,
        p.payment_dt, p.bank, p.delivery_cost, p.goods_total, p.custom_fee
    FROM orders AS o
    JOIN deliveries AS d ON o.delivery_id = d.id
    JOIN payments AS p ON o.payment_transaction_id = p.transaction_id
    WHERE o.order_uid = $1
"#;

const SELECT_MOST_RECENT: &str = r#"
    SELECT
        o.order_uid, o.track_number, o.entry, o.locale, o.internal_signature,
        o.customer_id, o.delivery_service, o.shardkey, o.sm_id, o.date_created, o.oof_shard,
        d.name AS delivery_name, d.phone AS delivery_phone, d.zip AS delivery_zip,
        d.city AS delivery_city, d.address AS delivery_address,
        d.region AS delivery_region, d.email AS delivery_email,
        p.transaction_id, p.request_id, p.currency, p.provider, p.amount,
        p.payment_dt, p.bank, p.delivery_cost, p.goods_total, p.custom_fee
    FROM orders AS o
    JOIN deliveries AS d ON o.delivery_id = d.id
    JOIN payments AS p ON o.payment_transaction_id = p.transaction_id
    ORDER BY o.date_created DESC
    LIMIT $1
"#;

const SELECT_ITEMS_FOR_ORDERS: &str = r#"
    SELECT
        oi.order_uid,
        i.chrt_id, i.track_number, i.price, i.rid, i.name, i.sale,
        i.size, i.total_price, i.nm_id, i.brand, i.status
    FROM items AS i
    JOIN order_items AS oi ON i.chrt_id = oi.chrt_id
    WHERE oi.order_uid = ANY($1)
    ORDER BY oi.id
"#;

#[derive(FromRow)]
struct OrderRow {
    order_uid: String,
    track_number: String,
    entry: String,
    locale: String,
    internal_signature: String,
    customer_id: String,
    delivery_service: String,
    shardkey: String,
    sm_id: i32,
    date_created: DateTime<Utc>,
    oof_shard: String,
    delivery_name: String,
    delivery_phone: String,
    delivery_zip: String,
    delivery_city: String,
    delivery_address: String,
    delivery_region: String,
    delivery_email: String,
    transaction_id: String,
    request_id: String,
    currency: String,
    provider: String,
    amount: i32,
    payment_dt: i64,
    bank: String,
    delivery_cost: i32,
    goods_total: i32,
    custom_fee: i32,
}

impl OrderRow {
    fn into_order(self, items: Vec<Item>) -> Order {
        Order {
            order_uid: self.order_uid,
            track_number: self.track_number,
            entry: self.entry,
            delivery: Delivery {
                name: self.delivery_name,
                phone: self.delivery_phone,
                zip: self.delivery_zip,
                city: self.delivery_city,
                address: self.delivery_address,
                region: self.delivery_region,
                email: self.delivery_email,
            },
            payment: Payment {
                transaction: self.transaction_id,
                request_id: self.request_id,
                currency: self.currency,
                provider: self.provider,
                amount: self.amount,
                payment_dt: self.payment_dt,
                bank: self.bank,
                delivery_cost: self.delivery_cost,
                goods_total: self.goods_total,
                custom_fee: self.custom_fee,
            },
            items,
            locale: self.locale,
            internal_signature: self.internal_signature,
            customer_id: self.customer_id,
            delivery_service: self.delivery_service,
            shardkey: self.shardkey,
            sm_id: self.sm_id,
            date_created: self.date_created,
            oof_shard: self.oof_shard,
        }
    }
}

#[derive(FromRow)]
struct ItemRow {
    order_uid: String,
    chrt_id: i64,
    track_number: String,
    price: i32,
    rid: String,
    name: String,
    sale: i32,
    size: String,
    total_price: i32,
    nm_id: i64,
    brand: String,
    status: i32,
}

impl From<ItemRow> for Item {
    fn from(row: ItemRow) -> Self {
        Item {
            chrt_id: row.chrt_id,
            track_number: row.track_number,
            price: row.price,
            rid: row.rid,
            name: row.name,
            sale: row.sale,
            size: row.size,
            total_price: row.total_price,
            nm_id: row.nm_id,
            brand: row.brand,
            status: row.status,
        }
    }
}

fn decode_order(row: &PgRow) -> Result<OrderRow, StoreError> {
    OrderRow::from_row(row).map_err(|e| StoreError::Decode(e.to_string()))
}

/// Unique violations become `Conflict`; everything else stays a database error.
fn write_error(e: sqlx::Error) -> StoreError {
    match e.as_database_error() {
        Some(db) if db.is_unique_violation() => StoreError::Conflict(db.message().to_string()),
        _ => StoreError::Database(e),
    }
}

#[derive(Clone)]
pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect(&config.url)
            .await?;

        tracing::info!(max_connections = config.max_connections, "Connected to PostgreSQL");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Items for each of `order_uids`, grouped by order. Rows that fail to
    /// decode are logged and skipped.
    async fn fetch_items(
        &self,
        order_uids: &[String],
    ) -> Result<HashMap<String, Vec<Item>>, StoreError> {
        let mut rows = sqlx::query(SELECT_ITEMS_FOR_ORDERS)
            .bind(order_uids)
            .fetch(&self.pool);

        let mut grouped: HashMap<String, Vec<Item>> = HashMap::new();
        while let Some(row) = rows.try_next().await? {
            match ItemRow::from_row(&row) {
                Ok(item) => grouped
                    .entry(item.order_uid.clone())
                    .or_default()
                    .push(item.into()),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping item row that failed to decode");
                }
            }
        }

        Ok(grouped)
    }
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn get_by_id(&self, order_uid: &str) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query(SELECT_ORDER_BY_ID)
            .bind(order_uid)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let order_row = decode_order(&row)?;

        let mut items = self.fetch_items(&[order_row.order_uid.clone()]).await?;
        let items = items.remove(&order_row.order_uid).unwrap_or_default();

        tracing::debug!(order_uid = %order_uid, item_count = items.len(), "Loaded order from PostgreSQL");
        Ok(Some(order_row.into_order(items)))
    }

    async fn get_most_recent(&self, limit: usize) -> Result<Vec<Order>, StoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(SELECT_MOST_RECENT)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;

        let order_rows = rows
            .iter()
            .map(decode_order)
            .collect::<Result<Vec<_>, _>>()?;

        let order_uids: Vec<String> = order_rows.iter().map(|o| o.order_uid.clone()).collect();
        let mut items = self.fetch_items(&order_uids).await?;

        // Result order follows the main query: date_created descending.
        let orders: Vec<Order> = order_rows
            .into_iter()
            .map(|row| {
                let order_items = items.remove(&row.order_uid).unwrap_or_default();
                row.into_order(order_items)
            })
            .collect();

        tracing::debug!(requested = limit, loaded = orders.len(), "Loaded most recent orders");
        Ok(orders)
    }

    async fn save(&self, order: &Order) -> Result<(), StoreError> {
        // Dropping `tx` without commit rolls everything back.
        let mut tx = self.pool.begin().await?;

        let delivery = &order.delivery;
        let delivery_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO deliveries (name, phone, zip, city, address, region, email)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(&delivery.name)
        .bind(&delivery.phone)
        .bind(&delivery.zip)
        .bind(&delivery.city)
        .bind(&delivery.address)
        .bind(&delivery.region)
        .bind(&delivery.email)
        .fetch_one(&mut *tx)
        .await
        .map_err(write_error)?;

        let payment = &order.payment;
        sqlx::query(
            r#"
            INSERT INTO payments (
                transaction_id, request_id, currency, provider, amount,
                payment_dt, bank, delivery_cost, goods_total, custom_fee
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(&payment.transaction)
        .bind(&payment.request_id)
        .bind(&payment.currency)
        .bind(&payment.provider)
        .bind(payment.amount)
        .bind(payment.payment_dt)
        .bind(&payment.bank)
        .bind(payment.delivery_cost)
        .bind(payment.goods_total)
        .bind(payment.custom_fee)
        .execute(&mut *tx)
        .await
        .map_err(write_error)?;

        sqlx::query(
            r#"
            INSERT INTO orders (
                order_uid, track_number, entry, delivery_id, payment_transaction_id,
                locale, internal_signature, customer_id, delivery_service,
                shardkey, sm_id, date_created, oof_shard
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(&order.order_uid)
        .bind(&order.track_number)
        .bind(&order.entry)
        .bind(delivery_id)
        .bind(&payment.transaction)
        .bind(&order.locale)
        .bind(&order.internal_signature)
        .bind(&order.customer_id)
        .bind(&order.delivery_service)
        .bind(&order.shardkey)
        .bind(order.sm_id)
        .bind(order.date_created)
        .bind(&order.oof_shard)
        .execute(&mut *tx)
        .await
        .map_err(write_error)?;

        for item in &order.items {
            sqlx::query(
                r#"
                INSERT INTO items (
                    chrt_id, track_number, price, rid, name, sale,
                    size, total_price, nm_id, brand, status
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                ON CONFLICT (chrt_id) DO NOTHING
                "#,
            )
            .bind(item.chrt_id)
            .bind(&item.track_number)
            .bind(item.price)
            .bind(&item.rid)
            .bind(&item.name)
            .bind(item.sale)
            .bind(&item.size)
            .bind(item.total_price)
            .bind(item.nm_id)
            .bind(&item.brand)
            .bind(item.status)
            .execute(&mut *tx)
            .await
            .map_err(write_error)?;

            sqlx::query("INSERT INTO order_items (order_uid, chrt_id) VALUES ($1, $2)")
                .bind(&order.order_uid)
                .bind(item.chrt_id)
                .execute(&mut *tx)
                .await
                .map_err(write_error)?;
        }

        tx.commit().await?;

        tracing::info!(
            order_uid = %order.order_uid,
            item_count = order.items.len(),
            "✅ Saved order to PostgreSQL"
        );

        Ok(())
    }
}

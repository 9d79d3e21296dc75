use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use super::{single_row, sqlite_timestamp};
use crate::{
    db_types::{NewOrder, Order, OrderId, OrderStatusType, PaymentMethod, SettlementDetails, StoreId},
    traits::SettlementDatabaseError,
};

/// Inserts a new order with status `pending` using the given connection. This is not atomic. You can embed this call
/// inside a transaction if you need to ensure atomicity, and pass `&mut *tx` as the connection argument.
pub async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, SettlementDatabaseError> {
    let order_id = order.order_id.clone();
    let rows: Vec<Order> = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_id,
                store_id,
                status,
                payment_method,
                payer_identity,
                amount_local,
                amount_reference
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *;
        "#,
    )
    .bind(order.order_id)
    .bind(order.store_id)
    .bind(OrderStatusType::Pending)
    .bind(order.payment_method)
    .bind(order.payer_identity.trim().to_string())
    .bind(order.amount_local)
    .bind(order.amount_reference)
    .fetch_all(conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => {
            SettlementDatabaseError::OrderAlreadyExists(order_id)
        },
        _ => SettlementDatabaseError::from(e),
    })?;
    let order = single_row(rows)?;
    debug!("📝️ Order [{}] inserted with id {}", order.order_id, order.id);
    Ok(order)
}

/// Returns the order with the given `order_id`, if it exists
pub async fn fetch_order_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order =
        sqlx::query_as("SELECT * FROM orders WHERE order_id = $1").bind(order_id.as_str()).fetch_optional(conn).await?;
    Ok(order)
}

/// Compare-and-set on the order status.
///
/// The status is only changed if it is currently one of `from`, in a single `UPDATE` statement. Returns the updated
/// order, or `None` if no row qualified.
pub async fn update_order_status(
    order_id: &OrderId,
    from: &[OrderStatusType],
    to: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    if from.is_empty() {
        return Ok(None);
    }
    let mut builder = QueryBuilder::<Sqlite>::new("UPDATE orders SET status = ");
    builder.push_bind(to);
    builder.push(", updated_at = CURRENT_TIMESTAMP WHERE order_id = ");
    builder.push_bind(order_id.as_str());
    builder.push(" AND status IN (");
    let mut statuses = builder.separated(", ");
    for status in from {
        statuses.push_bind(*status);
    }
    statuses.push_unseparated(") RETURNING *");
    trace!("📝️ Executing query: {}", builder.sql());
    let order = builder.build_query_as::<Order>().fetch_all(conn).await?.into_iter().next();
    if order.is_some() {
        debug!("📝️ Order {order_id} moved to {to}");
    }
    Ok(order)
}

pub async fn update_settlement_details(
    order_id: &OrderId,
    details: &SettlementDetails,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        r#"
            UPDATE orders SET
                payment_reference = $1,
                paid_at = $2,
                payer_bank = $3,
                payer_phone = $4,
                updated_at = CURRENT_TIMESTAMP
            WHERE order_id = $5
            RETURNING *;
        "#,
    )
    .bind(details.reference.as_str())
    .bind(details.paid_at)
    .bind(details.payer_bank.as_deref())
    .bind(details.payer_phone.as_deref())
    .bind(order_id.as_str())
    .fetch_all(conn)
    .await?
    .into_iter()
    .next();
    Ok(order)
}

/// Orders in the given status from the given payer, oldest first.
pub async fn fetch_orders_for_payer(
    status: OrderStatusType,
    method: PaymentMethod,
    payer_identity: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    let orders = sqlx::query_as(
        r#"
            SELECT * FROM orders
            WHERE status = $1 AND payment_method = $2 AND payer_identity = $3
            ORDER BY created_at ASC, id ASC;
        "#,
    )
    .bind(status)
    .bind(method)
    .bind(payer_identity)
    .fetch_all(conn)
    .await?;
    Ok(orders)
}

pub async fn fetch_orders_not_updated_since(
    status: OrderStatusType,
    cutoff: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    let orders = sqlx::query_as(
        "SELECT * FROM orders WHERE status = $1 AND updated_at < $2 ORDER BY updated_at ASC, id ASC",
    )
    .bind(status)
    .bind(sqlite_timestamp(cutoff))
    .fetch_all(conn)
    .await?;
    Ok(orders)
}

pub async fn fetch_orders_for_store(
    store_id: &StoreId,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    let orders = sqlx::query_as("SELECT * FROM orders WHERE store_id = $1 ORDER BY created_at ASC, id ASC")
        .bind(store_id.as_str())
        .fetch_all(conn)
        .await?;
    Ok(orders)
}

//! Balance adjustments. Every write here is a relative update evaluated by SQLite, so concurrent settlements and
//! dispersals never overwrite each other's changes.
use log::{debug, trace};
use sqlx::SqliteConnection;

use super::single_row;
use crate::{
    db_types::{
        Cents,
        NewPaymentTransaction,
        OrderId,
        PaymentTransaction,
        PlatformAccount,
        PlatformBalances,
        StoreBalance,
        StoreId,
    },
    traits::SettlementDatabaseError,
};

/// Adds `delta` (which may be negative) to a store's balance. The balance row is created on first use.
pub async fn adjust_store_balance(
    store_id: &StoreId,
    delta: Cents,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
            INSERT INTO store_balances (store_id, balance) VALUES ($1, $2)
            ON CONFLICT (store_id) DO UPDATE SET
                balance = balance + excluded.balance,
                updated_at = CURRENT_TIMESTAMP;
        "#,
    )
    .bind(store_id.as_str())
    .bind(delta)
    .execute(conn)
    .await?;
    trace!("📒️ Store {store_id} balance adjusted by {delta}");
    Ok(())
}

/// Subtracts `amount` from an existing store balance.
pub async fn debit_store_balance(
    store_id: &StoreId,
    amount: Cents,
    conn: &mut SqliteConnection,
) -> Result<(), SettlementDatabaseError> {
    let result = sqlx::query(
        "UPDATE store_balances SET balance = balance - $1, updated_at = CURRENT_TIMESTAMP WHERE store_id = $2",
    )
    .bind(amount)
    .bind(store_id.as_str())
    .execute(conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(SettlementDatabaseError::StoreNotFound(store_id.clone()));
    }
    trace!("📒️ Store {store_id} debited {amount}");
    Ok(())
}

pub async fn adjust_platform_balance(
    account: PlatformAccount,
    delta: Cents,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
            INSERT INTO platform_balances (account, balance) VALUES ($1, $2)
            ON CONFLICT (account) DO UPDATE SET
                balance = balance + excluded.balance,
                updated_at = CURRENT_TIMESTAMP;
        "#,
    )
    .bind(account)
    .bind(delta)
    .execute(conn)
    .await?;
    trace!("📒️ Platform {account} balance adjusted by {delta}");
    Ok(())
}

pub async fn insert_payment_transaction(
    tx: NewPaymentTransaction,
    conn: &mut SqliteConnection,
) -> Result<PaymentTransaction, SettlementDatabaseError> {
    let order_id = tx.order_id.clone();
    let rows: Vec<PaymentTransaction> = sqlx::query_as(
        r#"
            INSERT INTO payment_transactions (order_id, store_id, reference, gross, fee_rate_bps, fee, net)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *;
        "#,
    )
    .bind(tx.order_id)
    .bind(tx.store_id)
    .bind(tx.reference)
    .bind(tx.gross)
    .bind(tx.fee_rate_bps)
    .bind(tx.fee)
    .bind(tx.net)
    .fetch_all(conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => {
            SettlementDatabaseError::DuplicatePaymentTransaction(order_id)
        },
        _ => SettlementDatabaseError::from(e),
    })?;
    let record = single_row(rows)?;
    debug!("📒️ Payment transaction #{} recorded for order {}", record.id, record.order_id);
    Ok(record)
}

pub async fn fetch_store_balance(
    store_id: &StoreId,
    conn: &mut SqliteConnection,
) -> Result<Option<StoreBalance>, sqlx::Error> {
    let balance = sqlx::query_as("SELECT * FROM store_balances WHERE store_id = $1")
        .bind(store_id.as_str())
        .fetch_optional(conn)
        .await?;
    Ok(balance)
}

pub async fn fetch_platform_balances(conn: &mut SqliteConnection) -> Result<PlatformBalances, sqlx::Error> {
    let rows: Vec<(PlatformAccount, Cents)> =
        sqlx::query_as("SELECT account, balance FROM platform_balances").fetch_all(conn).await?;
    let mut balances = PlatformBalances::default();
    for (account, balance) in rows {
        match account {
            PlatformAccount::Available => balances.available = balance,
            PlatformAccount::Accounting => balances.accounting = balance,
        }
    }
    Ok(balances)
}

pub async fn fetch_payment_transactions(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<PaymentTransaction>, sqlx::Error> {
    let txs = sqlx::query_as("SELECT * FROM payment_transactions WHERE order_id = $1 ORDER BY id")
        .bind(order_id.as_str())
        .fetch_all(conn)
        .await?;
    Ok(txs)
}

/// Stores with money owed and a bank account on file
pub async fn fetch_stores_with_balance(conn: &mut SqliteConnection) -> Result<Vec<StoreBalance>, sqlx::Error> {
    let balances = sqlx::query_as(
        "SELECT * FROM store_balances WHERE balance > 0 AND bank_account IS NOT NULL ORDER BY store_id",
    )
    .fetch_all(conn)
    .await?;
    Ok(balances)
}

pub async fn set_bank_account(
    store_id: &StoreId,
    account: &str,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
            INSERT INTO store_balances (store_id, balance, bank_account) VALUES ($1, 0, $2)
            ON CONFLICT (store_id) DO UPDATE SET
                bank_account = excluded.bank_account,
                updated_at = CURRENT_TIMESTAMP;
        "#,
    )
    .bind(store_id.as_str())
    .bind(account)
    .execute(conn)
    .await?;
    debug!("📒️ Bank account for store {store_id} updated");
    Ok(())
}

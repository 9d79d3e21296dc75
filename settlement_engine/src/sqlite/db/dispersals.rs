use log::debug;
use sqlx::SqliteConnection;

use super::single_row;
use crate::{
    db_types::{Cents, Dispersal, DispersalBatch, DispersalItem, DispersalStatus, NewDispersalItem},
    traits::SettlementDatabaseError,
};

/// Creates a `pending` dispersal and its items. This is not atomic on its own; call it with `&mut *tx`.
///
/// Only one dispersal may be `pending` at a time. A second one fails with
/// [`SettlementDatabaseError::DispersalInProgress`]. Each item must still be covered by its store's balance, otherwise
/// this fails with [`SettlementDatabaseError::BalanceChanged`].
pub async fn insert_dispersal(
    reference: &str,
    items: &[NewDispersalItem],
    conn: &mut SqliteConnection,
) -> Result<DispersalBatch, SettlementDatabaseError> {
    if items.is_empty() {
        return Err(SettlementDatabaseError::EmptyDispersal);
    }
    let total = items.iter().map(|i| i.amount).sum::<Cents>();
    #[allow(clippy::cast_possible_wrap)]
    let store_count = items.len() as i64;
    let rows: Vec<Dispersal> = sqlx::query_as(
        r#"
            INSERT INTO dispersals (reference, status, total, store_count) VALUES ($1, $2, $3, $4)
            RETURNING *;
        "#,
    )
    .bind(reference)
    .bind(DispersalStatus::Pending)
    .bind(total)
    .bind(store_count)
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => SettlementDatabaseError::DispersalInProgress,
        _ => SettlementDatabaseError::from(e),
    })?;
    let dispersal = single_row(rows)?;
    for item in items {
        let balance: Option<Cents> = sqlx::query_scalar("SELECT balance FROM store_balances WHERE store_id = $1")
            .bind(item.store_id.as_str())
            .fetch_optional(&mut *conn)
            .await?;
        if balance.map_or(true, |b| b < item.amount) {
            return Err(SettlementDatabaseError::BalanceChanged(item.store_id.clone()));
        }
    }
    let mut inserted = Vec::with_capacity(items.len());
    for item in items {
        let rows: Vec<DispersalItem> = sqlx::query_as(
            r#"
                INSERT INTO dispersal_items (dispersal_id, store_id, bank_account, amount) VALUES ($1, $2, $3, $4)
                RETURNING *;
            "#,
        )
        .bind(dispersal.id)
        .bind(item.store_id.as_str())
        .bind(item.bank_account.as_str())
        .bind(item.amount)
        .fetch_all(&mut *conn)
        .await?;
        inserted.push(single_row(rows)?);
    }
    debug!("💸️ Dispersal #{} inserted with {} items totalling {total}", dispersal.id, inserted.len());
    Ok(DispersalBatch { dispersal, items: inserted })
}

/// Moves a `pending` dispersal to `status`. Returns `None` if the dispersal is not pending.
pub async fn finalize_dispersal(
    id: i64,
    status: DispersalStatus,
    error: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Option<Dispersal>, sqlx::Error> {
    let dispersal = sqlx::query_as(
        r#"
            UPDATE dispersals SET status = $1, error = $2, updated_at = CURRENT_TIMESTAMP
            WHERE id = $3 AND status = $4
            RETURNING *;
        "#,
    )
    .bind(status)
    .bind(error)
    .bind(id)
    .bind(DispersalStatus::Pending)
    .fetch_all(conn)
    .await?
    .into_iter()
    .next();
    Ok(dispersal)
}

pub async fn fetch_dispersal(id: i64, conn: &mut SqliteConnection) -> Result<Option<Dispersal>, sqlx::Error> {
    let dispersal = sqlx::query_as("SELECT * FROM dispersals WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(dispersal)
}

pub async fn fetch_dispersal_items(
    dispersal_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<DispersalItem>, sqlx::Error> {
    let items = sqlx::query_as("SELECT * FROM dispersal_items WHERE dispersal_id = $1 ORDER BY id")
        .bind(dispersal_id)
        .fetch_all(conn)
        .await?;
    Ok(items)
}

//! `SqliteDatabase` is a concrete implementation of a settlement engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`traits`](crate::traits)
//! module.
use std::fmt::Debug;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::*;
use sqlx::{migrate, SqlitePool};

use super::db::{db_url, dispersals, ledger, new_pool, orders};
use crate::{
    db_types::{
        Cents,
        DispersalBatch,
        DispersalStatus,
        NewDispersalItem,
        NewOrder,
        NewPaymentTransaction,
        Order,
        OrderId,
        OrderStatusType,
        PaymentMethod,
        PaymentTransaction,
        PlatformAccount,
        PlatformBalances,
        SettlementDetails,
        StoreBalance,
        StoreId,
    },
    traits::{DispersalManagement, LedgerManagement, OrderManagement, SettlementDatabaseError},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

#[async_trait]
impl OrderManagement for SqliteDatabase {
    async fn insert_order(&self, order: NewOrder) -> Result<Order, SettlementDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        orders::insert_order(order, &mut conn).await
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, SettlementDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_order_by_order_id(order_id, &mut conn).await?)
    }

    async fn transition_order_status(
        &self,
        order_id: &OrderId,
        from: &[OrderStatusType],
        to: OrderStatusType,
    ) -> Result<Option<Order>, SettlementDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::update_order_status(order_id, from, to, &mut conn).await?)
    }

    async fn record_settlement(
        &self,
        order_id: &OrderId,
        details: &SettlementDetails,
    ) -> Result<Order, SettlementDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        orders::update_settlement_details(order_id, details, &mut conn)
            .await?
            .ok_or_else(|| SettlementDatabaseError::OrderNotFound(order_id.clone()))
    }

    async fn fetch_reconciliation_candidates(
        &self,
        status: OrderStatusType,
        method: PaymentMethod,
        payer_identity: &str,
    ) -> Result<Vec<Order>, SettlementDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_orders_for_payer(status, method, payer_identity, &mut conn).await?)
    }

    async fn fetch_stale_orders(
        &self,
        status: OrderStatusType,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Order>, SettlementDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_orders_not_updated_since(status, cutoff, &mut conn).await?)
    }

    async fn fetch_orders_for_store(&self, store_id: &StoreId) -> Result<Vec<Order>, SettlementDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_orders_for_store(store_id, &mut conn).await?)
    }
}

#[async_trait]
impl LedgerManagement for SqliteDatabase {
    async fn increment_store_balance(&self, store_id: &StoreId, amount: Cents) -> Result<(), SettlementDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        Ok(ledger::adjust_store_balance(store_id, amount, &mut conn).await?)
    }

    async fn decrement_store_balance(&self, store_id: &StoreId, amount: Cents) -> Result<(), SettlementDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        ledger::debit_store_balance(store_id, amount, &mut conn).await
    }

    async fn increment_platform_balance(
        &self,
        account: PlatformAccount,
        amount: Cents,
    ) -> Result<(), SettlementDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        Ok(ledger::adjust_platform_balance(account, amount, &mut conn).await?)
    }

    async fn decrement_platform_balance(
        &self,
        account: PlatformAccount,
        amount: Cents,
    ) -> Result<(), SettlementDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        Ok(ledger::adjust_platform_balance(account, -amount, &mut conn).await?)
    }

    async fn insert_payment_transaction(
        &self,
        tx: NewPaymentTransaction,
    ) -> Result<PaymentTransaction, SettlementDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        ledger::insert_payment_transaction(tx, &mut conn).await
    }

    async fn fetch_store_balance(&self, store_id: &StoreId) -> Result<Option<StoreBalance>, SettlementDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        Ok(ledger::fetch_store_balance(store_id, &mut conn).await?)
    }

    async fn fetch_platform_balances(&self) -> Result<PlatformBalances, SettlementDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        Ok(ledger::fetch_platform_balances(&mut conn).await?)
    }

    async fn fetch_payment_transactions(
        &self,
        order_id: &OrderId,
    ) -> Result<Vec<PaymentTransaction>, SettlementDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        Ok(ledger::fetch_payment_transactions(order_id, &mut conn).await?)
    }
}

#[async_trait]
impl DispersalManagement for SqliteDatabase {
    async fn fetch_stores_with_balance(&self) -> Result<Vec<StoreBalance>, SettlementDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        Ok(ledger::fetch_stores_with_balance(&mut conn).await?)
    }

    async fn set_store_bank_account(&self, store_id: &StoreId, account: &str) -> Result<(), SettlementDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        Ok(ledger::set_bank_account(store_id, account, &mut conn).await?)
    }

    async fn create_dispersal(
        &self,
        reference: &str,
        items: &[NewDispersalItem],
    ) -> Result<DispersalBatch, SettlementDatabaseError> {
        let mut tx = self.pool.begin().await?;
        let batch = dispersals::insert_dispersal(reference, items, &mut tx).await?;
        tx.commit().await?;
        Ok(batch)
    }

    async fn finalize_dispersal(
        &self,
        id: i64,
        status: DispersalStatus,
        error: Option<String>,
    ) -> Result<Option<DispersalBatch>, SettlementDatabaseError> {
        let mut tx = self.pool.begin().await?;
        let batch = match dispersals::finalize_dispersal(id, status, error.as_deref(), &mut tx).await? {
            Some(dispersal) => {
                let items = dispersals::fetch_dispersal_items(id, &mut tx).await?;
                Some(DispersalBatch { dispersal, items })
            },
            None => None,
        };
        tx.commit().await?;
        Ok(batch)
    }

    async fn fetch_dispersal(&self, id: i64) -> Result<Option<DispersalBatch>, SettlementDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        let Some(dispersal) = dispersals::fetch_dispersal(id, &mut conn).await? else {
            return Ok(None);
        };
        let items = dispersals::fetch_dispersal_items(id, &mut conn).await?;
        Ok(Some(DispersalBatch { dispersal, items }))
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the database URL in `MPS_DATABASE_URL`.
    pub async fn new(max_connections: u32) -> Result<Self, SettlementDatabaseError> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    /// Connects to (creating if necessary) the database at `url` and brings its schema up to date.
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, SettlementDatabaseError> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        let db = Self { url, pool };
        db.run_migrations().await?;
        Ok(db)
    }

    pub async fn run_migrations(&self) -> Result<(), SettlementDatabaseError> {
        migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        debug!("🗃️ Migrations complete for {}", self.url);
        Ok(())
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

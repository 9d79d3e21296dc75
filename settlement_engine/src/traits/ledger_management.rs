use async_trait::async_trait;

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

/// Balance bookkeeping for stores and the platform.
///
/// Every balance change is a relative adjustment executed by the database (`balance = balance + ?`). Callers never
/// read a balance, modify it and write it back.
#[async_trait]
pub trait LedgerManagement: Send + Sync {
    /// Adds `amount` to the store's balance, creating the balance record if this is the store's first sale.
    async fn increment_store_balance(&self, store_id: &StoreId, amount: Cents) -> Result<(), SettlementDatabaseError>;

    async fn decrement_store_balance(&self, store_id: &StoreId, amount: Cents) -> Result<(), SettlementDatabaseError>;

    async fn increment_platform_balance(
        &self,
        account: PlatformAccount,
        amount: Cents,
    ) -> Result<(), SettlementDatabaseError>;

    async fn decrement_platform_balance(
        &self,
        account: PlatformAccount,
        amount: Cents,
    ) -> Result<(), SettlementDatabaseError>;

    /// Appends an audit record. At most one record may exist per order.
    async fn insert_payment_transaction(
        &self,
        tx: NewPaymentTransaction,
    ) -> Result<PaymentTransaction, SettlementDatabaseError>;

    async fn fetch_store_balance(&self, store_id: &StoreId) -> Result<Option<StoreBalance>, SettlementDatabaseError>;

    async fn fetch_platform_balances(&self) -> Result<PlatformBalances, SettlementDatabaseError>;

    async fn fetch_payment_transactions(
        &self,
        order_id: &OrderId,
    ) -> Result<Vec<PaymentTransaction>, SettlementDatabaseError>;
}

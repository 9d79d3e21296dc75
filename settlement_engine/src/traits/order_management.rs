use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::db_types::{NewOrder, Order, OrderId, OrderStatusType, PaymentMethod, SettlementDetails, StoreId};

/// Storage for orders and their lifecycle.
///
/// Implementations must make [`OrderManagement::transition_order_status`] a single atomic compare-and-set on the
/// order status. Nothing else in the engine serialises access to an order.
#[async_trait]
pub trait OrderManagement: Send + Sync {
    /// Inserts a brand-new order with status `pending`. Fails with [`SettlementDatabaseError::OrderAlreadyExists`] if
    /// the order id is taken.
    async fn insert_order(&self, order: NewOrder) -> Result<Order, SettlementDatabaseError>;

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, SettlementDatabaseError>;

    /// Moves the order to `to`, but only if its current status is one of `from`.
    ///
    /// Returns the updated order, or `None` if the order does not exist or was not in one of the expected states.
    /// In the latter case the order is left untouched.
    async fn transition_order_status(
        &self,
        order_id: &OrderId,
        from: &[OrderStatusType],
        to: OrderStatusType,
    ) -> Result<Option<Order>, SettlementDatabaseError>;

    /// Stores the gateway reference and payer metadata on a settled order.
    async fn record_settlement(
        &self,
        order_id: &OrderId,
        details: &SettlementDetails,
    ) -> Result<Order, SettlementDatabaseError>;

    /// All orders in `status`, paid with `method`, by the payer with the given identity. Oldest first.
    async fn fetch_reconciliation_candidates(
        &self,
        status: OrderStatusType,
        method: PaymentMethod,
        payer_identity: &str,
    ) -> Result<Vec<Order>, SettlementDatabaseError>;

    /// Orders in `status` that have not been touched since `cutoff`. Oldest first.
    async fn fetch_stale_orders(
        &self,
        status: OrderStatusType,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Order>, SettlementDatabaseError>;

    async fn fetch_orders_for_store(&self, store_id: &StoreId) -> Result<Vec<Order>, SettlementDatabaseError>;
}

#[derive(Debug, Clone, Error)]
pub enum SettlementDatabaseError {
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("Cannot insert order, since it already exists: {0}")]
    OrderAlreadyExists(OrderId),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("The store {0} does not have a balance record")]
    StoreNotFound(StoreId),
    #[error("A payment transaction has already been recorded for order {0}")]
    DuplicatePaymentTransaction(OrderId),
    #[error("The requested dispersal {0} does not exist")]
    DispersalNotFound(i64),
    #[error("Cannot create an empty dispersal")]
    EmptyDispersal,
    #[error("Another dispersal is still pending")]
    DispersalInProgress,
    #[error("The balance of store {0} no longer covers its dispersal item")]
    BalanceChanged(StoreId),
}

impl From<sqlx::Error> for SettlementDatabaseError {
    fn from(e: sqlx::Error) -> Self {
        SettlementDatabaseError::DatabaseError(e.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for SettlementDatabaseError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        SettlementDatabaseError::DatabaseError(format!("Migration failed. {e}"))
    }
}

use thiserror::Error;

use crate::{
    db_types::{Cents, OrderId, OrderStatusType, StoreId},
    traits::{GatewayError, SettlementDatabaseError},
};

#[derive(Debug, Clone, Error)]
pub enum OrderFlowError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] SettlementDatabaseError),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Order {order_id} cannot move from {from} to {to}")]
    InvalidTransition { order_id: OrderId, from: OrderStatusType, to: OrderStatusType },
    #[error("Invalid order: {0}")]
    InvalidOrder(String),
    #[error("Could not price the order. {0}")]
    PricingError(#[from] GatewayError),
}

/// Failures of the synchronous charge flow that happen *before* money moves. Once the gateway confirms a debit, the
/// flow cannot fail.
#[derive(Debug, Clone, Error)]
pub enum ChargeError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] SettlementDatabaseError),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Order {order_id} is {status}, and cannot be charged")]
    NotAwaitingPayment { order_id: OrderId, status: OrderStatusType },
    #[error("The amount {supplied} does not match the order amount {expected}")]
    AmountMismatch { expected: Cents, supplied: Cents },
    #[error("Missing charge details: {0}")]
    MissingDetails(String),
    #[error("{0}")]
    GatewayError(#[from] GatewayError),
}

#[derive(Debug, Clone, Error)]
pub enum DispersalError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] SettlementDatabaseError),
    #[error("No store has a balance to disperse")]
    NoEligibleStores,
    #[error("A dispersal needs a payment reference")]
    MissingReference,
    #[error("Another dispersal is still pending. Wait for it to finish before starting a new one")]
    DispersalInProgress,
    #[error("The balance of store {0} changed while the dispersal was prepared. Try again")]
    BalanceChanged(StoreId),
    #[error("The requested dispersal {0} does not exist")]
    DispersalNotFound(i64),
    #[error("{0} is not a valid bank account number")]
    InvalidBankAccount(String),
    #[error("{0}")]
    GatewayError(#[from] GatewayError),
}

//! # Backend and gateway contracts
//!
//! This module defines the interface contracts of the settlement engine *backends* and of the external payment
//! gateway.
//!
//! ## Backends
//! * [`OrderManagement`] stores orders and enforces the lifecycle guards. Every status change is a single conditional
//!   update, so the guards hold even when several service instances share the same database.
//! * [`LedgerManagement`] applies atomic increments and decrements to store and platform balances and writes the
//!   append-only payment transaction audit trail.
//! * [`DispersalManagement`] persists payout batches and their frozen items.
//!
//! [`SettlementDatabase`] is a convenience bound for backends that implement all three.
//!
//! ## Gateway
//! * [`ChargeGateway`] covers OTP issuance, synchronous debits and the reference exchange rate.
//! * [`PayoutGateway`] covers batch payouts to store bank accounts.
mod data_objects;
mod dispersal_management;
mod gateway;
mod ledger_management;
mod order_management;

pub use data_objects::{
    ChargeRequest,
    GatewayResponse,
    OtpRequest,
    PayoutBatch,
    PayoutItem,
    ReferenceRate,
    GATEWAY_SUCCESS_CODE,
};
pub use dispersal_management::DispersalManagement;
pub use gateway::{ChargeGateway, GatewayError, PayoutGateway};
pub use ledger_management::LedgerManagement;
pub use order_management::{OrderManagement, SettlementDatabaseError};

/// A backend that can serve every part of the engine.
pub trait SettlementDatabase: OrderManagement + LedgerManagement + DispersalManagement {}

impl<T> SettlementDatabase for T where T: OrderManagement + LedgerManagement + DispersalManagement {}

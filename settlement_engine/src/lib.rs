//! Marketplace Payment Settlement Engine
//!
//! The settlement engine takes marketplace orders from checkout to settled money. It is provider-agnostic: the
//! payment gateway and the database are both reached through traits.
//!
//! The library is divided into these sections:
//! 1. Backend contracts ([`mod@traits`]) and the SQLite backend ([`SqliteDatabase`]). You should never need to access
//!    the database directly. Instead, use the public APIs. The exception is the data types stored in the database.
//!    These are defined in the [`mod@db_types`] module and are public.
//! 2. The public API ([`mod@settlement_api`]). Order intake and cancellation, synchronous OTP charges, webhook
//!    reconciliation, the ledger and store payouts.
//! 3. Payment windows ([`ExpirationScheduler`]) and realtime order notifications ([`RealtimeNotifier`]).
//!
//! The engine also emits an `order settled` event once the ledger has been credited for an order. A simple actor
//! framework in [`mod@events`] lets you hook into it and run custom async actions.
pub mod db_types;
pub mod events;
pub mod expiration;
pub mod notifier;
pub mod settlement_api;
#[cfg(feature = "sqlite")]
mod sqlite;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use expiration::{ExpirationScheduler, DEFAULT_PAYMENT_WINDOW};
pub use notifier::{OrderEventStream, RealtimeNotifier};
pub use settlement_api::{
    charge_flow_api::ChargeFlowApi,
    dispersal_api::{DispersalApi, DEFAULT_BANK_ACCOUNT_DIGITS},
    errors::{ChargeError, DispersalError, OrderFlowError},
    ledger::{FeeSplit, LedgerAccountant, LedgerOutcome, DEFAULT_FEE_RATE_BPS},
    order_flow_api::OrderFlowApi,
    order_objects,
    reconciliation_api::ReconciliationApi,
    reference_rate_api::{PricedAmount, ReferenceRateApi},
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{
    ChargeGateway,
    DispersalManagement,
    GatewayError,
    LedgerManagement,
    OrderManagement,
    PayoutGateway,
    SettlementDatabase,
    SettlementDatabaseError,
};

//! # Settlement engine public API
//!
//! The `settlement_api` module exposes the programmatic API of the settlement engine. Each API is a small struct that
//! is generic over the backend traits it needs, so clients can pick the functionality they want.
//!
//! * [`order_flow_api`] creates orders, opens their payment window and cancels them.
//! * [`charge_flow_api`] runs OTP-confirmed synchronous debits.
//! * [`reconciliation_api`] matches asynchronous gateway webhooks (authorize and settle) to orders.
//! * [`ledger`] splits settled amounts into fee and net and credits the balances.
//! * [`dispersal_api`] pays accumulated store balances out in gateway batches.
//! * [`reference_rate_api`] prices orders quoted in the reference currency.
//!
//! # API usage
//!
//! APIs share one backend handle and, where timers are involved, one
//! [`ExpirationScheduler`](crate::ExpirationScheduler):
//!
//! ```rust,ignore
//! let db = Arc::new(SqliteDatabase::new_with_url(url, 5).await?);
//! let notifier = RealtimeNotifier::default();
//! let scheduler = ExpirationScheduler::new(Arc::clone(&db), notifier, DEFAULT_PAYMENT_WINDOW);
//! let orders = OrderFlowApi::new(Arc::clone(&db), scheduler.clone());
//! let order = orders.create_order(new_order).await?;
//! orders.begin_payment(&order.order_id).await?;
//! ```
pub mod charge_flow_api;
pub mod dispersal_api;
pub mod errors;
pub mod gateway_messages;
pub mod ledger;
pub mod order_flow_api;
pub mod order_objects;
pub mod reconciliation_api;
pub mod reference_rate_api;

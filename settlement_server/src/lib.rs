//! # Marketplace payment settlement server
//! This crate hosts the HTTP service in front of the settlement engine. It is responsible for:
//! * Taking orders from the storefront, opening their payment window and streaming status changes to the checkout
//!   page.
//! * Running OTP-confirmed direct debits against the payment gateway.
//! * Receiving the gateway's `authorize` and `settle` webhooks and matching them to orders.
//! * Exposing balances and store payouts (dispersals) to operators.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/api/orders/...`: Order intake, checkout, cancellation, direct debit and the order event stream.
//! * `/webhooks/authorize` and `/webhooks/settle`: Gateway payment notifications.
//! * `/api/balances/...` and `/api/dispersals/...`: Operator routes for balances and store payouts.
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod integrations;
pub mod middleware;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;

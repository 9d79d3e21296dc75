//! Shared primitives for the marketplace payment settlement workspace.
//!
//! * [`Cents`] is the fixed-point money type used for every amount that touches the ledger.
//! * [`Secret`] wraps configuration values that must never be printed.
//! * [`helpers`] holds small parsing utilities used by the configuration layers.
mod cents;

pub mod decimal_amount;
pub mod helpers;
pub mod op;
mod secret;

pub use cents::{Cents, CentsConversionError, LOCAL_CURRENCY_CODE, REFERENCE_CURRENCY_CODE};
pub use secret::Secret;

use std::str::FromStr;

use mps_common::Cents;

use crate::GatewayApiError;

/// The gateway sends amounts and rates as decimal strings, e.g. `"1500.00"` or `"36.5"`.
pub fn parse_gateway_amount(amount: &str) -> Result<Cents, GatewayApiError> {
    Cents::from_str(amount)
        .map_err(|e| GatewayApiError::InvalidCurrencyAmount(format!("Invalid amount: {amount}. {e}.")))
}

/// Formats an amount the way the gateway expects it: always two decimal places.
pub fn gateway_amount(amount: Cents) -> String {
    amount.to_string()
}

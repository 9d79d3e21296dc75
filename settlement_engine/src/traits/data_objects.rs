use chrono::{DateTime, Utc};
use log::warn;
use mps_common::{Cents, CentsConversionError};
use serde::{Deserialize, Serialize};

use crate::db_types::{DispersalItem, OrderId, StoreId};

/// The response code the gateway uses for an approved operation.
pub const GATEWAY_SUCCESS_CODE: &str = "00";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayResponse {
    pub code: String,
    pub message: Option<String>,
    /// The gateway's identifier for the operation. Present on approved charges and payouts.
    pub reference: Option<String>,
}

impl GatewayResponse {
    pub fn approved<S: Into<String>>(reference: S) -> Self {
        Self { code: GATEWAY_SUCCESS_CODE.to_string(), message: None, reference: Some(reference.into()) }
    }

    pub fn rejected<S: Into<String>>(code: S, message: Option<String>) -> Self {
        Self { code: code.into(), message, reference: None }
    }

    pub fn is_success(&self) -> bool {
        self.code == GATEWAY_SUCCESS_CODE
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpRequest {
    pub order_id: OrderId,
    pub identity: String,
    pub bank_code: String,
    pub phone: String,
    #[serde(with = "mps_common::decimal_amount")]
    pub amount: Cents,
}

/// A synchronous debit. `otp` is the one-time password the payer received from their bank.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeRequest {
    pub order_id: OrderId,
    pub identity: String,
    pub bank_code: String,
    pub phone: String,
    pub otp: String,
    #[serde(with = "mps_common::decimal_amount")]
    pub amount: Cents,
}

impl std::fmt::Debug for ChargeRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChargeRequest")
            .field("order_id", &self.order_id)
            .field("identity", &self.identity)
            .field("bank_code", &self.bank_code)
            .field("phone", &self.phone)
            .field("otp", &"****")
            .field("amount", &self.amount)
            .finish()
    }
}

/// The exchange rate between the reference currency and the local currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceRate {
    /// The local price of one unit of the reference currency
    #[serde(with = "mps_common::decimal_amount")]
    pub local_per_reference: Cents,
    pub as_of: DateTime<Utc>,
}

impl ReferenceRate {
    pub fn new(local_per_reference: Cents) -> Self {
        Self { local_per_reference, as_of: Utc::now() }
    }

    /// Converts a reference-currency amount into local currency, rounded to the cent.
    pub fn to_local(&self, reference_amount: Cents) -> Result<Cents, CentsConversionError> {
        reference_amount.scale(self.local_per_reference.value(), 100)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutItem {
    pub store_id: StoreId,
    pub bank_account: String,
    #[serde(with = "mps_common::decimal_amount")]
    pub amount: Cents,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutBatch {
    pub reference: String,
    #[serde(with = "mps_common::decimal_amount")]
    pub total: Cents,
    pub items: Vec<PayoutItem>,
}

impl PayoutBatch {
    /// Builds the gateway payload for a dispersal. The gateway rejects batches whose items do not add up to the
    /// declared total, so any difference is absorbed by the last item.
    pub fn new(reference: &str, items: &[DispersalItem], total: Cents) -> Self {
        let mut items = items
            .iter()
            .map(|i| PayoutItem {
                store_id: i.store_id.clone(),
                bank_account: i.bank_account.clone(),
                amount: i.amount,
            })
            .collect::<Vec<_>>();
        let drift = total - items.iter().map(|i| i.amount).sum::<Cents>();
        if drift != Cents::default() {
            if let Some(last) = items.last_mut() {
                warn!("💸️ Payout batch {reference} items differ from the total by {drift}. Adjusting the last item.");
                last.amount += drift;
            }
        }
        Self { reference: reference.to_string(), total, items }
    }

    pub fn items_total(&self) -> Cents {
        self.items.iter().map(|i| i.amount).sum()
    }
}

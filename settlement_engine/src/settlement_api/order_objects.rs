use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Cents, DispersalBatch, OrderId, SettlementDetails, StoreId},
    settlement_api::gateway_messages::rejection_message,
    traits::GatewayResponse,
};

/// The payer's details for an OTP request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpDetails {
    pub identity: String,
    pub bank_code: String,
    pub phone: String,
    #[serde(with = "mps_common::decimal_amount")]
    pub amount: Cents,
}

/// The payer's details for a synchronous debit.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeDetails {
    pub identity: String,
    pub bank_code: String,
    pub phone: String,
    pub otp: String,
    #[serde(with = "mps_common::decimal_amount")]
    pub amount: Cents,
}

impl std::fmt::Debug for ChargeDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChargeDetails")
            .field("identity", &self.identity)
            .field("bank_code", &self.bank_code)
            .field("phone", &self.phone)
            .field("amount", &self.amount)
            .finish_non_exhaustive()
    }
}

/// The outcome of a gateway operation, as reported to the payer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl GatewayResult {
    pub fn success(reference: Option<String>) -> Self {
        Self { success: true, reference, code: None, message: None }
    }

    /// A business rejection, with the gateway code translated into something the payer can act on.
    pub fn rejected(code: &str) -> Self {
        Self {
            success: false,
            reference: None,
            code: Some(code.to_string()),
            message: Some(rejection_message(code).to_string()),
        }
    }

    pub fn from_response(response: &GatewayResponse) -> Self {
        if response.is_success() {
            Self::success(response.reference.clone())
        } else {
            Self::rejected(&response.code)
        }
    }
}

/// A payment notification from the gateway: "the payer with this identity moved this amount".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentClaim {
    pub identity: String,
    #[serde(with = "mps_common::decimal_amount")]
    pub amount: Cents,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub payer_bank: Option<String>,
    #[serde(default)]
    pub payer_phone: Option<String>,
    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,
}

impl PaymentClaim {
    pub fn new(identity: &str, amount: Cents) -> Self {
        Self {
            identity: identity.to_string(),
            amount,
            reference: None,
            payer_bank: None,
            payer_phone: None,
            paid_at: None,
        }
    }

    pub fn with_reference<S: Into<String>>(mut self, reference: S) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn with_payer_bank<S: Into<String>>(mut self, bank: S) -> Self {
        self.payer_bank = Some(bank.into());
        self
    }

    pub fn with_payer_phone<S: Into<String>>(mut self, phone: S) -> Self {
        self.payer_phone = Some(phone.into());
        self
    }

    pub fn settlement_details(&self) -> SettlementDetails {
        SettlementDetails::new(self.reference.clone().unwrap_or_default())
            .with_paid_at(self.paid_at.unwrap_or_else(Utc::now))
            .with_payer_bank(self.payer_bank.clone())
            .with_payer_phone(self.payer_phone.clone())
    }
}

/// The acknowledgment sent back to the gateway for a webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationAck {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<OrderId>,
}

impl ReconciliationAck {
    pub fn matched<S: Into<String>>(order_id: &OrderId, message: S) -> Self {
        Self { success: true, message: message.into(), order_id: Some(order_id.clone()) }
    }

    pub fn rejected<S: Into<String>>(message: S) -> Self {
        Self { success: false, message: message.into(), order_id: None }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibleStore {
    pub store_id: StoreId,
    pub bank_account: String,
    #[serde(with = "mps_common::decimal_amount")]
    pub amount: Cents,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispersalPreview {
    pub stores: Vec<EligibleStore>,
    #[serde(with = "mps_common::decimal_amount")]
    pub total: Cents,
}

impl DispersalPreview {
    pub fn new(stores: Vec<EligibleStore>) -> Self {
        let total = stores.iter().map(|s| s.amount).sum();
        Self { stores, total }
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispersalOutcome {
    /// The gateway accepted the batch and the balances were decremented.
    Completed { batch: DispersalBatch },
    /// The gateway refused the batch. No balances changed.
    Rejected { batch: DispersalBatch, code: String, message: String },
}

impl DispersalOutcome {
    pub fn batch(&self) -> &DispersalBatch {
        match self {
            DispersalOutcome::Completed { batch } => batch,
            DispersalOutcome::Rejected { batch, .. } => batch,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, DispersalOutcome::Completed { .. })
    }
}

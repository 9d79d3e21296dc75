use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Request body for `POST /otp`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpBody {
    pub order_id: String,
    pub identity: String,
    pub bank_code: String,
    pub phone: String,
    pub amount: String,
}

/// Request body for `POST /charges`
#[derive(Clone, Serialize, Deserialize)]
pub struct ChargeBody {
    pub order_id: String,
    pub identity: String,
    pub bank_code: String,
    pub phone: String,
    pub otp: String,
    pub amount: String,
}

impl std::fmt::Debug for ChargeBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChargeBody")
            .field("order_id", &self.order_id)
            .field("identity", &self.identity)
            .field("bank_code", &self.bank_code)
            .field("amount", &self.amount)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutLine {
    pub account: String,
    pub amount: String,
    pub beneficiary: String,
}

/// Request body for `POST /payouts`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutBody {
    pub reference: String,
    pub total: String,
    pub lines: Vec<PayoutLine>,
}

/// The gateway's answer to every operation. `code` is `"00"` on success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayReply {
    pub code: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, alias = "ref")]
    pub reference: Option<String>,
}

/// Answer to `GET /rates/reference`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateReply {
    pub rate: String,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}

use async_trait::async_trait;
use thiserror::Error;

use crate::traits::{ChargeRequest, GatewayResponse, OtpRequest, PayoutBatch, ReferenceRate};

/// Transport-level failures talking to the payment gateway. A business rejection (insufficient funds, wrong OTP, etc.)
/// is *not* an error; it is a [`GatewayResponse`] with a non-success code.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("Could not reach the payment gateway. {0}")]
    Transport(String),
    #[error("The payment gateway sent a response we could not understand. {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait ChargeGateway: Send + Sync {
    /// Asks the payer's bank to send a one-time password for a debit of `request.amount`.
    async fn request_otp(&self, request: &OtpRequest) -> Result<GatewayResponse, GatewayError>;

    /// Debits the payer's account. The response is final: a success code means the money has moved.
    async fn synchronous_charge(&self, request: &ChargeRequest) -> Result<GatewayResponse, GatewayError>;

    async fn lookup_reference_rate(&self) -> Result<ReferenceRate, GatewayError>;
}

#[async_trait]
pub trait PayoutGateway: Send + Sync {
    async fn payout_batch(&self, batch: &PayoutBatch) -> Result<GatewayResponse, GatewayError>;
}
